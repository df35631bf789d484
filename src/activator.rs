use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{
    any::Instance,
    arguments::{Arguments, ResolvedValue},
    burden::{Burden, ReleaseMode},
    creation_context::CreationContext,
    dependency::{DependencyKind, DependencyModel, DependencyValue},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    handler::Handler,
};

/// Creates instances of one closed component: resolves its dependencies,
/// constructs, intercepts, injects properties and runs commission concerns.
pub struct ComponentActivator {
    handler: Arc<Handler>,
}

impl ComponentActivator {
    pub(crate) fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Creates a new instance. The dependencies it owns are released again if creation fails.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind`] if a dependency can't be resolved or construction fails.
    pub fn create(&self, ctx: &mut CreationContext<'_>) -> Result<Burden, ResolveErrorKind> {
        ctx.push_frame(self.handler.clone());
        let result = self.instantiate(ctx);
        let children = ctx.pop_frame();

        match result {
            Ok(instance) => {
                debug!(component = self.handler.name(), "Created");
                Ok(Burden::new(instance, self.handler.clone(), children))
            }
            Err(err) => {
                for child in children.iter().rev() {
                    if let Err(failure) = child.release(ReleaseMode::Requested) {
                        warn!("Cleanup after failed creation of '{}': {}", self.handler.name(), failure);
                    }
                }
                Err(err)
            }
        }
    }

    fn instantiate(&self, ctx: &mut CreationContext<'_>) -> Result<Instance, ResolveErrorKind> {
        let model = self.handler.model();
        let instantiate_error = |source: InstantiateErrorKind| {
            let err = ResolveErrorKind::Instantiate {
                component: model.name().to_owned(),
                source,
            };
            error!("{}", err);
            err
        };

        let mut arguments = Arguments::new(model.name().to_owned(), model.generic_arguments.clone());
        for dependency in model.dependencies() {
            let value = self.resolve_dependency(ctx, dependency)?;
            arguments.push(dependency.key.clone(), value);
        }

        let Some(activator) = model.activator.as_ref() else {
            return Err(instantiate_error(InstantiateErrorKind::MissingArgument {
                key: "activator".to_owned(),
            }));
        };
        let mut instance = activator(&arguments).map_err(instantiate_error)?;

        if !model.interceptors.is_empty() {
            if let Some(proxy_factory) = ctx.container().proxy_factory.as_ref() {
                instance = proxy_factory
                    .create(model, instance, &model.interceptors)
                    .map_err(|err| instantiate_error(InstantiateErrorKind::Interception(err)))?;
                debug!(component = model.name(), "Intercepted");
            }
        }

        ctx.set_in_progress(self.handler.id(), instance.clone());

        for property in &model.properties {
            let value = self.resolve_dependency(ctx, &property.dependency)?;
            if !value.is_missing() {
                (property.setter)(&instance, &value).map_err(instantiate_error)?;
            }
        }

        for concern in &model.commission {
            concern(&instance).map_err(|err| instantiate_error(InstantiateErrorKind::Commission(err)))?;
        }

        Ok(instance)
    }

    fn resolve_dependency(&self, ctx: &mut CreationContext<'_>, dependency: &DependencyModel) -> Result<ResolvedValue, ResolveErrorKind> {
        self.try_resolve_dependency(ctx, dependency).map_err(|source| ResolveErrorKind::Dependency {
            component: self.handler.name().to_owned(),
            dependency: dependency.key.to_string(),
            source: Box::new(source),
        })
    }

    fn try_resolve_dependency(&self, ctx: &mut CreationContext<'_>, dependency: &DependencyModel) -> Result<ResolvedValue, ResolveErrorKind> {
        let container = ctx.container();

        match &dependency.value {
            Some(DependencyValue::Instance(value)) => return Ok(ResolvedValue::Value(value.clone())),
            Some(DependencyValue::Raw(raw)) => {
                return container
                    .converter
                    .convert(raw, &dependency.service)
                    .map(ResolvedValue::Value)
                    .map_err(|source| ResolveErrorKind::Instantiate {
                        component: self.handler.name().to_owned(),
                        source: source.into(),
                    });
            }
            Some(DependencyValue::Component(name)) => {
                let Some(handler) = container.registry.handler_by_name(name) else {
                    let err = ResolveErrorKind::NoComponentNamed { name: name.to_string() };
                    error!("{}", err);
                    return Err(err);
                };
                return self.resolve_service(ctx, &handler, dependency);
            }
            None => {}
        }

        if let Some(value) = ctx
            .creation_arguments()
            .and_then(|arguments| arguments.lookup(&dependency.key, dependency.service.type_info()))
        {
            debug!(dependency = %dependency.key, "Found in inline arguments");
            return Ok(ResolvedValue::Value(value.clone()));
        }

        match dependency.kind {
            DependencyKind::Parameter => {
                if dependency.optional {
                    Ok(ResolvedValue::Missing)
                } else {
                    let err = ResolveErrorKind::UnsatisfiedDependency {
                        component: self.handler.name().to_owned(),
                        missing: vec![self.handler.missing(dependency)],
                    };
                    error!("{}", err);
                    Err(err)
                }
            }
            DependencyKind::Service => match container.registry.handler(&dependency.service) {
                Some(handler) => self.resolve_service(ctx, &handler, dependency),
                None if dependency.optional => Ok(ResolvedValue::Missing),
                None => {
                    let err = ResolveErrorKind::NoComponent {
                        service: dependency.service.to_string(),
                    };
                    error!("{}", err);
                    Err(err)
                }
            },
            DependencyKind::Collection => {
                let mut views = Vec::new();
                for handler in container.registry.handlers(&dependency.service).iter() {
                    if let Some(resolution) = handler.resolve(ctx, &dependency.service, false)? {
                        views.push(resolution.view(&dependency.service));
                    }
                }
                Ok(ResolvedValue::Many(views))
            }
        }
    }

    fn resolve_service(
        &self,
        ctx: &mut CreationContext<'_>,
        handler: &Arc<Handler>,
        dependency: &DependencyModel,
    ) -> Result<ResolvedValue, ResolveErrorKind> {
        match handler.resolve(ctx, &dependency.service, !dependency.optional)? {
            Some(resolution) => Ok(ResolvedValue::Service {
                view: resolution.view(&dependency.service),
                instance: resolution.instance,
            }),
            None => Ok(ResolvedValue::Missing),
        }
    }
}
