use std::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, error, info_span, warn};

use crate::{
    any::{Instance, InstanceKey},
    component::Registration,
    config::{Config, ReleasePolicyKind},
    context::Context,
    conversion::{ConversionManager, DefaultConversionManager},
    creation_context::CreationContext,
    errors::{RegistrationErrorKind, ReleaseErrorKind, ResolveErrorKind},
    handler::{Handler, Resolution},
    proxy::ProxyFactory,
    registry::Registry,
    release_policy::{LifecycledComponentsReleasePolicy, NoTrackingReleasePolicy, ReleasePolicy},
    scope::{ambient_scope, Scope, ScopeFrame},
    types::ServiceType,
};

/// Entry point of the engine: registers components, resolves and releases instances.
///
/// Cloning is cheap and every clone shares the same registry. The container is
/// disposed when [`Self::dispose`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) registry: Registry,
    pub(crate) policy: Arc<dyn ReleasePolicy>,
    pub(crate) proxy_factory: Option<Arc<dyn ProxyFactory>>,
    pub(crate) converter: Arc<dyn ConversionManager>,
    pub(crate) config: Config,
    disposed: AtomicBool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers a component.
    ///
    /// # Errors
    /// - Returns [`RegistrationErrorKind::DuplicateName`] if a component with the same name is registered
    /// - Returns [`RegistrationErrorKind::Disposed`] if the container was disposed
    /// - Returns any validation error of the component descriptor
    pub fn register(&self, registration: impl Registration) -> Result<(), RegistrationErrorKind> {
        if self.inner.is_disposed() {
            let err = RegistrationErrorKind::Disposed;
            error!("{}", err);
            return Err(err);
        }
        let model = registration.into_model(&self.inner.config).map_err(|err| {
            error!("{}", err);
            err
        })?;
        self.inner.registry.register(model).map(|_| ()).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Resolves the service `S`.
    ///
    /// Scoped components go to the ambient scope of [`Scope::run`], if any.
    /// Resolve through a [`Scope`] handle to use an explicit one.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoComponent`] if no component supports `S`
    /// - Returns [`ResolveErrorKind::UnsatisfiedDependency`] listing every dependency that can't be supplied
    /// - Returns [`ResolveErrorKind::CircularDependency`] if the component depends on itself
    /// - Returns [`ResolveErrorKind::Dependency`] wrapping the failure of a dependency
    /// - Returns [`ResolveErrorKind::Lifestyle`] if the lifestyle can't hand out an instance
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolveErrorKind> {
        self.inner.resolve_typed::<S>(ambient_scope().as_ref(), None)
    }

    /// Like [`Self::resolve`], but `Ok(None)` when no component supports `S`
    /// or its dependencies can't be supplied.
    ///
    /// # Errors
    /// Failures while creating an instance that could be resolved.
    pub fn try_resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<S>>, ResolveErrorKind> {
        self.inner.try_resolve_typed::<S>(ambient_scope().as_ref(), None)
    }

    /// Resolves `S` with inline arguments for the dependencies of the resolved component.
    ///
    /// # Errors
    /// See [`Self::resolve`].
    pub fn resolve_with<S: ?Sized + Send + Sync + 'static>(&self, arguments: &Context) -> Result<Arc<S>, ResolveErrorKind> {
        self.inner.resolve_typed::<S>(ambient_scope().as_ref(), Some(arguments))
    }

    /// Resolves `S` through the component registered under `name`.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoComponentNamed`] if there is no such component
    /// - See [`Self::resolve`] for the rest
    pub fn resolve_named<S: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<S>, ResolveErrorKind> {
        self.inner.resolve_named::<S>(name, ambient_scope().as_ref())
    }

    /// Resolves `S` through every component supporting it, in registration order.
    /// Components whose dependencies can't be supplied are skipped.
    ///
    /// # Errors
    /// Failures while creating an instance that could be resolved.
    pub fn resolve_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, ResolveErrorKind> {
        self.inner.resolve_all::<S>(ambient_scope().as_ref())
    }

    /// Resolves a service known only at runtime, e.g. a closed form of a generic family.
    ///
    /// The instance is the typed view (`Arc<S>` erased) for Rust services and the implementation otherwise.
    ///
    /// # Errors
    /// See [`Self::resolve`].
    pub fn resolve_service(&self, service: &ServiceType) -> Result<Instance, ResolveErrorKind> {
        self.inner.resolve_instance(service, ambient_scope().as_ref(), None)
    }

    /// # Errors
    /// See [`Self::try_resolve`].
    pub fn try_resolve_service(&self, service: &ServiceType) -> Result<Option<Instance>, ResolveErrorKind> {
        self.inner.try_resolve_instance(service, ambient_scope().as_ref())
    }

    /// Releases an instance this container handed out. Releasing an untracked
    /// or already released instance is a no-op.
    ///
    /// # Errors
    /// Every decommission failure of the instance and the instances it owns.
    pub fn release<S: ?Sized>(&self, instance: &Arc<S>) -> Result<(), ReleaseErrorKind> {
        self.inner.policy.release(InstanceKey::of(instance))
    }

    /// # Errors
    /// See [`Self::release`].
    pub fn release_instance(&self, instance: &Instance) -> Result<(), ReleaseErrorKind> {
        self.inner.policy.release(InstanceKey::of(instance))
    }

    /// Whether the release policy tracks `instance`.
    #[must_use]
    pub fn has_track<S: ?Sized>(&self, instance: &Arc<S>) -> bool {
        self.inner.policy.has_track(InstanceKey::of(instance))
    }

    /// Begins a scope. It ends when the returned handle is dropped or ended.
    #[must_use]
    pub fn begin_scope(&self) -> Scope {
        Scope::new(self.clone(), None)
    }

    #[must_use]
    pub fn handler(&self, service: &ServiceType) -> Option<Arc<Handler>> {
        self.inner.registry.handler(service)
    }

    #[must_use]
    pub fn handlers(&self, service: &ServiceType) -> Vec<Arc<Handler>> {
        self.inner.registry.handlers(service).to_vec()
    }

    #[must_use]
    pub fn handler_by_name(&self, name: &str) -> Option<Arc<Handler>> {
        self.inner.registry.handler_by_name(name)
    }

    /// Destroys every instance the container holds: release policy roots most
    /// recently tracked first, then what the lifestyles still hold, most recently
    /// registered components first. Disposing twice is a no-op.
    ///
    /// Reverse registration order is deliberate: a component registered later may
    /// depend on one registered earlier, so dependents go before their dependencies.
    ///
    /// # Errors
    /// Every decommission failure. A failure never stops the rest of the teardown.
    pub fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        self.inner.dispose()
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("components", &self.inner.registry.len())
            .field("disposed", &self.inner.is_disposed())
            .finish_non_exhaustive()
    }
}

impl ContainerInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn resolve(
        &self,
        service: &ServiceType,
        scope: Option<&Arc<ScopeFrame>>,
        arguments: Option<&Context>,
        required: bool,
    ) -> Result<Option<Resolution>, ResolveErrorKind> {
        let span = info_span!("resolve", service = %service, scope = scope.map(|frame| frame.id()));
        let _guard = span.enter();

        if self.is_disposed() {
            let err = ResolveErrorKind::Disposed;
            error!("{}", err);
            return Err(err);
        }

        let Some(handler) = self.registry.handler(service) else {
            if !required {
                debug!("No component found");
                return Ok(None);
            }
            let err = ResolveErrorKind::NoComponent {
                service: service.to_string(),
            };
            error!("{}", err);
            return Err(err);
        };

        let mut ctx = CreationContext::new(self, scope.cloned(), arguments);
        handler.resolve(&mut ctx, service, required)
    }

    fn resolve_required(
        &self,
        service: &ServiceType,
        scope: Option<&Arc<ScopeFrame>>,
        arguments: Option<&Context>,
    ) -> Result<Resolution, ResolveErrorKind> {
        self.resolve(service, scope, arguments, true)?.ok_or_else(|| ResolveErrorKind::NoComponent {
            service: service.to_string(),
        })
    }

    pub(crate) fn resolve_typed<S: ?Sized + Send + Sync + 'static>(
        &self,
        scope: Option<&Arc<ScopeFrame>>,
        arguments: Option<&Context>,
    ) -> Result<Arc<S>, ResolveErrorKind> {
        let service = ServiceType::contract::<S>();
        self.resolve_required(&service, scope, arguments)?.typed::<S>(&service)
    }

    pub(crate) fn try_resolve_typed<S: ?Sized + Send + Sync + 'static>(
        &self,
        scope: Option<&Arc<ScopeFrame>>,
        arguments: Option<&Context>,
    ) -> Result<Option<Arc<S>>, ResolveErrorKind> {
        let service = ServiceType::contract::<S>();
        self.resolve(&service, scope, arguments, false)?
            .map(|resolution| resolution.typed::<S>(&service))
            .transpose()
    }

    pub(crate) fn resolve_named<S: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        scope: Option<&Arc<ScopeFrame>>,
    ) -> Result<Arc<S>, ResolveErrorKind> {
        let span = info_span!("resolve_named", name, service = type_name::<S>());
        let _guard = span.enter();

        let Some(handler) = self.registry.handler_by_name(name) else {
            let err = ResolveErrorKind::NoComponentNamed { name: name.to_owned() };
            error!("{}", err);
            return Err(err);
        };
        let service = ServiceType::contract::<S>();
        let mut ctx = CreationContext::new(self, scope.cloned(), None);
        handler
            .resolve(&mut ctx, &service, true)?
            .ok_or_else(|| ResolveErrorKind::NoComponentNamed { name: name.to_owned() })?
            .typed::<S>(&service)
    }

    pub(crate) fn resolve_all<S: ?Sized + Send + Sync + 'static>(
        &self,
        scope: Option<&Arc<ScopeFrame>>,
    ) -> Result<Vec<Arc<S>>, ResolveErrorKind> {
        let span = info_span!("resolve_all", service = type_name::<S>());
        let _guard = span.enter();

        let service = ServiceType::contract::<S>();
        let handlers = self.registry.handlers(&service);
        let mut resolved = Vec::with_capacity(handlers.len());
        for handler in handlers.iter() {
            let mut ctx = CreationContext::new(self, scope.cloned(), None);
            if let Some(resolution) = handler.resolve(&mut ctx, &service, false)? {
                resolved.push(resolution.typed::<S>(&service)?);
            }
        }
        Ok(resolved)
    }

    pub(crate) fn resolve_instance(
        &self,
        service: &ServiceType,
        scope: Option<&Arc<ScopeFrame>>,
        arguments: Option<&Context>,
    ) -> Result<Instance, ResolveErrorKind> {
        self.resolve_required(service, scope, arguments)
            .map(|resolution| resolution.view(service))
    }

    pub(crate) fn try_resolve_instance(
        &self,
        service: &ServiceType,
        scope: Option<&Arc<ScopeFrame>>,
    ) -> Result<Option<Instance>, ResolveErrorKind> {
        Ok(self
            .resolve(service, scope, None, false)?
            .map(|resolution| resolution.view(service)))
    }

    pub(crate) fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures = Vec::new();
        if let Err(err) = self.policy.dispose() {
            failures.push(err);
        }
        for handler in self.registry.all_handlers().iter().rev() {
            if let Err(err) = handler.dispose() {
                failures.push(err);
            }
        }
        self.registry.clear();
        debug!("Container disposed");

        ReleaseErrorKind::collect(failures)
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!("Container disposed on drop with failures: {}", err);
        }
    }
}

/// Builds a [`Container`] with a custom config and collaborators.
#[derive(Default)]
pub struct ContainerBuilder {
    config: Config,
    policy: Option<Arc<dyn ReleasePolicy>>,
    proxy_factory: Option<Arc<dyn ProxyFactory>>,
    converter: Option<Arc<dyn ConversionManager>>,
}

impl ContainerBuilder {
    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Uses `policy` instead of the one `Config::release_policy` selects.
    #[inline]
    #[must_use]
    pub fn release_policy(mut self, policy: Arc<dyn ReleasePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    #[inline]
    #[must_use]
    pub fn proxy_factory(mut self, proxy_factory: Arc<dyn ProxyFactory>) -> Self {
        self.proxy_factory = Some(proxy_factory);
        self
    }

    #[inline]
    #[must_use]
    pub fn conversion_manager(mut self, converter: Arc<dyn ConversionManager>) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub fn build(self) -> Container {
        let policy = self.policy.unwrap_or_else(|| match self.config.release_policy {
            ReleasePolicyKind::LifecycledComponents => Arc::new(LifecycledComponentsReleasePolicy::new()) as Arc<dyn ReleasePolicy>,
            ReleasePolicyKind::NoTracking => Arc::new(NoTrackingReleasePolicy),
        });
        let converter = self
            .converter
            .unwrap_or_else(|| Arc::new(DefaultConversionManager) as Arc<dyn ConversionManager>);
        Container {
            inner: Arc::new(ContainerInner {
                registry: Registry::new(),
                policy,
                proxy_factory: self.proxy_factory,
                converter,
                config: self.config,
                disposed: AtomicBool::new(false),
            }),
        }
    }
}
