use std::sync::{atomic::Ordering, Arc};

use tracing::{debug, error, warn};

use super::{Handler, HandlerKind};
use crate::{
    component::{ComponentModel, Implementation, PropertyModel},
    container::ContainerInner,
    errors::{GenericClosingErrorKind, ResolveErrorKind},
    types::{GenericParam, ServiceType, TypeKind},
};

/// Narrows which closed forms of its open services a generic component supports.
pub trait GenericServiceStrategy: Send + Sync {
    fn supports(&self, service: &ServiceType, model: &ComponentModel) -> bool;
}

/// Supplies the implementation's generic arguments when the requested service
/// doesn't carry all of them.
pub trait ImplementationMatchingStrategy: Send + Sync {
    /// Arguments for every parameter of the implementation, or `None` to use
    /// the ones bound from the requested service.
    fn arguments(&self, model: &ComponentModel, requested: &ServiceType) -> Option<Vec<ServiceType>>;
}

fn kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Pointer => "pointer",
        TypeKind::ByRef => "by-ref",
        TypeKind::Void => "void",
        TypeKind::Interface => "interface",
        TypeKind::Class => "class",
        TypeKind::Struct => "struct",
    }
}

impl Handler {
    /// Open service of the model `requested` is a closed form of, with the bound placeholders.
    fn match_service(&self, requested: &ServiceType) -> Option<(&ServiceType, Vec<Option<ServiceType>>)> {
        if requested.is_open() {
            return None;
        }
        let arity = self.model.generic_arity();
        self.model.services.iter().filter(|service| service.is_open()).find_map(|pattern| {
            let mut bindings = vec![None; arity.max(pattern.parameter_count())];
            pattern.bind(requested, &mut bindings).then_some((pattern, bindings))
        })
    }

    pub(super) fn supports_generic(&self, service: &ServiceType) -> bool {
        if self.match_service(service).is_none() {
            return false;
        }
        self.model
            .service_strategy
            .as_ref()
            .map_or(true, |strategy| strategy.supports(service, &self.model))
    }

    /// Generic parameters of the implementation, in order.
    fn parameters(&self, pattern: &ServiceType) -> Vec<GenericParam> {
        // a late-bound family takes the parameters of the service it closes, if it exposes it unchanged
        let def = match &self.model.implementation {
            Implementation::Generic(implementation) => implementation.definition(),
            Implementation::LateBound => pattern
                .definition()
                .filter(|def| *pattern == ServiceType::open(def)),
            Implementation::Type(_) => None,
        };
        match def {
            Some(def) => def.params().to_vec(),
            None => (0..self.model.generic_arity())
                .map(|index| GenericParam {
                    name: format!("T{index}").into(),
                    constraints: Vec::new(),
                })
                .collect(),
        }
    }

    fn closing_arguments(&self, requested: &ServiceType) -> Result<(ServiceType, Vec<ServiceType>), GenericClosingErrorKind> {
        let component = || self.model.name.clone();
        let implementation = || match &self.model.implementation {
            Implementation::Generic(implementation) => implementation.to_string(),
            _ => requested.to_string(),
        };

        let Some((pattern, bindings)) = self.match_service(requested) else {
            return Err(GenericClosingErrorKind::InsufficientInformation {
                component: component(),
                requested: requested.to_string(),
                implementation: implementation(),
                supplied: 0,
                required: self.model.generic_arity(),
                missing: Vec::new(),
            });
        };
        let params = self.parameters(pattern);

        let supplied = self
            .model
            .implementation_strategy
            .as_ref()
            .and_then(|strategy| strategy.arguments(&self.model, requested))
            .map(|arguments| arguments.into_iter().map(Some).collect::<Vec<_>>());
        let mut arguments = supplied.unwrap_or(bindings);
        arguments.resize(params.len(), None);

        let missing: Vec<String> = params
            .iter()
            .zip(&arguments)
            .filter(|(_, argument)| argument.is_none())
            .map(|(param, _)| param.name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(GenericClosingErrorKind::InsufficientInformation {
                component: component(),
                requested: requested.to_string(),
                implementation: implementation(),
                supplied: params.len() - missing.len(),
                required: params.len(),
                missing,
            });
        }
        let arguments: Vec<ServiceType> = arguments.into_iter().flatten().collect();

        for (param, argument) in params.iter().zip(&arguments) {
            if let Some(kind) = argument.kind().filter(|kind| !kind.is_valid_generic_argument()) {
                return Err(GenericClosingErrorKind::InvalidArgument {
                    component: component(),
                    parameter: param.name.to_string(),
                    argument: argument.to_string(),
                    kind: kind_name(kind),
                });
            }
        }
        for (param, argument) in params.iter().zip(&arguments) {
            if let Some(constraint) = param
                .constraints
                .iter()
                .find(|constraint| !constraint.is_satisfied_by(argument, &arguments))
            {
                return Err(GenericClosingErrorKind::ConstraintMismatch {
                    component: component(),
                    parameter: param.name.to_string(),
                    argument: argument.to_string(),
                    constraint: constraint.to_string(),
                });
            }
        }

        let closed = match &self.model.implementation {
            Implementation::Generic(implementation) => implementation.substitute(&arguments),
            _ => requested.clone(),
        };
        Ok((closed, arguments))
    }

    /// Closed form of `service` exposed by `implementation`, if the implementation has one.
    fn adapt_service(&self, service: &ServiceType, implementation: &ServiceType, arguments: &[ServiceType]) -> Option<ServiceType> {
        let closed = service.substitute(arguments);
        if !matches!(self.model.implementation, Implementation::Generic(_)) || closed == *implementation {
            return Some(closed);
        }
        let candidates = match closed.kind() {
            Some(TypeKind::Class) => implementation.base_chain(),
            _ => implementation.interfaces(),
        };
        candidates
            .iter()
            .find(|candidate| **candidate == closed)
            .or_else(|| candidates.iter().find(|candidate| candidate.same_definition(&closed)))
            .cloned()
    }

    fn closed_model(&self, requested: &ServiceType, implementation: &ServiceType, arguments: Vec<ServiceType>) -> ComponentModel {
        let mut services = Vec::with_capacity(self.model.services.len());
        // class services close through the base chain first, interfaces after them
        let (classes, others): (Vec<&ServiceType>, Vec<&ServiceType>) = self
            .model
            .services
            .iter()
            .partition(|service| service.kind() == Some(TypeKind::Class));
        for service in classes.into_iter().chain(others) {
            if !service.is_open() {
                services.push(service.clone());
                continue;
            }
            match self.adapt_service(service, implementation, &arguments) {
                Some(closed) if !services.contains(&closed) => services.push(closed),
                Some(_) => {}
                None => warn!(
                    component = self.name(),
                    "Service {} has no closed counterpart on {}, dropped",
                    service.substitute(&arguments),
                    implementation
                ),
            }
        }
        if !services.contains(requested) {
            services.push(requested.clone());
        }

        let mut model = self.model.as_ref().clone();
        model.name = format!(
            "{}[{}]",
            self.model.name,
            arguments.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        model.services = services;
        model.implementation = Implementation::Generic(implementation.clone());
        model.dependencies = self.model.dependencies.iter().map(|dependency| dependency.close(&arguments)).collect();
        model.properties = self
            .model
            .properties
            .iter()
            .map(|property| PropertyModel {
                dependency: property.dependency.close(&arguments),
                setter: property.setter.clone(),
            })
            .collect();
        model.service_strategy = None;
        model.implementation_strategy = None;
        model.generic_arguments = arguments.into();
        model
    }

    /// Returns the sub-handler for the closed form of this open component
    /// matching `requested`, building and registering it on first use.
    pub(super) fn specialize(&self, container: &ContainerInner, requested: &ServiceType) -> Result<Arc<Handler>, ResolveErrorKind> {
        let HandlerKind::Open { sub_handlers, built } = &self.kind else {
            return Err(ResolveErrorKind::NoComponent {
                service: requested.to_string(),
            });
        };

        let (implementation, arguments) = self.closing_arguments(requested).map_err(|err| {
            error!("{}", err);
            ResolveErrorKind::from(err)
        })?;

        if let Some(handler) = sub_handlers.read().get(&implementation) {
            return Ok(handler.clone());
        }

        let handler = {
            let mut sub_handlers = sub_handlers.write();
            if let Some(handler) = sub_handlers.get(&implementation) {
                return Ok(handler.clone());
            }
            let handler = Handler::new(Arc::new(self.closed_model(requested, &implementation, arguments)));
            sub_handlers.insert(implementation.clone(), handler.clone());
            handler
        };

        container.registry.adopt(handler.clone());
        handler.refresh(&container.registry);
        built.fetch_add(1, Ordering::AcqRel);
        debug!(component = self.name(), closed = %implementation, "Specialized");

        Ok(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::Handler;
    use crate::{
        component::{Component, Registration as _},
        config::Config,
        types::{ServiceType, TypeDef},
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Repository;
    struct Order;

    #[test]
    #[traced_test]
    fn test_class_services_closed_before_interfaces() {
        let irepository = TypeDef::interface("IRepository").param("T").build();
        let repository = TypeDef::class("RepositoryBase")
            .param("T")
            .implements(ServiceType::generic(&irepository, [ServiceType::param(0)]))
            .build();
        let sql = TypeDef::class("SqlRepository")
            .param("T")
            .base(ServiceType::generic(&repository, [ServiceType::param(0)]))
            .build();
        let model = Component::<Repository>::generic(&sql)
            .generic_service(ServiceType::open(&irepository))
            .generic_service(ServiceType::open(&repository))
            .activator(|_| Ok(Repository))
            .into_model(&Config::default())
            .unwrap();
        let handler = Handler::new(Arc::new(model));

        let order = ServiceType::of::<Order>();
        let requested = ServiceType::generic(&irepository, [order.clone()]);
        let (implementation, arguments) = handler.closing_arguments(&requested).unwrap();
        let closed = handler.closed_model(&requested, &implementation, arguments);

        assert_eq!(implementation, ServiceType::generic(&sql, [order.clone()]));
        assert_eq!(
            closed.services().to_vec(),
            vec![
                ServiceType::generic(&repository, [order.clone()]),
                ServiceType::generic(&irepository, [order]),
            ]
        );
    }
}
