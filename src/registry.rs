use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::debug;

use crate::{
    component::ComponentModel,
    errors::RegistrationErrorKind,
    handler::{Handler, HandlerState},
    types::ServiceType,
};

#[derive(Default)]
struct Handlers {
    by_name: HashMap<String, Arc<Handler>>,
    /// Registered handlers, in registration order.
    ordered: Vec<Arc<Handler>>,
    /// Closed sub-handlers built from open generic ones. Never looked up directly.
    adopted: Vec<Arc<Handler>>,
}

#[derive(Default)]
struct Lookups {
    single: HashMap<ServiceType, Option<Arc<Handler>>>,
    many: HashMap<ServiceType, Arc<[Arc<Handler>]>>,
}

/// Naming subsystem: handlers by name and by the services they support.
///
/// Lookups are cached per requested service; the cache is dropped whenever a
/// handler is registered.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<Handlers>,
    lookups: RwLock<Lookups>,
    generation: AtomicU64,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, model: ComponentModel) -> Result<Arc<Handler>, RegistrationErrorKind> {
        let handler = Handler::new(Arc::new(model));
        {
            let mut handlers = self.handlers.write();
            if handlers.by_name.contains_key(handler.name()) {
                return Err(RegistrationErrorKind::DuplicateName {
                    name: handler.name().to_owned(),
                });
            }
            handlers.by_name.insert(handler.name().to_owned(), handler.clone());
            handlers.ordered.push(handler.clone());
        }
        self.invalidate();
        debug!(component = handler.name(), services = ?handler.model().services(), "Registered");

        // A new handler can satisfy the dependencies of waiting ones
        for waiting in self.ordered().iter().filter(|waiting| waiting.state() == HandlerState::WaitingDependency) {
            waiting.refresh(self);
        }
        Ok(handler)
    }

    /// Takes ownership of a specialized sub-handler for teardown.
    pub(crate) fn adopt(&self, handler: Arc<Handler>) {
        debug!(component = handler.name(), "Adopted");
        self.handlers.write().adopted.push(handler);
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut lookups = self.lookups.write();
        lookups.single.clear();
        lookups.many.clear();
    }

    fn ordered(&self) -> Vec<Arc<Handler>> {
        self.handlers.read().ordered.clone()
    }

    /// The handler a single-result lookup of `service` resolves through: one
    /// registered for the exact service first, else an open generic one that can close over it.
    #[must_use]
    pub fn handler(&self, service: &ServiceType) -> Option<Arc<Handler>> {
        if let Some(found) = self.lookups.read().single.get(service) {
            return found.clone();
        }

        let lookups = self.lookups.upgradable_read();
        if let Some(found) = lookups.single.get(service) {
            return found.clone();
        }
        let generation = self.generation.load(Ordering::Acquire);
        let found = {
            let handlers = self.handlers.read();
            handlers
                .ordered
                .iter()
                .find(|handler| !handler.is_open() && handler.supports(service))
                .or_else(|| handlers.ordered.iter().find(|handler| handler.is_open() && handler.supports(service)))
                .cloned()
        };

        let mut lookups = RwLockUpgradableReadGuard::upgrade(lookups);
        if self.generation.load(Ordering::Acquire) == generation {
            lookups.single.insert(service.clone(), found.clone());
        }
        found
    }

    /// Every handler supporting `service`, in registration order.
    #[must_use]
    pub fn handlers(&self, service: &ServiceType) -> Arc<[Arc<Handler>]> {
        if let Some(found) = self.lookups.read().many.get(service) {
            return found.clone();
        }

        let lookups = self.lookups.upgradable_read();
        if let Some(found) = lookups.many.get(service) {
            return found.clone();
        }
        let generation = self.generation.load(Ordering::Acquire);
        let found: Arc<[Arc<Handler>]> = self
            .handlers
            .read()
            .ordered
            .iter()
            .filter(|handler| handler.supports(service))
            .cloned()
            .collect();

        let mut lookups = RwLockUpgradableReadGuard::upgrade(lookups);
        if self.generation.load(Ordering::Acquire) == generation {
            lookups.many.insert(service.clone(), found.clone());
        }
        found
    }

    #[must_use]
    pub fn handler_by_name(&self, name: &str) -> Option<Arc<Handler>> {
        self.handlers.read().by_name.get(name).cloned()
    }

    /// Registered and adopted handlers, oldest first.
    pub(crate) fn all_handlers(&self) -> Vec<Arc<Handler>> {
        let handlers = self.handlers.read();
        let mut all: Vec<Arc<Handler>> = handlers.ordered.iter().chain(&handlers.adopted).cloned().collect();
        all.sort_unstable_by_key(|handler| handler.id());
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        *self.handlers.write() = Handlers::default();
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{
        component::{Component, ComponentModel, Registration},
        config::Config,
        dependency::DependencyModel,
        handler::HandlerState,
        types::{ServiceType, TypeDef},
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    trait Sink: Send + Sync {}

    struct Console;
    struct File;

    impl Sink for Console {}
    impl Sink for File {}

    struct Writer;

    fn model<R: Registration>(registration: R) -> ComponentModel {
        registration.into_model(&Config::default()).unwrap()
    }

    #[test]
    #[traced_test]
    fn test_handlers_in_registration_order() {
        let registry = Registry::new();
        registry
            .register(model(Component::<File>::new().service::<dyn Sink>(|file| file).instance(Arc::new(File))))
            .unwrap();
        registry
            .register(model(Component::<Console>::new().service::<dyn Sink>(|console| console).instance(Arc::new(Console))))
            .unwrap();

        let service = ServiceType::contract::<dyn Sink>();
        let names: Vec<String> = registry.handlers(&service).iter().map(|handler| handler.name().to_owned()).collect();

        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("File"));
        assert!(names[1].ends_with("Console"));
        assert_eq!(registry.handler(&service).unwrap().name(), names[0]);
    }

    #[test]
    #[traced_test]
    fn test_duplicate_name() {
        let registry = Registry::new();
        registry
            .register(model(Component::<File>::new().named("sink").expose_self().instance(Arc::new(File))))
            .unwrap();

        let err = registry
            .register(model(Component::<Console>::new().named("sink").expose_self().instance(Arc::new(Console))))
            .unwrap_err();

        assert_eq!(err.to_string(), "Component with name 'sink' was already registered");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_waiting_handler_refreshed_on_registration() {
        let registry = Registry::new();
        let writer = registry
            .register(model(
                Component::<Writer>::new()
                    .expose_self()
                    .depends_on(DependencyModel::service::<dyn Sink>())
                    .activator(|_| Ok(Writer)),
            ))
            .unwrap();
        assert_eq!(writer.state(), HandlerState::WaitingDependency);

        // Cached negative lookup must not survive the registration
        assert!(registry.handler(&ServiceType::contract::<dyn Sink>()).is_none());
        registry
            .register(model(Component::<Console>::new().service::<dyn Sink>(|console| console).instance(Arc::new(Console))))
            .unwrap();

        assert_eq!(writer.state(), HandlerState::Valid);
        assert!(registry.handler(&ServiceType::contract::<dyn Sink>()).is_some());
    }

    #[test]
    #[traced_test]
    fn test_exact_registration_preferred_over_open_generic() {
        struct Cache;

        let def = TypeDef::class("Cache").param("T").build();
        let registry = Registry::new();
        registry
            .register(model(Component::<Cache>::generic(&def).expose_self().activator(|_| Ok(Cache))))
            .unwrap();
        registry
            .register(model(
                Component::<Cache>::new()
                    .named("int cache")
                    .generic_service(ServiceType::generic(&def, [ServiceType::value::<i32>()]))
                    .activator(|_| Ok(Cache)),
            ))
            .unwrap();

        let closed_int = ServiceType::generic(&def, [ServiceType::value::<i32>()]);
        let closed_str = ServiceType::generic(&def, [ServiceType::of::<String>()]);

        assert_eq!(registry.handler(&closed_int).unwrap().name(), "int cache");
        assert!(registry.handler(&closed_str).unwrap().is_open());
        assert_eq!(registry.handlers(&closed_int).len(), 2);
    }
}
