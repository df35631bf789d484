use std::{
    any::type_name,
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    any::{Instance, TypeInfo},
    arguments::{Arguments, ResolvedValue},
    config::Config,
    dependency::{DependencyKind, DependencyModel},
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, RegistrationErrorKind},
    finalizer::{boxed_finalizer_factory, BoxedFinalizer, Finalizer},
    handler::{GenericServiceStrategy, ImplementationMatchingStrategy},
    instantiator::{boxed_instantiator_factory, Activator, Instantiator},
    lifestyle::{Binder, Lifestyle, PoolConfig},
    proxy::InterceptorReference,
    scope::ScopeAccessor,
    types::{ServiceType, TypeDef, TypeKind},
};

/// Turns the implementation instance into the typed view of one service: an `Arc<Arc<S>>`.
pub(crate) type Caster = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;
pub(crate) type Commission = Arc<dyn Fn(&Instance) -> Result<(), anyhow::Error> + Send + Sync>;
pub(crate) type PropertySetter = Arc<dyn Fn(&Instance, &ResolvedValue) -> Result<(), InstantiateErrorKind> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Implementation {
    /// A plain Rust type.
    Type(TypeInfo),
    /// A runtime-defined type, open while the component is a generic family.
    Generic(ServiceType),
    /// Known only once a closed service is requested: the requested type itself.
    LateBound,
}

#[derive(Clone)]
pub(crate) struct PropertyModel {
    pub(crate) dependency: DependencyModel,
    pub(crate) setter: PropertySetter,
}

/// Component descriptor: services, implementation, dependencies and lifestyle.
///
/// Immutable once registered. Closed generic components get their own
/// descriptor, derived from the open one.
#[derive(Clone)]
pub struct ComponentModel {
    pub(crate) name: String,
    pub(crate) services: Vec<ServiceType>,
    pub(crate) casters: HashMap<TypeInfo, Caster>,
    pub(crate) implementation: Implementation,
    pub(crate) dependencies: Vec<DependencyModel>,
    pub(crate) properties: Vec<PropertyModel>,
    pub(crate) lifestyle: Lifestyle,
    pub(crate) activator: Option<Activator>,
    pub(crate) commission: Vec<Commission>,
    pub(crate) decommission: Vec<BoxedFinalizer>,
    pub(crate) tracked: bool,
    pub(crate) interceptors: Vec<InterceptorReference>,
    pub(crate) service_strategy: Option<Arc<dyn GenericServiceStrategy>>,
    pub(crate) implementation_strategy: Option<Arc<dyn ImplementationMatchingStrategy>>,
    pub(crate) generic_arguments: Arc<[ServiceType]>,
}

impl ComponentModel {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn services(&self) -> &[ServiceType] {
        &self.services
    }

    #[inline]
    #[must_use]
    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyModel] {
        &self.dependencies
    }

    pub fn properties(&self) -> impl Iterator<Item = &DependencyModel> {
        self.properties.iter().map(|property| &property.dependency)
    }

    #[inline]
    #[must_use]
    pub fn lifestyle(&self) -> &Lifestyle {
        &self.lifestyle
    }

    #[inline]
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorReference] {
        &self.interceptors
    }

    #[inline]
    #[must_use]
    pub fn generic_arguments(&self) -> &[ServiceType] {
        &self.generic_arguments
    }

    /// Whether the component is a generic family still to be closed per request.
    #[must_use]
    pub fn is_open(&self) -> bool {
        match &self.implementation {
            Implementation::Generic(implementation) => implementation.is_open(),
            Implementation::Type(_) => false,
            Implementation::LateBound => self.services.iter().any(ServiceType::is_open),
        }
    }

    /// Number of generic arguments a closed form of this component takes.
    pub(crate) fn generic_arity(&self) -> usize {
        match &self.implementation {
            Implementation::Generic(implementation) => implementation.definition().map_or(0, |def| def.arity()),
            Implementation::Type(_) => 0,
            Implementation::LateBound => self.services.iter().map(ServiceType::parameter_count).max().unwrap_or(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn requires_decommission(&self) -> bool {
        self.tracked || !self.decommission.is_empty()
    }

    /// What a dependency on `service` receives: the typed view when the
    /// service has one, the implementation instance otherwise.
    pub(crate) fn view(&self, service: &ServiceType, instance: &Instance) -> Instance {
        service
            .type_info()
            .and_then(|info| self.casters.get(&info))
            .and_then(|caster| caster(instance))
            .unwrap_or_else(|| instance.clone())
    }

    pub(crate) fn has_view(&self, service: &ServiceType) -> bool {
        service.type_info().is_some_and(|info| self.casters.contains_key(&info))
    }

    pub(crate) fn validate(&self) -> Result<(), RegistrationErrorKind> {
        let component = || self.name.clone();

        if self.services.is_empty() {
            return Err(RegistrationErrorKind::NoServices { component: component() });
        }

        let classes: Vec<String> = self
            .services
            .iter()
            .filter(|service| service.kind() == Some(TypeKind::Class))
            .map(ToString::to_string)
            .collect();
        if classes.len() > 1 {
            return Err(RegistrationErrorKind::MultipleClassServices {
                component: component(),
                services: classes,
            });
        }

        let mut declared: Vec<&DependencyModel> = Vec::new();
        for dependency in self.dependencies.iter().chain(self.properties()) {
            if let Some(first) = declared.iter().find(|first| first.conflicts_with(dependency)) {
                return Err(RegistrationErrorKind::ConflictingDependency {
                    component: component(),
                    key: dependency.key.to_string(),
                    first: first.service.to_string(),
                    second: dependency.service.to_string(),
                });
            }
            declared.push(dependency);
        }

        if self.activator.is_none() {
            return Err(RegistrationErrorKind::MissingActivator { component: component() });
        }

        if let Lifestyle::Pooled(Some(pool)) = &self.lifestyle {
            if pool.max == 0 || pool.initial > pool.max {
                return Err(RegistrationErrorKind::UnsupportedConfiguration {
                    component: component(),
                    reason: format!(
                        "pool sizes must satisfy 0 < max and initial <= max, got initial {} and max {}",
                        pool.initial, pool.max
                    ),
                });
            }
        }

        let open_services = self.services.iter().filter(|service| service.is_open()).count();
        match &self.implementation {
            Implementation::Generic(implementation) if implementation.is_open() && open_services == 0 => {
                Err(RegistrationErrorKind::UnsupportedConfiguration {
                    component: component(),
                    reason: format!("generic implementation {implementation} exposes no open generic service"),
                })
            }
            Implementation::Type(_) if open_services > 0 => Err(RegistrationErrorKind::UnsupportedConfiguration {
                component: component(),
                reason: "a non-generic implementation can't expose open generic services".to_owned(),
            }),
            Implementation::Generic(implementation) if !implementation.is_open() && open_services > 0 => {
                Err(RegistrationErrorKind::UnsupportedConfiguration {
                    component: component(),
                    reason: format!("closed implementation {implementation} can't expose open generic services"),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Debug for ComponentModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentModel")
            .field("name", &self.name)
            .field("services", &self.services)
            .field("implementation", &self.implementation)
            .field("dependencies", &self.dependencies)
            .field("lifestyle", &self.lifestyle)
            .field("interceptors", &self.interceptors)
            .field("generic_arguments", &self.generic_arguments)
            .finish_non_exhaustive()
    }
}

/// Anything that produces a component descriptor for a container.
pub trait Registration {
    /// # Errors
    /// Returns [`RegistrationErrorKind`] if the descriptor is invalid.
    fn into_model(self, config: &Config) -> Result<ComponentModel, RegistrationErrorKind>;
}

impl Registration for ComponentModel {
    fn into_model(mut self, config: &Config) -> Result<ComponentModel, RegistrationErrorKind> {
        if let Lifestyle::Pooled(None) = self.lifestyle {
            self.lifestyle = Lifestyle::Pooled(Some(config.pool));
        }
        self.validate()?;
        Ok(self)
    }
}

/// Typed builder of a component implemented by `I`.
pub struct Component<I> {
    name: Option<String>,
    services: Vec<ServiceType>,
    casters: HashMap<TypeInfo, Caster>,
    implementation: Implementation,
    dependencies: Vec<DependencyModel>,
    properties: Vec<PropertyModel>,
    lifestyle: Option<Lifestyle>,
    activator: Option<Activator>,
    commission: Vec<Commission>,
    decommission: Vec<BoxedFinalizer>,
    tracked: bool,
    interceptors: Vec<InterceptorReference>,
    service_strategy: Option<Arc<dyn GenericServiceStrategy>>,
    implementation_strategy: Option<Arc<dyn ImplementationMatchingStrategy>>,
    _marker: PhantomData<fn() -> I>,
}

impl<I: Send + Sync + 'static> Default for Component<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Send + Sync + 'static> Component<I> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_implementation(Implementation::Type(TypeInfo::of::<I>()))
    }

    /// Generic family whose implementation is described by `def`.
    /// Every closed form is implemented by instances of `I`.
    #[must_use]
    pub fn generic(def: &Arc<TypeDef>) -> Self {
        Self::with_implementation(Implementation::Generic(ServiceType::open(def)))
    }

    #[must_use]
    pub fn late_bound() -> Self {
        Self::with_implementation(Implementation::LateBound)
    }

    fn with_implementation(implementation: Implementation) -> Self {
        Self {
            name: None,
            services: Vec::new(),
            casters: HashMap::new(),
            implementation,
            dependencies: Vec::new(),
            properties: Vec::new(),
            lifestyle: None,
            activator: None,
            commission: Vec::new(),
            decommission: Vec::new(),
            tracked: false,
            interceptors: Vec::new(),
            service_strategy: None,
            implementation_strategy: None,
            _marker: PhantomData,
        }
    }

    fn push_service(&mut self, service: ServiceType) {
        if !self.services.contains(&service) {
            self.services.push(service);
        }
    }

    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Exposes the contract `S`. `caster` must only coerce, e.g. `|instance| instance`.
    #[must_use]
    pub fn service<S: ?Sized + Send + Sync + 'static>(mut self, caster: fn(Arc<I>) -> Arc<S>) -> Self {
        self.push_service(ServiceType::contract::<S>());
        self.casters.insert(
            TypeInfo::of::<S>(),
            Arc::new(move |instance: &Instance| {
                let implementation = instance.clone().downcast::<I>().ok()?;
                Some(Arc::new(caster(implementation)) as Instance)
            }),
        );
        self
    }

    /// Exposes the implementation itself as the class service.
    #[must_use]
    pub fn expose_self(mut self) -> Self {
        match self.implementation.clone() {
            Implementation::Generic(implementation) => {
                self.push_service(implementation);
                self
            }
            _ => {
                self.push_service(ServiceType::of::<I>());
                self.casters.insert(
                    TypeInfo::of::<I>(),
                    Arc::new(|instance: &Instance| {
                        let implementation = instance.clone().downcast::<I>().ok()?;
                        Some(Arc::new(implementation) as Instance)
                    }),
                );
                self
            }
        }
    }

    /// Exposes a runtime-defined service, open or closed. Dependents receive the implementation instance.
    #[must_use]
    pub fn generic_service(mut self, service: ServiceType) -> Self {
        self.push_service(service);
        self
    }

    #[inline]
    #[must_use]
    pub fn lifestyle(mut self, lifestyle: Lifestyle) -> Self {
        self.lifestyle = Some(lifestyle);
        self
    }

    #[inline]
    #[must_use]
    pub fn transient(self) -> Self {
        self.lifestyle(Lifestyle::Transient)
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        self.lifestyle(Lifestyle::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn per_thread(self) -> Self {
        self.lifestyle(Lifestyle::PerThread)
    }

    #[inline]
    #[must_use]
    pub fn pooled(self, pool: PoolConfig) -> Self {
        self.lifestyle(Lifestyle::Pooled(Some(pool)))
    }

    #[inline]
    #[must_use]
    pub fn scoped(self) -> Self {
        self.lifestyle(Lifestyle::Scoped(None))
    }

    #[inline]
    #[must_use]
    pub fn scoped_with(self, accessor: Arc<dyn ScopeAccessor>) -> Self {
        self.lifestyle(Lifestyle::Scoped(Some(accessor)))
    }

    #[inline]
    #[must_use]
    pub fn bound_to(self, binder: Binder) -> Self {
        self.lifestyle(Lifestyle::Bound(binder))
    }

    #[inline]
    #[must_use]
    pub fn depends_on(mut self, dependency: DependencyModel) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Settable member, injected after construction when a component can supply it.
    #[must_use]
    pub fn property<S, F>(mut self, key: impl Into<Cow<'static, str>>, setter: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&I, Arc<S>) + Send + Sync + 'static,
    {
        let key = key.into();
        let dependency = DependencyModel::new(key.clone(), ServiceType::contract::<S>(), DependencyKind::Service).optional();
        self.properties.push(PropertyModel {
            dependency,
            setter: Arc::new(move |target: &Instance, value: &ResolvedValue| {
                let target = target.downcast_ref::<I>().ok_or(InstantiateErrorKind::IncorrectArgumentType {
                    key: key.to_string(),
                    expected: type_name::<I>(),
                })?;
                let value = value.service::<S>().ok_or(InstantiateErrorKind::IncorrectArgumentType {
                    key: key.to_string(),
                    expected: type_name::<S>(),
                })?;
                setter(target, value);
                Ok(())
            }),
        });
        self
    }

    /// Creates instances with `instantiator`, declaring the dependencies its extractors ask for.
    #[must_use]
    pub fn factory<Inst, Deps>(mut self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = I>,
        Deps: DependencyResolver,
    {
        self.dependencies.extend(Deps::dependencies());
        self.activator = Some(boxed_instantiator_factory(instantiator));
        self
    }

    /// Creates instances from the raw resolved arguments. Dependencies are declared with [`Self::depends_on`].
    #[must_use]
    pub fn activator<F>(mut self, activator: F) -> Self
    where
        F: Fn(&Arguments) -> Result<I, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.activator = Some(Arc::new(move |arguments: &Arguments| {
            activator(arguments).map(|instance| Arc::new(instance) as Instance)
        }));
        self
    }

    /// Hands out an externally created instance instead of constructing one.
    #[must_use]
    pub fn instance(mut self, instance: Arc<I>) -> Self {
        self.activator = Some(Arc::new(move |_: &Arguments| Ok(instance.clone() as Instance)));
        self
    }

    /// Commission concern, run after construction and property injection.
    #[must_use]
    pub fn on_create<F>(mut self, concern: F) -> Self
    where
        F: Fn(&I) -> Result<(), anyhow::Error> + Send + Sync + 'static,
    {
        self.commission.push(Arc::new(move |instance: &Instance| match instance.downcast_ref::<I>() {
            Some(instance) => concern(instance),
            None => Err(anyhow::anyhow!("Instance passed to the commission concern isn't a {}", type_name::<I>())),
        }));
        self
    }

    /// Decommission concern, run once when the instance is destroyed.
    #[must_use]
    pub fn on_destroy<F>(self, finalizer: F) -> Self
    where
        F: Fn(Arc<I>) -> Result<(), anyhow::Error> + Send + Sync + 'static,
    {
        self.finalizer(finalizer)
    }

    #[must_use]
    pub fn finalizer<Fin: Finalizer<I>>(mut self, finalizer: Fin) -> Self {
        self.decommission.push(boxed_finalizer_factory(finalizer));
        self
    }

    /// Tracks instances in the release policy even without decommission concerns.
    #[inline]
    #[must_use]
    pub fn tracked(mut self) -> Self {
        self.tracked = true;
        self
    }

    #[must_use]
    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = InterceptorReference>) -> Self {
        for interceptor in interceptors {
            if !self.interceptors.contains(&interceptor) {
                self.interceptors.push(interceptor);
            }
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn service_strategy(mut self, strategy: Arc<dyn GenericServiceStrategy>) -> Self {
        self.service_strategy = Some(strategy);
        self
    }

    #[inline]
    #[must_use]
    pub fn implementation_strategy(mut self, strategy: Arc<dyn ImplementationMatchingStrategy>) -> Self {
        self.implementation_strategy = Some(strategy);
        self
    }

    fn default_name(&self) -> String {
        match &self.implementation {
            Implementation::Type(info) => info.name.to_owned(),
            Implementation::Generic(implementation) => implementation
                .definition()
                .map_or_else(|| implementation.to_string(), |def| def.name().to_owned()),
            Implementation::LateBound => self
                .services
                .first()
                .map_or_else(|| type_name::<I>().to_owned(), ToString::to_string),
        }
    }
}

/// Folds repeated declarations of one key, a required declaration winning over optional ones.
fn merge_dependencies(dependencies: Vec<DependencyModel>) -> Vec<DependencyModel> {
    let mut merged: Vec<DependencyModel> = Vec::with_capacity(dependencies.len());
    for dependency in dependencies {
        match merged
            .iter_mut()
            .find(|existing| existing.key == dependency.key && !existing.conflicts_with(&dependency))
        {
            Some(existing) => {
                existing.optional &= dependency.optional;
                if existing.value.is_none() {
                    existing.value = dependency.value;
                }
            }
            None => merged.push(dependency),
        }
    }
    merged
}

impl<I: Send + Sync + 'static> Registration for Component<I> {
    fn into_model(self, config: &Config) -> Result<ComponentModel, RegistrationErrorKind> {
        let name = self.name.clone().unwrap_or_else(|| self.default_name());
        let lifestyle = match self.lifestyle {
            Some(lifestyle) => lifestyle,
            None => config.default_lifestyle.clone(),
        };

        ComponentModel {
            name,
            services: self.services,
            casters: self.casters,
            implementation: self.implementation,
            dependencies: merge_dependencies(self.dependencies),
            properties: self.properties,
            lifestyle,
            activator: self.activator,
            commission: self.commission,
            decommission: self.decommission,
            tracked: self.tracked,
            interceptors: self.interceptors,
            service_strategy: self.service_strategy,
            implementation_strategy: self.implementation_strategy,
            generic_arguments: Arc::from(Vec::new()),
        }
        .into_model(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{Component, Implementation, Registration};
    use crate::{
        config::Config,
        dependency::DependencyModel,
        errors::{InstantiateErrorKind, RegistrationErrorKind},
        inject::Inject,
        lifestyle::{Lifestyle, PoolConfig, PoolExhaustion},
        types::{ServiceType, TypeDef},
    };

    use std::sync::Arc;

    trait Logger: Send + Sync {}
    trait Sink: Send + Sync {}

    struct ConsoleLogger;

    impl Logger for ConsoleLogger {}
    impl Sink for ConsoleLogger {}

    struct Reporter;

    #[test]
    fn test_model_defaults() {
        let model = Component::<ConsoleLogger>::new()
            .service::<dyn Logger>(|logger| logger)
            .service::<dyn Sink>(|logger| logger)
            .service::<dyn Logger>(|logger| logger)
            .activator(|_| Ok(ConsoleLogger))
            .into_model(&Config::default())
            .unwrap();

        assert_eq!(model.name(), core::any::type_name::<ConsoleLogger>());
        assert_eq!(model.services().len(), 2);
        assert!(matches!(model.lifestyle(), Lifestyle::Singleton));
        assert_eq!(model.implementation(), &Implementation::Type(crate::any::TypeInfo::of::<ConsoleLogger>()));
        assert!(!model.is_open());
    }

    #[test]
    fn test_views() {
        let model = Component::<ConsoleLogger>::new()
            .service::<dyn Logger>(|logger| logger)
            .expose_self()
            .activator(|_| Ok(ConsoleLogger))
            .into_model(&Config::default())
            .unwrap();

        let instance: crate::any::Instance = Arc::new(ConsoleLogger);
        let view = model.view(&ServiceType::contract::<dyn Logger>(), &instance);
        let itself = model.view(&ServiceType::of::<ConsoleLogger>(), &instance);

        assert!(view.downcast_ref::<Arc<dyn Logger>>().is_some());
        assert!(itself.downcast_ref::<Arc<ConsoleLogger>>().is_some());
    }

    #[test]
    fn test_validation() {
        let config = Config::default();

        assert!(matches!(
            Component::<Reporter>::new().activator(|_| Ok(Reporter)).into_model(&config),
            Err(RegistrationErrorKind::NoServices { .. })
        ));
        assert!(matches!(
            Component::<Reporter>::new().expose_self().into_model(&config),
            Err(RegistrationErrorKind::MissingActivator { .. })
        ));
        assert!(matches!(
            Component::<Reporter>::new()
                .expose_self()
                .generic_service(ServiceType::of::<ConsoleLogger>())
                .activator(|_| Ok(Reporter))
                .into_model(&config),
            Err(RegistrationErrorKind::MultipleClassServices { .. })
        ));
        assert!(matches!(
            Component::<Reporter>::new()
                .expose_self()
                .depends_on(DependencyModel::parameter::<u32>().keyed("limit"))
                .depends_on(DependencyModel::parameter::<u64>().keyed("limit"))
                .activator(|_| Ok(Reporter))
                .into_model(&config),
            Err(RegistrationErrorKind::ConflictingDependency { .. })
        ));
        assert!(matches!(
            Component::<Reporter>::new()
                .expose_self()
                .pooled(PoolConfig {
                    initial: 3,
                    max: 2,
                    exhausted: PoolExhaustion::Grow,
                })
                .activator(|_| Ok(Reporter))
                .into_model(&config),
            Err(RegistrationErrorKind::UnsupportedConfiguration { .. })
        ));
    }

    #[test]
    fn test_generic_validation() {
        let repository = TypeDef::interface("IRepository").param("T").build();
        let implementation = TypeDef::class("Repository")
            .param("T")
            .implements(ServiceType::generic(&repository, [ServiceType::param(0)]))
            .build();

        let open = Component::<Reporter>::generic(&implementation)
            .generic_service(ServiceType::open(&repository))
            .activator(|_| Ok(Reporter))
            .into_model(&Config::default())
            .unwrap();
        assert!(open.is_open());
        assert_eq!(open.generic_arity(), 1);
        assert_eq!(open.name(), "Repository");

        assert!(matches!(
            Component::<Reporter>::new()
                .generic_service(ServiceType::open(&repository))
                .activator(|_| Ok(Reporter))
                .into_model(&Config::default()),
            Err(RegistrationErrorKind::UnsupportedConfiguration { .. })
        ));
    }

    #[test]
    fn test_factory_declares_dependencies() {
        let model = Component::<Reporter>::new()
            .expose_self()
            .factory(|Inject(_): Inject<dyn Logger>, Inject(_): Inject<dyn Logger>| Ok::<_, InstantiateErrorKind>(Reporter))
            .into_model(&Config::default())
            .unwrap();

        assert_eq!(model.dependencies().len(), 1);
        assert_eq!(model.dependencies()[0].service_type(), &ServiceType::contract::<dyn Logger>());
    }
}
