#[macro_use]
pub(crate) mod macros;

pub(crate) mod activator;
pub(crate) mod any;
pub(crate) mod arguments;
pub(crate) mod burden;
pub(crate) mod cache;
pub(crate) mod component;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod conversion;
pub(crate) mod creation_context;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod handler;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod lifestyle;
pub(crate) mod proxy;
pub(crate) mod registry;
pub(crate) mod release_policy;
pub(crate) mod scope;

pub mod types;

pub use activator::ComponentActivator;
pub use any::{Instance, InstanceKey, TypeInfo};
pub use arguments::Arguments;
pub use burden::{Burden, ReleaseMode, ReleaseOutcome};
pub use component::{Component, ComponentModel, Implementation, Registration};
pub use config::{Config, ReleasePolicyKind};
pub use container::{Container, ContainerBuilder};
pub use context::Context;
pub use conversion::{ConversionManager, DefaultConversionManager};
pub use creation_context::CreationContext;
pub use dependency::{DependencyKind, DependencyModel, DependencyValue};
pub use dependency_resolver::DependencyResolver;
pub use errors::{
    ConversionErrorKind, GenericClosingErrorKind, InstantiateErrorKind, LifestyleErrorKind, MissingDependency, MissingReason,
    RegistrationErrorKind, ReleaseErrorKind, ResolveErrorKind,
};
pub use finalizer::Finalizer;
pub use handler::{GenericServiceStrategy, Handler, HandlerId, HandlerState, ImplementationMatchingStrategy};
pub use inject::{Inject, InjectAll, InjectOptional, InjectParam};
pub use instantiator::Instantiator;
pub use lifestyle::{
    Binder, BindingTarget, BoundLifestyle, Lifestyle, LifestyleFactory, LifestyleManager, PerThreadLifestyle, PoolConfig,
    PoolExhaustion, PooledLifestyle, ReleaseDecision, ScopedLifestyle, Selection, SingletonLifestyle, TransientLifestyle,
};
pub use proxy::{InterceptorReference, ProxyFactory};
pub use release_policy::{LifecycledComponentsReleasePolicy, NoTrackingReleasePolicy, ReleasePolicy};
pub use scope::{Scope, ScopeAccessor, ScopeFrame};
pub use types::{Constraint, GenericParam, ServiceType, TypeDef, TypeDefBuilder, TypeKind};

#[cfg(feature = "async")]
pub use scope::TaskScopeAccessor;
