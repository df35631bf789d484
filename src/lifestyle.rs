//! Reuse policies deciding when a component's instance is created, shared and destroyed.

mod bound;
mod per_thread;
mod pooled;
mod scoped;
mod singleton;
mod transient;

use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
    time::Duration,
};

pub use bound::BoundLifestyle;
pub use per_thread::PerThreadLifestyle;
pub use pooled::PooledLifestyle;
pub use scoped::ScopedLifestyle;
pub use singleton::SingletonLifestyle;
pub use transient::TransientLifestyle;

use crate::{
    activator::ComponentActivator,
    burden::Burden,
    creation_context::CreationContext,
    errors::{ReleaseErrorKind, ResolveErrorKind},
    scope::ScopeAccessor,
    types::ServiceType,
};

/// What a lifestyle wants done with a burden whose release was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDecision {
    /// Keep the instance alive, the request is a no-op.
    Retain,
    /// The instance was taken back for reuse; untrack it without destroying it.
    Recycle,
    /// Destroy the instance and release what it owns.
    Decommission,
}

/// Per-component policy object obtaining instances through an activator.
pub trait LifestyleManager: Send + Sync {
    /// Returns the burden of the instance to hand out, creating it through
    /// `activator` when nothing reusable exists. The manager decides whether the
    /// burden is tracked, attached to its parent or owned by the manager.
    ///
    /// # Errors
    /// Creation errors and lifestyle violations.
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind>;

    fn release(&self, burden: &Burden) -> ReleaseDecision;

    /// Destroys every instance the manager still holds.
    ///
    /// # Errors
    /// Decommission failures of the destroyed instances.
    fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        Ok(())
    }

    /// Whether an instance of this component still being created may be handed
    /// to a dependency that refers back to it in the same resolution.
    fn allows_reentry(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolExhaustion {
    /// Create instances beyond the maximum; they are destroyed on release.
    Grow,
    /// Block until an instance is returned, failing after the timeout.
    Wait(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub initial: usize,
    pub max: usize,
    pub exhausted: PoolExhaustion,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial: 5,
            max: 15,
            exhausted: PoolExhaustion::Grow,
        }
    }
}

/// Ancestor a bound component attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingTarget {
    /// The first ancestor exposing this service.
    Service(ServiceType),
    /// The ancestor registered under this name.
    Component(Cow<'static, str>),
}

impl BindingTarget {
    #[inline]
    #[must_use]
    pub fn service<S: ?Sized + 'static>() -> Self {
        Self::Service(ServiceType::contract::<S>())
    }
}

impl Display for BindingTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Service(service) => write!(f, "a component exposing {service}"),
            BindingTarget::Component(name) => write!(f, "component '{name}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Nearest,
    Outermost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binder {
    pub target: BindingTarget,
    pub selection: Selection,
}

impl Binder {
    #[inline]
    #[must_use]
    pub fn nearest(target: BindingTarget) -> Self {
        Self {
            target,
            selection: Selection::Nearest,
        }
    }

    #[inline]
    #[must_use]
    pub fn outermost(target: BindingTarget) -> Self {
        Self {
            target,
            selection: Selection::Outermost,
        }
    }
}

pub type LifestyleFactory = Arc<dyn Fn() -> Box<dyn LifestyleManager> + Send + Sync>;

#[derive(Clone)]
pub enum Lifestyle {
    Transient,
    Singleton,
    PerThread,
    /// Pool sizes, or the container's defaults when `None`.
    Pooled(Option<PoolConfig>),
    /// Scope accessor, or the scope the resolution runs in when `None`.
    Scoped(Option<Arc<dyn ScopeAccessor>>),
    Bound(Binder),
    Custom(LifestyleFactory),
}

impl Lifestyle {
    #[must_use]
    pub fn custom<M, F>(factory: F) -> Self
    where
        M: LifestyleManager + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(move || Box::new(factory()) as Box<dyn LifestyleManager>))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Lifestyle::Transient => "transient",
            Lifestyle::Singleton => "singleton",
            Lifestyle::PerThread => "per-thread",
            Lifestyle::Pooled(_) => "pooled",
            Lifestyle::Scoped(_) => "scoped",
            Lifestyle::Bound(_) => "bound",
            Lifestyle::Custom(_) => "custom",
        }
    }

    pub(crate) fn manager(&self) -> Box<dyn LifestyleManager> {
        match self {
            Lifestyle::Transient => Box::new(TransientLifestyle),
            Lifestyle::Singleton => Box::new(SingletonLifestyle::new()),
            Lifestyle::PerThread => Box::new(PerThreadLifestyle::new()),
            Lifestyle::Pooled(config) => Box::new(PooledLifestyle::new(config.unwrap_or_default())),
            Lifestyle::Scoped(accessor) => Box::new(ScopedLifestyle::new(accessor.clone())),
            Lifestyle::Bound(binder) => Box::new(BoundLifestyle::new(binder.clone())),
            Lifestyle::Custom(factory) => factory(),
        }
    }
}

impl Debug for Lifestyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Lifestyle::Pooled(config) => f.debug_tuple("Pooled").field(config).finish(),
            Lifestyle::Bound(binder) => f.debug_tuple("Bound").field(binder).finish(),
            other => f.write_str(other.name()),
        }
    }
}
