//! Handlers: the runtime side of a registered component.

mod generic;

use std::{
    any::type_name,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tracing::{debug, error};

pub use generic::{GenericServiceStrategy, ImplementationMatchingStrategy};

use crate::{
    activator::ComponentActivator,
    any::Instance,
    burden::Burden,
    component::ComponentModel,
    context::Context,
    creation_context::CreationContext,
    dependency::{DependencyKind, DependencyModel},
    errors::{MissingDependency, MissingReason, ReleaseErrorKind, ResolveErrorKind},
    lifestyle::{LifestyleManager, ReleaseDecision},
    registry::Registry,
    types::ServiceType,
};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a handler; also its registration order.
pub type HandlerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// A required dependency can't be supplied by the registry yet.
    WaitingDependency,
    Valid,
}

enum HandlerKind {
    Closed {
        lifestyle: Box<dyn LifestyleManager>,
    },
    Open {
        sub_handlers: RwLock<HashMap<ServiceType, Arc<Handler>>>,
        built: AtomicUsize,
    },
}

/// Resolves instances of one component.
pub struct Handler {
    id: HandlerId,
    model: Arc<ComponentModel>,
    valid: AtomicBool,
    kind: HandlerKind,
}

/// An instance handed out by a handler.
pub(crate) struct Resolution {
    pub(crate) handler: Arc<Handler>,
    pub(crate) instance: Instance,
}

impl Resolution {
    pub(crate) fn view(&self, service: &ServiceType) -> Instance {
        self.handler.model.view(service, &self.instance)
    }

    pub(crate) fn typed<S: ?Sized + Send + Sync + 'static>(&self, service: &ServiceType) -> Result<Arc<S>, ResolveErrorKind> {
        if let Some(view) = self.view(service).downcast_ref::<Arc<S>>() {
            return Ok(view.clone());
        }
        let err = ResolveErrorKind::IncorrectType {
            component: self.handler.name().to_owned(),
            expected: type_name::<S>(),
        };
        error!("{}", err);
        Err(err)
    }
}

impl Handler {
    pub(crate) fn new(model: Arc<ComponentModel>) -> Arc<Self> {
        let kind = if model.is_open() {
            HandlerKind::Open {
                sub_handlers: RwLock::new(HashMap::new()),
                built: AtomicUsize::new(0),
            }
        } else {
            HandlerKind::Closed {
                lifestyle: model.lifestyle.manager(),
            }
        };
        Arc::new(Self {
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            model,
            valid: AtomicBool::new(false),
            kind,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.model.name
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> &ComponentModel {
        &self.model
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.kind, HandlerKind::Open { .. })
    }

    #[must_use]
    pub fn state(&self) -> HandlerState {
        if self.valid.load(Ordering::Acquire) {
            HandlerState::Valid
        } else {
            HandlerState::WaitingDependency
        }
    }

    /// Number of closed sub-handlers built for an open generic component.
    #[must_use]
    pub fn specializations(&self) -> usize {
        match &self.kind {
            HandlerKind::Open { built, .. } => built.load(Ordering::Acquire),
            HandlerKind::Closed { .. } => 0,
        }
    }

    /// Whether the handler can resolve `service`, closing itself first when open.
    #[must_use]
    pub fn supports(&self, service: &ServiceType) -> bool {
        match &self.kind {
            HandlerKind::Closed { .. } => self.model.services.contains(service),
            HandlerKind::Open { .. } => self.supports_generic(service),
        }
    }

    pub(crate) fn missing(&self, dependency: &DependencyModel) -> MissingDependency {
        MissingDependency {
            key: dependency.key.to_string(),
            service: dependency.service.to_string(),
            reason: match dependency.kind {
                DependencyKind::Parameter => MissingReason::ParameterNotProvided,
                DependencyKind::Service | DependencyKind::Collection => MissingReason::ServiceNotRegistered,
            },
        }
    }

    /// Required dependencies neither the registry nor `arguments` can supply.
    pub(crate) fn missing_dependencies(&self, registry: &Registry, arguments: Option<&Context>) -> Vec<MissingDependency> {
        if self.is_open() {
            return Vec::new();
        }
        self.model
            .dependencies
            .iter()
            .chain(self.model.properties())
            .filter(|dependency| !dependency.optional && dependency.value.is_none())
            .filter(|dependency| {
                arguments
                    .and_then(|arguments| arguments.lookup(&dependency.key, dependency.service.type_info()))
                    .is_none()
            })
            .filter(|dependency| match dependency.kind {
                DependencyKind::Parameter => true,
                DependencyKind::Service => registry.handler(&dependency.service).is_none(),
                DependencyKind::Collection => false,
            })
            .map(|dependency| self.missing(dependency))
            .collect()
    }

    /// Moves a waiting handler to valid once every required dependency can be supplied.
    pub(crate) fn refresh(&self, registry: &Registry) -> HandlerState {
        if self.state() == HandlerState::WaitingDependency && self.missing_dependencies(registry, None).is_empty() {
            self.valid.store(true, Ordering::Release);
            debug!(component = self.name(), "Dependencies satisfied");
        }
        self.state()
    }

    pub(crate) fn resolve(
        self: &Arc<Self>,
        ctx: &mut CreationContext<'_>,
        requested: &ServiceType,
        required: bool,
    ) -> Result<Option<Resolution>, ResolveErrorKind> {
        let lifestyle = match &self.kind {
            HandlerKind::Open { .. } => {
                let closed = self.specialize(ctx.container(), requested)?;
                return closed.resolve(ctx, requested, required);
            }
            HandlerKind::Closed { lifestyle } => lifestyle,
        };

        if ctx.is_in_flight(self.id) {
            if lifestyle.allows_reentry() {
                if let Some(instance) = ctx.in_progress(self.id) {
                    debug!(component = self.name(), "Reusing instance under construction");
                    return Ok(Some(Resolution {
                        handler: self.clone(),
                        instance,
                    }));
                }
            }
            let err = ResolveErrorKind::CircularDependency {
                component: self.name().to_owned(),
                chain: ctx.chain(self.name()),
            };
            error!("{}", err);
            return Err(err);
        }

        if self.state() == HandlerState::WaitingDependency {
            let missing = self.missing_dependencies(&ctx.container().registry, ctx.root_arguments());
            if !missing.is_empty() {
                if !required {
                    debug!(component = self.name(), "Skipped, dependencies missing");
                    return Ok(None);
                }
                let err = ResolveErrorKind::UnsatisfiedDependency {
                    component: self.name().to_owned(),
                    missing,
                };
                error!("{}", err);
                return Err(err);
            }
        }

        ctx.enter(self.id, self.name());
        let result = lifestyle.resolve(ctx, &ComponentActivator::new(self.clone()));
        ctx.exit(self.id);

        let burden = match result {
            Ok(burden) => burden,
            Err(err) if !required && err.is_unsatisfied() => {
                debug!(component = self.name(), "Skipped, a dependency further down can't be supplied");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        Ok(Some(Resolution {
            handler: self.clone(),
            instance: burden.instance().clone(),
        }))
    }

    pub(crate) fn release_decision(&self, burden: &Burden) -> ReleaseDecision {
        match &self.kind {
            HandlerKind::Closed { lifestyle } => lifestyle.release(burden),
            HandlerKind::Open { .. } => ReleaseDecision::Decommission,
        }
    }

    /// Destroys the instances the lifestyle holds. Sub-handlers are disposed by the registry.
    pub(crate) fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        match &self.kind {
            HandlerKind::Closed { lifestyle } => lifestyle.dispose(),
            HandlerKind::Open { sub_handlers, .. } => {
                sub_handlers.write().clear();
                Ok(())
            }
        }
    }
}

impl Debug for Handler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.model.name)
            .field("state", &self.state())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
