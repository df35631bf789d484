use std::sync::Arc;

use tracing::error;

use crate::{
    activator::ComponentActivator,
    burden::Burden,
    creation_context::CreationContext,
    errors::{LifestyleErrorKind, ResolveErrorKind},
    lifestyle::{LifestyleManager, ReleaseDecision},
    scope::ScopeAccessor,
};

/// One instance per scope frame, destroyed when the frame ends.
pub struct ScopedLifestyle {
    accessor: Option<Arc<dyn ScopeAccessor>>,
}

impl ScopedLifestyle {
    /// Without an accessor, instances go to the innermost scope the resolution runs in.
    #[inline]
    #[must_use]
    pub fn new(accessor: Option<Arc<dyn ScopeAccessor>>) -> Self {
        Self { accessor }
    }
}

impl LifestyleManager for ScopedLifestyle {
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        let component = activator.handler().name();
        let frame = match &self.accessor {
            Some(accessor) => accessor.current(),
            None => ctx.scope().cloned(),
        };
        let Some(frame) = frame else {
            let err = LifestyleErrorKind::NoScope {
                component: component.to_owned(),
            };
            error!("{}", err);
            return Err(err.into());
        };
        if frame.is_ended() {
            let err = LifestyleErrorKind::ScopeEnded {
                component: component.to_owned(),
            };
            error!("{}", err);
            return Err(err.into());
        }

        frame.get_or_create(activator.handler().id(), component, || activator.create(ctx))
    }

    /// The frame releases its instances when it ends.
    fn release(&self, _burden: &Burden) -> ReleaseDecision {
        ReleaseDecision::Retain
    }

    fn allows_reentry(&self) -> bool {
        true
    }
}
