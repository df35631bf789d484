use tracing::{debug, error};

use crate::{
    activator::ComponentActivator,
    burden::Burden,
    creation_context::CreationContext,
    errors::{LifestyleErrorKind, ResolveErrorKind},
    lifestyle::{Binder, LifestyleManager, ReleaseDecision},
};

/// One instance per instance of the ancestor component the binder selects,
/// released together with it.
#[derive(Debug, Clone)]
pub struct BoundLifestyle {
    binder: Binder,
}

impl BoundLifestyle {
    #[inline]
    #[must_use]
    pub fn new(binder: Binder) -> Self {
        Self { binder }
    }
}

impl LifestyleManager for BoundLifestyle {
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        let handler = activator.handler();
        let Some(anchor) = ctx.anchor(&self.binder) else {
            let err = LifestyleErrorKind::NoBindingTarget {
                component: handler.name().to_owned(),
                target: self.binder.target.to_string(),
            };
            error!("{}", err);
            return Err(err.into());
        };

        if let Some(burden) = ctx.bound(anchor, handler.id()) {
            debug!(component = handler.name(), "Found in binding target");
            return Ok(burden);
        }

        let burden = activator.create(ctx)?;
        ctx.bind(anchor, handler.id(), burden.clone());
        Ok(burden)
    }

    fn release(&self, _burden: &Burden) -> ReleaseDecision {
        ReleaseDecision::Decommission
    }

    fn allows_reentry(&self) -> bool {
        true
    }
}
