use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{
    activator::ComponentActivator,
    burden::{Burden, ReleaseMode},
    creation_context::CreationContext,
    errors::{ReleaseErrorKind, ResolveErrorKind},
    lifestyle::{LifestyleManager, ReleaseDecision},
};

/// One instance for the lifetime of the container.
#[derive(Debug, Default)]
pub struct SingletonLifestyle {
    slot: RwLock<Option<Burden>>,
    init: Mutex<()>,
}

impl SingletonLifestyle {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifestyleManager for SingletonLifestyle {
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        if let Some(burden) = self.slot.read().as_ref() {
            debug!(component = burden.component(), "Found in singleton slot");
            return Ok(burden.clone());
        }

        let _guard = self.init.lock();
        if let Some(burden) = self.slot.read().as_ref() {
            debug!(component = burden.component(), "Found in singleton slot after waiting");
            return Ok(burden.clone());
        }

        let burden = activator.create(ctx)?;
        if burden.requires_decommission() {
            ctx.track(&burden);
        }
        *self.slot.write() = Some(burden.clone());
        Ok(burden)
    }

    fn release(&self, _burden: &Burden) -> ReleaseDecision {
        ReleaseDecision::Retain
    }

    fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        let burden = self.slot.write().take();
        match burden {
            Some(burden) => burden.release(ReleaseMode::Forced).map(|_| ()),
            None => Ok(()),
        }
    }
}
