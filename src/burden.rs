use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    any::{Instance, InstanceKey},
    errors::ReleaseErrorKind,
    handler::Handler,
    lifestyle::{Lifestyle, ReleaseDecision},
};

static NEXT_BURDEN_ID: AtomicU64 = AtomicU64::new(1);

type Listener = Box<dyn FnOnce(&Burden) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// A caller asked for the release; the lifestyle decides what happens.
    Requested,
    /// Teardown of the owner; the instance is destroyed whatever its lifestyle.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Retained,
    Recycled,
    Decommissioned,
    AlreadyReleased,
}

/// Runtime record of one created instance and the burdens it owns.
#[derive(Clone)]
pub struct Burden(Arc<BurdenInner>);

struct BurdenInner {
    id: u64,
    instance: Instance,
    handler: Arc<Handler>,
    children: Mutex<Vec<Burden>>,
    requires_decommission: bool,
    requires_policy_release: bool,
    released: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
}

impl Burden {
    pub(crate) fn new(instance: Instance, handler: Arc<Handler>, children: Vec<Burden>) -> Self {
        let requires_decommission = handler.model().requires_decommission() || children.iter().any(Burden::requires_decommission);
        // a pooled loan has to go back to its pool even when nothing is destroyed
        let requires_policy_release = requires_decommission
            || matches!(handler.model().lifestyle(), Lifestyle::Pooled(_))
            || children.iter().any(Burden::requires_policy_release);
        Self(Arc::new(BurdenInner {
            id: NEXT_BURDEN_ID.fetch_add(1, Ordering::Relaxed),
            instance,
            handler,
            children: Mutex::new(children),
            requires_decommission,
            requires_policy_release,
            released: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> &Instance {
        &self.0.instance
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> InstanceKey {
        InstanceKey::of(&self.0.instance)
    }

    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<Handler> {
        &self.0.handler
    }

    #[inline]
    #[must_use]
    pub fn component(&self) -> &str {
        self.0.handler.model().name()
    }

    /// Whether destroying the instance, or anything it owns, runs decommission concerns.
    #[inline]
    #[must_use]
    pub fn requires_decommission(&self) -> bool {
        self.0.requires_decommission
    }

    /// Whether releasing the instance does anything: decommission concerns run
    /// or a pooled instance it owns is returned to its pool.
    #[inline]
    #[must_use]
    pub fn requires_policy_release(&self) -> bool {
        self.0.requires_policy_release
    }

    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.0.released.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn children(&self) -> Vec<Burden> {
        self.0.children.lock().clone()
    }

    /// Takes ownership of `child`: it is released when this burden is decommissioned.
    pub fn add_child(&self, child: Burden) {
        self.0.children.lock().push(child);
    }

    /// Registers a one-shot listener fired when the instance is decommissioned or recycled.
    pub fn on_release(&self, listener: impl FnOnce(&Burden) + Send + 'static) {
        self.0.listeners.lock().push(Box::new(listener));
    }

    fn notify(&self) {
        let listeners = core::mem::take(&mut *self.0.listeners.lock());
        for listener in listeners {
            listener(self);
        }
    }

    /// Releases the instance. Releasing an already released burden is a no-op.
    ///
    /// # Errors
    /// Returns every decommission failure of this burden and the burdens it owns.
    /// A failure never stops the rest of the walk.
    pub fn release(&self, mode: ReleaseMode) -> Result<ReleaseOutcome, ReleaseErrorKind> {
        if self.is_released() {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        let decision = match mode {
            ReleaseMode::Forced => ReleaseDecision::Decommission,
            ReleaseMode::Requested => self.0.handler.release_decision(self),
        };

        match decision {
            ReleaseDecision::Retain => Ok(ReleaseOutcome::Retained),
            ReleaseDecision::Recycle => {
                debug!(component = self.component(), "Recycled");
                self.notify();
                Ok(ReleaseOutcome::Recycled)
            }
            ReleaseDecision::Decommission => self.decommission(),
        }
    }

    fn decommission(&self) -> Result<ReleaseOutcome, ReleaseErrorKind> {
        if self.0.released.swap(true, Ordering::AcqRel) {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        let mut failures = Vec::new();
        for finalizer in &self.0.handler.model().decommission {
            if let Err(source) = finalizer(&self.0.instance) {
                let failure = ReleaseErrorKind::Decommission {
                    component: self.component().to_owned(),
                    source,
                };
                warn!("{}", failure);
                failures.push(failure);
            }
        }

        let children = core::mem::take(&mut *self.0.children.lock());
        for child in children.iter().rev() {
            if let Err(failure) = child.release(ReleaseMode::Requested) {
                failures.push(failure);
            }
        }

        debug!(component = self.component(), "Decommissioned");
        self.notify();

        ReleaseErrorKind::collect(failures).map(|()| ReleaseOutcome::Decommissioned)
    }
}

impl PartialEq for Burden {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Burden {}

impl Debug for Burden {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Burden")
            .field("id", &self.0.id)
            .field("component", &self.component())
            .field("requires_decommission", &self.0.requires_decommission)
            .field("requires_policy_release", &self.0.requires_policy_release)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
