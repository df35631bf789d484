use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::InstanceKey,
    burden::{Burden, ReleaseMode},
    errors::ReleaseErrorKind,
};

/// Decides which burdens are roots needing explicit release, and releases them.
pub trait ReleasePolicy: Send + Sync {
    fn track(&self, burden: &Burden);

    fn has_track(&self, key: InstanceKey) -> bool;

    /// Releasing an untracked or already released instance is a no-op.
    ///
    /// # Errors
    /// Decommission failures of the released burden graph.
    fn release(&self, key: InstanceKey) -> Result<(), ReleaseErrorKind>;

    /// Force-releases every tracked burden, the most recently tracked first.
    ///
    /// # Errors
    /// Every decommission failure of the walk.
    fn dispose(&self) -> Result<(), ReleaseErrorKind>;
}

#[derive(Default)]
struct Tracked {
    next: u64,
    burdens: HashMap<InstanceKey, (u64, Burden)>,
}

#[derive(Default)]
pub struct LifecycledComponentsReleasePolicy {
    tracked: Arc<Mutex<Tracked>>,
}

impl LifecycledComponentsReleasePolicy {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().burdens.len()
    }
}

impl ReleasePolicy for LifecycledComponentsReleasePolicy {
    fn track(&self, burden: &Burden) {
        let key = burden.key();
        {
            let mut tracked = self.tracked.lock();
            if tracked.burdens.contains_key(&key) {
                return;
            }
            let order = tracked.next;
            tracked.next += 1;
            tracked.burdens.insert(key, (order, burden.clone()));
        }
        debug!(component = burden.component(), "Tracked");

        let tracked: Weak<Mutex<Tracked>> = Arc::downgrade(&self.tracked);
        burden.on_release(move |released| {
            if let Some(tracked) = tracked.upgrade() {
                let mut tracked = tracked.lock();
                if tracked.burdens.get(&key).is_some_and(|(_, burden)| burden == released) {
                    tracked.burdens.remove(&key);
                }
            }
        });
    }

    fn has_track(&self, key: InstanceKey) -> bool {
        self.tracked.lock().burdens.contains_key(&key)
    }

    fn release(&self, key: InstanceKey) -> Result<(), ReleaseErrorKind> {
        let Some(burden) = self.tracked.lock().burdens.get(&key).map(|(_, burden)| burden.clone()) else {
            debug!("Release of an untracked instance ignored");
            return Ok(());
        };
        burden.release(ReleaseMode::Requested).map(|outcome| {
            debug!(component = burden.component(), ?outcome, "Released");
        })
    }

    fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        let mut burdens: Vec<(u64, Burden)> = self.tracked.lock().burdens.drain().map(|(_, entry)| entry).collect();
        burdens.sort_unstable_by(|(left, _), (right, _)| right.cmp(left));

        let failures = burdens
            .into_iter()
            .filter_map(|(_, burden)| burden.release(ReleaseMode::Forced).err())
            .collect();
        ReleaseErrorKind::collect(failures)
    }
}

/// Tracks nothing; instances are never decommissioned through the policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrackingReleasePolicy;

impl ReleasePolicy for NoTrackingReleasePolicy {
    fn track(&self, _burden: &Burden) {}

    fn has_track(&self, _key: InstanceKey) -> bool {
        false
    }

    fn release(&self, _key: InstanceKey) -> Result<(), ReleaseErrorKind> {
        Ok(())
    }

    fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{LifecycledComponentsReleasePolicy, NoTrackingReleasePolicy, ReleasePolicy};
    use crate::{
        any::Instance,
        burden::{Burden, ReleaseMode},
        component::{Component, Registration as _},
        config::Config,
        handler::Handler,
    };

    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Session;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn burden(label: &'static str, log: &Log) -> Burden {
        let log = log.clone();
        let model = Component::<Session>::new()
            .named(label)
            .expose_self()
            .transient()
            .activator(|_| Ok(Session))
            .on_destroy(move |_| {
                log.lock().push(label);
                Ok(())
            })
            .into_model(&Config::default())
            .unwrap();
        Burden::new(Arc::new(Session) as Instance, Handler::new(Arc::new(model)), vec![])
    }

    #[test]
    #[traced_test]
    fn test_release_untracks() {
        let log = Log::default();
        let policy = LifecycledComponentsReleasePolicy::new();
        let session = burden("session", &log);

        policy.track(&session);
        policy.track(&session);
        assert_eq!(policy.tracked_count(), 1);
        assert!(policy.has_track(session.key()));

        policy.release(session.key()).unwrap();
        assert!(!policy.has_track(session.key()));
        assert_eq!(*log.lock(), vec!["session"]);

        // Second release of the same instance is a no-op
        policy.release(session.key()).unwrap();
        assert_eq!(*log.lock(), vec!["session"]);
    }

    #[test]
    #[traced_test]
    fn test_direct_release_untracks() {
        let log = Log::default();
        let policy = LifecycledComponentsReleasePolicy::new();
        let session = burden("session", &log);

        policy.track(&session);
        session.release(ReleaseMode::Requested).unwrap();

        assert_eq!(policy.tracked_count(), 0);
    }

    #[test]
    #[traced_test]
    fn test_dispose_releases_most_recent_first() {
        let log = Log::default();
        let policy = LifecycledComponentsReleasePolicy::new();
        for label in ["first", "second", "third"] {
            policy.track(&burden(label, &log));
        }

        policy.dispose().unwrap();

        assert_eq!(*log.lock(), vec!["third", "second", "first"]);
        assert_eq!(policy.tracked_count(), 0);
    }

    #[test]
    #[traced_test]
    fn test_no_tracking() {
        let log = Log::default();
        let policy = NoTrackingReleasePolicy;
        let session = burden("session", &log);

        policy.track(&session);
        assert!(!policy.has_track(session.key()));
        policy.release(session.key()).unwrap();
        policy.dispose().unwrap();

        assert!(log.lock().is_empty());
        assert!(!session.is_released());
    }
}
