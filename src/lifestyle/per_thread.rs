use std::{
    collections::HashMap,
    thread::{self, ThreadId},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    activator::ComponentActivator,
    burden::{Burden, ReleaseMode},
    creation_context::CreationContext,
    errors::{ReleaseErrorKind, ResolveErrorKind},
    lifestyle::{LifestyleManager, ReleaseDecision},
};

/// One instance per OS thread, destroyed with the container.
#[derive(Debug, Default)]
pub struct PerThreadLifestyle {
    instances: Mutex<HashMap<ThreadId, Burden>>,
}

impl PerThreadLifestyle {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifestyleManager for PerThreadLifestyle {
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        let thread = thread::current().id();
        if let Some(burden) = self.instances.lock().get(&thread) {
            debug!(component = burden.component(), ?thread, "Found in thread slot");
            return Ok(burden.clone());
        }

        // Only this thread inserts under its id, so creating without the lock can't race
        let burden = activator.create(ctx)?;
        if burden.requires_decommission() {
            ctx.track(&burden);
        }
        Ok(self.instances.lock().entry(thread).or_insert(burden).clone())
    }

    fn release(&self, _burden: &Burden) -> ReleaseDecision {
        ReleaseDecision::Retain
    }

    fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        let mut burdens: Vec<Burden> = self.instances.lock().drain().map(|(_, burden)| burden).collect();
        burdens.sort_unstable_by_key(|burden| core::cmp::Reverse(burden.id()));

        let failures = burdens
            .iter()
            .filter_map(|burden| burden.release(ReleaseMode::Forced).err())
            .collect();
        ReleaseErrorKind::collect(failures)
    }
}

#[cfg(test)]
mod tests {
    use crate::{component::Component, container::Container};

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Buffer;

    #[test]
    #[traced_test]
    fn test_one_instance_per_thread() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        {
            let destroyed = destroyed.clone();
            container
                .register(
                    Component::<Buffer>::new()
                        .expose_self()
                        .per_thread()
                        .activator(|_| Ok(Buffer))
                        .on_destroy(move |_| {
                            destroyed.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }),
                )
                .unwrap();
        }

        let first = container.resolve::<Buffer>().unwrap();
        let again = container.resolve::<Buffer>().unwrap();
        let other = std::thread::scope(|scope| scope.spawn(|| container.resolve::<Buffer>().unwrap()).join().unwrap());

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));

        container.dispose().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
