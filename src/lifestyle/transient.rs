use crate::{
    activator::ComponentActivator,
    burden::Burden,
    creation_context::CreationContext,
    errors::ResolveErrorKind,
    lifestyle::{LifestyleManager, ReleaseDecision},
};

/// A new instance per resolution.
///
/// As a dependency the instance is owned by the component that asked for it.
/// As a root it is tracked by the release policy when destroying it runs
/// decommission concerns.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransientLifestyle;

impl LifestyleManager for TransientLifestyle {
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        let burden = activator.create(ctx)?;
        ctx.attach_or_track(&burden);
        Ok(burden)
    }

    fn release(&self, _burden: &Burden) -> ReleaseDecision {
        ReleaseDecision::Decommission
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

    struct Request;
    struct Plain;

    #[test]
    #[traced_test]
    fn test_new_instance_per_resolution() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        {
            let destroyed = destroyed.clone();
            container
                .register(
                    Component::<Request>::new()
                        .expose_self()
                        .transient()
                        .activator(|_| Ok(Request))
                        .on_destroy(move |_| {
                            destroyed.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }),
                )
                .unwrap();
        }
        container
            .register(Component::<Plain>::new().expose_self().transient().activator(|_| Ok(Plain)))
            .unwrap();

        let first = container.resolve::<Request>().unwrap();
        let second = container.resolve::<Request>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(container.has_track(&first));

        container.release(&first).unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!container.has_track(&first));

        // Nothing to decommission, nothing to track
        let plain = container.resolve::<Plain>().unwrap();
        assert!(!container.has_track(&plain));

        container.dispose().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
