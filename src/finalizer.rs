use std::sync::Arc;

use crate::any::Instance;

/// Decommission concern of a component, run when its instance is destroyed.
pub trait Finalizer<I>: Send + Sync + 'static {
    /// # Errors
    /// The error is reported by the release that destroyed the instance.
    /// Other finalizers of the same release still run.
    fn finalize(&self, instance: Arc<I>) -> Result<(), anyhow::Error>;
}

pub(crate) type BoxedFinalizer = Arc<dyn Fn(&Instance) -> Result<(), anyhow::Error> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<I, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    I: Send + Sync + 'static,
    Fin: Finalizer<I>,
{
    Arc::new(move |instance: &Instance| match instance.clone().downcast::<I>() {
        Ok(instance) => finalizer.finalize(instance),
        Err(_) => Err(anyhow::anyhow!(
            "Instance passed to the finalizer isn't a {}",
            core::any::type_name::<I>()
        )),
    })
}

impl<F, I> Finalizer<I> for F
where
    F: Fn(Arc<I>) -> Result<(), anyhow::Error> + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&self, instance: Arc<I>) -> Result<(), anyhow::Error> {
        self(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::{boxed_finalizer_factory, Finalizer};
    use crate::any::Instance;

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Connection;

    struct CountingFinalizer(Arc<AtomicU8>);

    impl Finalizer<Connection> for CountingFinalizer {
        fn finalize(&self, _instance: Arc<Connection>) -> Result<(), anyhow::Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_boxed_finalizer_factory() {
        let finalize_count = Arc::new(AtomicU8::new(0));
        let finalizer = boxed_finalizer_factory(CountingFinalizer(finalize_count.clone()));

        let instance: Instance = Arc::new(Connection);
        finalizer(&instance).unwrap();
        finalizer(&instance).unwrap();

        assert_eq!(finalize_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_wrong_instance_type() {
        let finalizer = boxed_finalizer_factory::<Connection, _>(|_: Arc<Connection>| Ok::<_, anyhow::Error>(()));

        let instance: Instance = Arc::new(1u8);
        assert!(finalizer(&instance).is_err());
    }
}
