//! Explicitly begun regions in which scoped components are shared.

use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::{
    any::Instance,
    burden::{Burden, ReleaseMode},
    cache::ScopeCache,
    container::Container,
    context::Context,
    errors::{LifestyleErrorKind, ReleaseErrorKind, ResolveErrorKind},
    handler::HandlerId,
    types::ServiceType,
};

#[cfg(feature = "async")]
tokio::task_local! {
    static CURRENT_SCOPE: Arc<ScopeFrame>;
}

/// Scope the resolution of the current task runs in, if it runs inside [`Scope::run`].
#[cfg(feature = "async")]
pub(crate) fn ambient_scope() -> Option<Arc<ScopeFrame>> {
    CURRENT_SCOPE.try_with(Arc::clone).ok()
}

#[cfg(not(feature = "async"))]
pub(crate) fn ambient_scope() -> Option<Arc<ScopeFrame>> {
    None
}

/// Finds the scope frame a scoped component is cached in.
pub trait ScopeAccessor: Send + Sync {
    fn current(&self) -> Option<Arc<ScopeFrame>>;
}

/// Reads the scope [`Scope::run`] made ambient for the current task.
#[cfg(feature = "async")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskScopeAccessor;

#[cfg(feature = "async")]
impl ScopeAccessor for TaskScopeAccessor {
    fn current(&self) -> Option<Arc<ScopeFrame>> {
        ambient_scope()
    }
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// One level of the scope stack and the instances cached in it.
pub struct ScopeFrame {
    id: u64,
    parent: Option<Arc<ScopeFrame>>,
    depth: usize,
    cache: Mutex<ScopeCache>,
    /// Creation lock per component.
    slots: Mutex<HashMap<HandlerId, Arc<Mutex<()>>>>,
    ended: AtomicBool,
}

impl ScopeFrame {
    pub(crate) fn new(parent: Option<Arc<ScopeFrame>>) -> Arc<Self> {
        let depth = parent.as_ref().map_or(0, |parent| parent.depth + 1);
        Arc::new(Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            parent,
            depth,
            cache: Mutex::new(ScopeCache::new()),
            slots: Mutex::new(HashMap::new()),
            ended: AtomicBool::new(false),
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<ScopeFrame>> {
        self.parent.as_ref()
    }

    /// Number of frames above this one.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Number of instances cached in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the instance of `handler` cached in the frame, creating it at most once.
    ///
    /// Only creations of the same component wait for each other. An instance
    /// created while the frame ends is destroyed right away.
    pub(crate) fn get_or_create(
        &self,
        handler: HandlerId,
        component: &str,
        create: impl FnOnce() -> Result<Burden, ResolveErrorKind>,
    ) -> Result<Burden, ResolveErrorKind> {
        if let Some(burden) = self.cache.lock().get(handler) {
            debug!(component, scope = self.id, "Found in scope cache");
            return Ok(burden);
        }

        let slot = self.slots.lock().entry(handler).or_default().clone();
        let _guard = slot.lock();
        if let Some(burden) = self.cache.lock().get(handler) {
            debug!(component, scope = self.id, "Found in scope cache after waiting");
            return Ok(burden);
        }

        let burden = create()?;
        let cached = self.cache.lock().insert(handler, burden.clone());
        let Some(burden) = cached else {
            if let Err(failure) = burden.release(ReleaseMode::Forced) {
                warn!("Cleanup of '{}' created in an ended scope: {}", component, failure);
            }
            let err = LifestyleErrorKind::ScopeEnded {
                component: component.to_owned(),
            };
            error!("{}", err);
            return Err(err.into());
        };
        debug!(component, scope = self.id, "Cached in scope");
        Ok(burden)
    }

    /// Ends the frame, releasing its instances last resolved first. Ending twice is a no-op.
    ///
    /// # Errors
    /// Every decommission failure of the released instances.
    pub fn end(&self) -> Result<(), ReleaseErrorKind> {
        if self.ended.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let burdens = self.cache.lock().take_for_release();
        self.slots.lock().clear();
        debug!(scope = self.id, instances = burdens.len(), "Scope ended");

        let failures = burdens
            .iter()
            .filter_map(|burden| burden.release(ReleaseMode::Forced).err())
            .collect();
        ReleaseErrorKind::collect(failures)
    }
}

impl Debug for ScopeFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFrame")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

/// Handle of an active scope. The scope ends when the handle is dropped.
///
/// Resolutions through the handle run with its frame as the innermost scope.
pub struct Scope {
    container: Container,
    frame: Arc<ScopeFrame>,
}

impl Scope {
    pub(crate) fn new(container: Container, parent: Option<Arc<ScopeFrame>>) -> Self {
        let frame = ScopeFrame::new(parent);
        debug!(scope = frame.id(), depth = frame.depth(), "Scope begun");
        Self { container, frame }
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> &Arc<ScopeFrame> {
        &self.frame
    }

    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Begins a scope nested in this one.
    #[must_use]
    pub fn begin_scope(&self) -> Scope {
        Scope::new(self.container.clone(), Some(self.frame.clone()))
    }

    /// # Errors
    /// See [`Container::resolve`].
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolveErrorKind> {
        self.container.inner.resolve_typed::<S>(Some(&self.frame), None)
    }

    /// # Errors
    /// See [`Container::try_resolve`].
    pub fn try_resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<S>>, ResolveErrorKind> {
        self.container.inner.try_resolve_typed::<S>(Some(&self.frame), None)
    }

    /// # Errors
    /// See [`Container::resolve_with`].
    pub fn resolve_with<S: ?Sized + Send + Sync + 'static>(&self, arguments: &Context) -> Result<Arc<S>, ResolveErrorKind> {
        self.container.inner.resolve_typed::<S>(Some(&self.frame), Some(arguments))
    }

    /// # Errors
    /// See [`Container::resolve_named`].
    pub fn resolve_named<S: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<S>, ResolveErrorKind> {
        self.container.inner.resolve_named::<S>(name, Some(&self.frame))
    }

    /// # Errors
    /// See [`Container::resolve_all`].
    pub fn resolve_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, ResolveErrorKind> {
        self.container.inner.resolve_all::<S>(Some(&self.frame))
    }

    /// # Errors
    /// See [`Container::resolve_service`].
    pub fn resolve_service(&self, service: &ServiceType) -> Result<Instance, ResolveErrorKind> {
        self.container.inner.resolve_instance(service, Some(&self.frame), None)
    }

    /// # Errors
    /// See [`Container::try_resolve_service`].
    pub fn try_resolve_service(&self, service: &ServiceType) -> Result<Option<Instance>, ResolveErrorKind> {
        self.container.inner.try_resolve_instance(service, Some(&self.frame))
    }

    /// Ends the scope now instead of on drop.
    ///
    /// # Errors
    /// Every decommission failure of the scoped instances.
    pub fn end(self) -> Result<(), ReleaseErrorKind> {
        self.frame.end()
    }

    /// Runs `future` with this scope ambient: container resolutions inside it,
    /// on whatever worker thread they resume, use the scope as if resolved
    /// through the handle. Tasks spawned from the future don't inherit it.
    #[cfg(feature = "async")]
    pub async fn run<F: core::future::Future>(&self, future: F) -> F::Output {
        CURRENT_SCOPE.scope(self.frame.clone(), future).await
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Err(err) = self.frame.end() {
            warn!("Scope {} ended with failures: {}", self.frame.id(), err);
        }
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("frame", &self.frame).finish_non_exhaustive()
    }
}
