use std::{collections::HashMap, time::Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::{
    activator::ComponentActivator,
    any::InstanceKey,
    burden::{Burden, ReleaseMode},
    creation_context::CreationContext,
    errors::{LifestyleErrorKind, ReleaseErrorKind, ResolveErrorKind},
    lifestyle::{LifestyleManager, PoolConfig, PoolExhaustion, ReleaseDecision},
};

#[derive(Default)]
struct Pool {
    warmed: bool,
    free: Vec<Burden>,
    loaned: HashMap<InstanceKey, Burden>,
    /// Instances being created against the pool's capacity.
    pending: usize,
}

impl Pool {
    fn size(&self) -> usize {
        self.free.len() + self.loaned.len() + self.pending
    }
}

/// Instances borrowed from a bounded pool and returned to it on release.
pub struct PooledLifestyle {
    config: PoolConfig,
    pool: Mutex<Pool>,
    returned: Condvar,
}

impl PooledLifestyle {
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pool: Mutex::new(Pool::default()),
            returned: Condvar::new(),
        }
    }

    /// Instances currently waiting in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.pool.lock().free.len()
    }

    fn warm_up(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<(), ResolveErrorKind> {
        let count = {
            let mut pool = self.pool.lock();
            if pool.warmed {
                return Ok(());
            }
            pool.warmed = true;
            let count = self.config.initial.saturating_sub(pool.size());
            pool.pending += count;
            count
        };

        let mut created = Vec::with_capacity(count);
        let mut result = Ok(());
        for _ in 0..count {
            match activator.create(ctx) {
                Ok(burden) => created.push(burden),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        let mut pool = self.pool.lock();
        pool.pending -= count;
        pool.free.extend(created);
        self.returned.notify_all();
        debug!(component = activator.handler().name(), available = pool.free.len(), "Pool warmed up");
        result
    }

    fn acquire(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        let component = activator.handler().name();
        let mut deadline = None;
        let mut pool = self.pool.lock();
        loop {
            if let Some(burden) = pool.free.pop() {
                pool.loaned.insert(burden.key(), burden.clone());
                debug!(component, "Borrowed from pool");
                return Ok(burden);
            }

            if pool.size() < self.config.max {
                pool.pending += 1;
                drop(pool);
                let result = activator.create(ctx);
                let mut pool = self.pool.lock();
                pool.pending -= 1;
                return match result {
                    Ok(burden) => {
                        pool.loaned.insert(burden.key(), burden.clone());
                        Ok(burden)
                    }
                    Err(err) => {
                        self.returned.notify_one();
                        Err(err)
                    }
                };
            }

            match self.config.exhausted {
                PoolExhaustion::Grow => {
                    drop(pool);
                    debug!(component, max = self.config.max, "Pool exhausted, creating an instance beyond it");
                    return activator.create(ctx);
                }
                PoolExhaustion::Wait(timeout) => {
                    let deadline = *deadline.get_or_insert_with(|| Instant::now() + timeout);
                    if self.returned.wait_until(&mut pool, deadline).timed_out() && pool.free.is_empty() {
                        let err = LifestyleErrorKind::PoolTimeout {
                            component: component.to_owned(),
                            timeout,
                        };
                        warn!("{}", err);
                        return Err(err.into());
                    }
                }
            }
        }
    }
}

impl LifestyleManager for PooledLifestyle {
    fn resolve(&self, ctx: &mut CreationContext<'_>, activator: &ComponentActivator) -> Result<Burden, ResolveErrorKind> {
        self.warm_up(ctx, activator)?;
        let burden = self.acquire(ctx, activator)?;
        // Roots go back to the pool through the release policy, dependencies with their owner
        if ctx.is_root() {
            ctx.track(&burden);
        } else {
            ctx.attach(burden.clone());
        }
        Ok(burden)
    }

    fn release(&self, burden: &Burden) -> ReleaseDecision {
        let mut pool = self.pool.lock();
        if pool.loaned.remove(&burden.key()).is_some() {
            if pool.free.len() < self.config.max {
                pool.free.push(burden.clone());
                self.returned.notify_one();
                return ReleaseDecision::Recycle;
            }
            return ReleaseDecision::Decommission;
        }
        if pool.free.contains(burden) {
            debug!(component = burden.component(), "Instance already returned to pool");
            return ReleaseDecision::Retain;
        }
        ReleaseDecision::Decommission
    }

    fn dispose(&self) -> Result<(), ReleaseErrorKind> {
        let burdens: Vec<Burden> = {
            let mut pool = self.pool.lock();
            let loaned = pool.loaned.drain().map(|(_, burden)| burden).collect::<Vec<_>>();
            pool.free.drain(..).chain(loaned).collect()
        };

        let failures = burdens
            .iter()
            .filter_map(|burden| burden.release(ReleaseMode::Forced).err())
            .collect();
        ReleaseErrorKind::collect(failures)
    }
}
