use std::collections::{HashMap, VecDeque};

use crate::{burden::Burden, handler::HandlerId};

/// Instances cached by one scope frame, keyed by the component that created them.
#[derive(Default)]
pub(crate) struct ScopeCache {
    map: HashMap<HandlerId, Burden>,
    resolved: ResolvedSet,
    closed: bool,
}

impl ScopeCache {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn get(&self, handler: HandlerId) -> Option<Burden> {
        self.map.get(&handler).cloned()
    }

    /// Caches `burden` unless the component already has an instance; returns the cached one.
    /// `None` once the cache was taken for release.
    pub(crate) fn insert(&mut self, handler: HandlerId, burden: Burden) -> Option<Burden> {
        if self.closed {
            return None;
        }
        if let Some(existing) = self.map.get(&handler) {
            return Some(existing.clone());
        }
        self.map.insert(handler, burden.clone());
        self.resolved.push(burden.clone());
        Some(burden)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Empties the cache, returning burdens in the order they must be released.
    pub(crate) fn take_for_release(&mut self) -> Vec<Burden> {
        self.closed = true;
        self.map.clear();
        core::mem::take(&mut self.resolved).into_release_order()
    }
}

/// Burdens in resolution order.
#[derive(Default)]
pub(crate) struct ResolvedSet(VecDeque<Burden>);

impl ResolvedSet {
    pub(crate) fn push(&mut self, burden: Burden) {
        self.0.push_back(burden);
    }

    /// Last resolved first: dependents go before what they depend on.
    pub(crate) fn into_release_order(self) -> Vec<Burden> {
        self.0.into_iter().rev().collect()
    }
}
