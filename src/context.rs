use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use crate::any::{Instance, TypeInfo};

/// Inline arguments for a single resolve call.
///
/// Consulted for the dependencies of the root component only, before the
/// registry: by dependency key first, then by type.
#[derive(Clone, Default)]
pub struct Context {
    pub(crate) by_type: BTreeMap<TypeInfo, Instance>,
    pub(crate) by_key: BTreeMap<Cow<'static, str>, Instance>,
}

impl Context {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies a value for parameter dependencies of type `T`.
    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.by_type.insert(TypeInfo::of::<T>(), Arc::new(value));
        self
    }

    /// Supplies a value for the parameter dependency named `key`.
    #[inline]
    pub fn insert_named<T: Send + Sync + 'static>(&mut self, key: impl Into<Cow<'static, str>>, value: T) -> &mut Self {
        self.by_key.insert(key.into(), Arc::new(value));
        self
    }

    /// Supplies an instance for service dependencies on `S`, bypassing the registry.
    #[inline]
    pub fn insert_service<S: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<S>) -> &mut Self {
        self.by_type.insert(TypeInfo::of::<S>(), Arc::new(service));
        self
    }

    #[inline]
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_named<T: Send + Sync + 'static>(mut self, key: impl Into<Cow<'static, str>>, value: T) -> Self {
        self.insert_named(key, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.by_key.is_empty()
    }

    pub(crate) fn lookup(&self, key: &str, type_info: Option<TypeInfo>) -> Option<&Instance> {
        self.by_key
            .get(key)
            .or_else(|| type_info.and_then(|type_info| self.by_type.get(&type_info)))
    }
}
