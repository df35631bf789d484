use std::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Type-erased instance produced by a component activator.
///
/// The payload is always the implementation value itself (`Arc<I>` erased),
/// so the allocation address identifies the instance for release tracking.
pub type Instance = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        // `type_name` of generic types contains paths inside the brackets too
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rsplit_once("::") {
            Some((path, _)) => &self.name[path.len() + 2..],
            None => self.name,
        }
    }
}

/// Identity of an instance: the address of its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey(usize);

impl InstanceKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized>(instance: &Arc<T>) -> Self {
        Self(Arc::as_ptr(instance).cast::<()>() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::{Instance, InstanceKey, TypeInfo};

    use std::sync::Arc;

    trait Named: Send + Sync {}

    struct Value;

    impl Named for Value {}

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<Value>().short_name(), "Value");
        assert_eq!(TypeInfo::of::<Vec<Value>>().short_name(), "Vec<castellan::any::tests::Value>");
        assert_eq!(TypeInfo::of::<i32>().short_name(), "i32");
    }

    #[test]
    fn test_instance_key_survives_coercion() {
        let value = Arc::new(Value);
        let named: Arc<dyn Named> = value.clone();
        let erased: Instance = value.clone();

        assert_eq!(InstanceKey::of(&value), InstanceKey::of(&named));
        assert_eq!(InstanceKey::of(&value), InstanceKey::of(&erased));
        assert_ne!(InstanceKey::of(&value), InstanceKey::of(&Arc::new(Value)));
    }
}
