use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use crate::{any::Instance, types::ServiceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Supplied by the component registered for the service.
    Service,
    /// A plain value: an override, an inline argument or a converted literal.
    Parameter,
    /// Every component supporting the service, in registration order.
    Collection,
}

/// Statically supplied value of a dependency.
#[derive(Clone)]
pub enum DependencyValue {
    /// Used as is. Parameters hold an `Arc<T>`, services an `Arc<Arc<S>>`.
    Instance(Instance),
    /// Converted to the dependency's type by the container's conversion manager.
    Raw(String),
    /// Resolved from the component registered under this name.
    Component(Cow<'static, str>),
}

impl DependencyValue {
    #[inline]
    #[must_use]
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Instance(Arc::new(value))
    }

    #[inline]
    #[must_use]
    pub fn service<S: ?Sized + Send + Sync + 'static>(service: Arc<S>) -> Self {
        Self::Instance(Arc::new(service))
    }
}

impl Debug for DependencyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DependencyValue::Instance(_) => f.write_str("Instance(..)"),
            DependencyValue::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
            DependencyValue::Component(name) => f.debug_tuple("Component").field(name).finish(),
        }
    }
}

/// A constructor parameter or settable member of a component.
#[derive(Debug, Clone)]
pub struct DependencyModel {
    pub(crate) key: Cow<'static, str>,
    pub(crate) service: ServiceType,
    pub(crate) kind: DependencyKind,
    pub(crate) optional: bool,
    pub(crate) value: Option<DependencyValue>,
}

impl DependencyModel {
    #[must_use]
    pub fn new(key: impl Into<Cow<'static, str>>, service: ServiceType, kind: DependencyKind) -> Self {
        Self {
            key: key.into(),
            service,
            kind,
            optional: false,
            value: None,
        }
    }

    /// Dependency on the service `S`, keyed by the type name.
    #[inline]
    #[must_use]
    pub fn service<S: ?Sized + 'static>() -> Self {
        let service = ServiceType::contract::<S>();
        Self::new(core::any::type_name::<S>(), service, DependencyKind::Service)
    }

    /// Plain value of type `T`, keyed by the type name.
    #[inline]
    #[must_use]
    pub fn parameter<T: 'static>() -> Self {
        Self::new(core::any::type_name::<T>(), ServiceType::value::<T>(), DependencyKind::Parameter)
    }

    #[inline]
    #[must_use]
    pub fn collection<S: ?Sized + 'static>() -> Self {
        let service = ServiceType::contract::<S>();
        Self::new(core::any::type_name::<S>(), service, DependencyKind::Collection)
    }

    #[inline]
    #[must_use]
    pub fn keyed(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.key = key.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_value(mut self, value: DependencyValue) -> Self {
        self.value = Some(value);
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &ServiceType {
        &self.service
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&DependencyValue> {
        self.value.as_ref()
    }

    /// Same dependency with generic placeholders replaced by `arguments`.
    pub(crate) fn close(&self, arguments: &[ServiceType]) -> Self {
        Self {
            service: self.service.substitute(arguments),
            ..self.clone()
        }
    }

    /// Declarations of the same key are interchangeable when they agree on type and kind.
    pub(crate) fn conflicts_with(&self, other: &DependencyModel) -> bool {
        self.key == other.key && (self.service != other.service || self.kind != other.kind)
    }
}
