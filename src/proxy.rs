use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};

use crate::{any::Instance, component::ComponentModel};

/// Reference to an interceptor attached to a component, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterceptorReference(Cow<'static, str>);

impl InterceptorReference {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for InterceptorReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for InterceptorReference {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

/// Wraps freshly created instances with their interceptors.
///
/// Called once per created instance of a component that lists interceptors.
/// The returned instance replaces the original one everywhere, including in
/// release tracking, so it must keep the implementation type the component's
/// service casters expect.
pub trait ProxyFactory: Send + Sync {
    /// # Errors
    /// Any error aborts creation of the instance.
    fn create(&self, model: &ComponentModel, instance: Instance, interceptors: &[InterceptorReference]) -> Result<Instance, anyhow::Error>;
}
