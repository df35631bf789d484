use crate::lifestyle::{Lifestyle, PoolConfig};

/// Which release policy a container builds when none is supplied explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicyKind {
    /// Tracks roots that need decommission until they are released or the container is disposed.
    #[default]
    LifecycledComponents,
    /// Tracks nothing. Instances are never decommissioned through the container.
    NoTracking,
}

/// Config for a container
/// ## Fields
/// - `default_lifestyle`:
///   Lifestyle of components registered without one.
/// - `release_policy`:
///   Release policy to build, unless the builder was given a custom one.
/// - `pool`:
///   Pool sizes of pooled components registered without explicit sizes.
#[derive(Clone)]
pub struct Config {
    pub default_lifestyle: Lifestyle,
    pub release_policy: ReleasePolicyKind,
    pub pool: PoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_lifestyle: Lifestyle::Singleton,
            release_policy: ReleasePolicyKind::default(),
            pool: PoolConfig::default(),
        }
    }
}
