use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LifestyleErrorKind {
    #[error(
        "Component '{component}' has a scoped lifestyle, and it could not be resolved because no scope is active. \
         Begin a scope with `Container::begin_scope` and resolve through it"
    )]
    NoScope { component: String },
    #[error("Component '{component}' has a scoped lifestyle, and the scope it was resolved in has already ended")]
    ScopeEnded { component: String },
    #[error(
        "Component '{component}' is bound to {target}, but no such component is being resolved above it. \
         Bound components can only be resolved as dependencies of the component they are bound to"
    )]
    NoBindingTarget { component: String, target: String },
    #[error("Timed out after {timeout:?} waiting for a free instance of pooled component '{component}'")]
    PoolTimeout { component: String, timeout: Duration },
}
