use std::fmt::{self, Display, Formatter};

use super::{GenericClosingErrorKind, InstantiateErrorKind, LifestyleErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// No component supports the service the dependency asks for.
    ServiceNotRegistered,
    /// The dependency is a plain value and nothing supplied it.
    ParameterNotProvided,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub key: String,
    pub service: String,
    pub reason: MissingReason,
}

impl Display for MissingDependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.reason {
            MissingReason::ServiceNotRegistered => write!(
                f,
                "- Service '{}' which was not registered (dependency '{}')",
                self.service, self.key
            ),
            MissingReason::ParameterNotProvided => write!(
                f,
                "- Parameter '{}' of type {} which was not provided",
                self.key, self.service
            ),
        }
    }
}

fn list_missing(missing: &[MissingDependency]) -> String {
    missing.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No component supporting the service {service} was found")]
    NoComponent { service: String },
    #[error("No component named '{name}' was found")]
    NoComponentNamed { name: String },
    #[error(
        "Can't create component '{component}' as it has dependencies to be satisfied.\n'{component}' is waiting for the following dependencies:\n{}",
        list_missing(.missing)
    )]
    UnsatisfiedDependency { component: String, missing: Vec<MissingDependency> },
    #[error(
        "Dependency cycle has been detected when trying to resolve component '{component}'. The resolution tree that resulted in the cycle is: {}",
        .chain.join(" -> ")
    )]
    CircularDependency { component: String, chain: Vec<String> },
    #[error("Failed to resolve dependency '{dependency}' of component '{component}': {source}")]
    Dependency {
        component: String,
        dependency: String,
        source: Box<ResolveErrorKind>,
    },
    #[error(transparent)]
    GenericClosing(#[from] GenericClosingErrorKind),
    #[error(transparent)]
    Lifestyle(#[from] LifestyleErrorKind),
    #[error("Failed to create component '{component}': {source}")]
    Instantiate { component: String, source: InstantiateErrorKind },
    #[error("Component '{component}' doesn't expose a typed view for {expected}")]
    IncorrectType { component: String, expected: &'static str },
    #[error("The container has been disposed")]
    Disposed,
}

impl ResolveErrorKind {
    /// The innermost error, skipping every dependency-chain wrapper.
    #[must_use]
    pub fn root_cause(&self) -> &ResolveErrorKind {
        let mut current = self;
        while let ResolveErrorKind::Dependency { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether the failure comes from a dependency nothing can supply, at any depth of the chain.
    #[must_use]
    pub fn is_unsatisfied(&self) -> bool {
        matches!(
            self.root_cause(),
            ResolveErrorKind::UnsatisfiedDependency { .. } | ResolveErrorKind::NoComponent { .. }
        )
    }

    /// Component names from the outermost requester down to the root cause.
    #[must_use]
    pub fn chain(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = self;
        while let ResolveErrorKind::Dependency { component, source, .. } = current {
            names.push(component.as_str());
            current = source;
        }
        names
    }
}
