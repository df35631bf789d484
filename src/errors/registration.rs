#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationErrorKind {
    #[error("Component '{component}' doesn't expose any service")]
    NoServices { component: String },
    #[error("Component '{component}' exposes more than one class service: {}", .services.join(", "))]
    MultipleClassServices { component: String, services: Vec<String> },
    #[error("Component '{component}' declares dependency '{key}' twice with conflicting types {first} and {second}")]
    ConflictingDependency {
        component: String,
        key: String,
        first: String,
        second: String,
    },
    #[error("Component with name '{name}' was already registered")]
    DuplicateName { name: String },
    #[error("Component '{component}' has no activator. Provide a factory, an activator or an instance")]
    MissingActivator { component: String },
    #[error("Unsupported configuration of component '{component}': {reason}")]
    UnsupportedConfiguration { component: String, reason: String },
    #[error("Components can't be registered in a disposed container")]
    Disposed,
}
