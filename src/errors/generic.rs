/// Failures while closing an open generic component for a requested type.
///
/// The three kinds are kept apart: a registration gap, a bad argument and a
/// violated constraint call for different fixes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GenericClosingErrorKind {
    #[error(
        "Requested type {requested} has {supplied} generic parameter(s), whereas component implementation type {implementation} \
         requires {required}. Register a generic implementation matching strategy for component '{component}' \
         to supply the missing parameters: {}",
        .missing.join(", ")
    )]
    InsufficientInformation {
        component: String,
        requested: String,
        implementation: String,
        supplied: usize,
        required: usize,
        missing: Vec<String>,
    },
    #[error("Type {argument} can't be used as generic argument '{parameter}' of component '{component}': {argument} is a {kind} type")]
    InvalidArgument {
        component: String,
        parameter: String,
        argument: String,
        kind: &'static str,
    },
    #[error(
        "Generic argument {argument} of component '{component}' violates the constraint '{constraint}' of parameter '{parameter}'"
    )]
    ConstraintMismatch {
        component: String,
        parameter: String,
        argument: String,
        constraint: String,
    },
}
