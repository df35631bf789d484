use super::ConversionErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Argument '{key}' was not supplied")]
    MissingArgument { key: String },
    #[error("Argument '{key}' can't be read as {expected}")]
    IncorrectArgumentType { key: String, expected: &'static str },
    #[error(transparent)]
    Conversion(#[from] ConversionErrorKind),
    #[error("Commission concern failed: {0}")]
    Commission(anyhow::Error),
    #[error("Interception failed: {0}")]
    Interception(anyhow::Error),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
