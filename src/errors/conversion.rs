#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionErrorKind {
    #[error("No conversion to {target} is known")]
    Unsupported { target: String },
    #[error("Value '{value}' can't be converted to {target}: {reason}")]
    Invalid { value: String, target: String, reason: String },
}
