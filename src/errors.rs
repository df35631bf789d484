mod conversion;
mod generic;
mod instantiate;
mod lifestyle;
mod registration;
mod release;
mod resolve;

pub use conversion::ConversionErrorKind;
pub use generic::GenericClosingErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use lifestyle::LifestyleErrorKind;
pub use registration::RegistrationErrorKind;
pub use release::ReleaseErrorKind;
pub use resolve::{MissingDependency, MissingReason, ResolveErrorKind};
