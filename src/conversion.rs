use std::{any::TypeId, str::FromStr, sync::Arc};

use crate::{any::Instance, errors::ConversionErrorKind, types::ServiceType};

/// Turns literal dependency values into instances of the dependency's type.
pub trait ConversionManager: Send + Sync {
    /// # Errors
    /// Returns [`ConversionErrorKind`] if the value can't be represented as `target`.
    fn convert(&self, value: &str, target: &ServiceType) -> Result<Instance, ConversionErrorKind>;
}

/// Parses `String`, `bool`, `char` and the numeric primitives.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConversionManager;

fn parse<T>(value: &str, target: &ServiceType) -> Result<Instance, ConversionErrorKind>
where
    T: FromStr + Send + Sync + 'static,
    T::Err: ToString,
{
    value.trim().parse::<T>().map(|parsed| Arc::new(parsed) as Instance).map_err(|err| ConversionErrorKind::Invalid {
        value: value.to_owned(),
        target: target.to_string(),
        reason: err.to_string(),
    })
}

macro_rules! convert_to {
    ($id:expr, $value:expr, $target:expr, [$($ty:ty),*]) => {
        $(
            if $id == TypeId::of::<$ty>() {
                return parse::<$ty>($value, $target);
            }
        )*
    };
}

impl ConversionManager for DefaultConversionManager {
    fn convert(&self, value: &str, target: &ServiceType) -> Result<Instance, ConversionErrorKind> {
        let unsupported = || ConversionErrorKind::Unsupported {
            target: target.to_string(),
        };
        let id = target.type_info().ok_or_else(unsupported)?.id;

        if id == TypeId::of::<String>() {
            return Ok(Arc::new(value.to_owned()));
        }
        convert_to!(id, value, target, [bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64]);

        Err(unsupported())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversionManager, DefaultConversionManager};
    use crate::{errors::ConversionErrorKind, types::ServiceType};

    #[test]
    fn test_convert_primitives() {
        let manager = DefaultConversionManager;

        let port = manager.convert(" 8080 ", &ServiceType::value::<u16>()).unwrap();
        assert_eq!(port.downcast_ref::<u16>(), Some(&8080));

        let name = manager.convert("primary", &ServiceType::of::<String>()).unwrap();
        assert_eq!(name.downcast_ref::<String>().map(String::as_str), Some("primary"));

        let enabled = manager.convert("true", &ServiceType::value::<bool>()).unwrap();
        assert_eq!(enabled.downcast_ref::<bool>(), Some(&true));
    }

    #[test]
    fn test_convert_failures() {
        let manager = DefaultConversionManager;

        assert!(matches!(
            manager.convert("many", &ServiceType::value::<u8>()),
            Err(ConversionErrorKind::Invalid { .. })
        ));
        assert!(matches!(
            manager.convert("1", &ServiceType::of::<Vec<u8>>()),
            Err(ConversionErrorKind::Unsupported { .. })
        ));
    }
}
