//! Results of fallible operations.
//!
//! Fallible operations return a plain [std::result::Result] whose error is an
//! [ErrorKind]. On the wire a result is a two-alternative variant: index 0 holds
//! the value, index 1 the error code, so it is interchangeable with [Variant2].

use super::variant::{EmptyVariant, Variant2};

/// Application error codes.
///
/// The `Default` value is the "none" code, meaningful as success only
/// when a value is present.
pub trait ErrorKind: Default + PartialEq {
    fn is_none(&self) -> bool {
        *self == Self::default()
    }
}

/// Error code access for results.
pub trait ResultExt<T, E> {
    /// The error code, or the none code when a value is present.
    fn error(&self) -> E;
}

impl<T, E: ErrorKind + Clone> ResultExt<T, E> for Result<T, E> {
    fn error(&self) -> E {
        match self {
            Ok(_) => E::default(),
            Err(e) => e.clone(),
        }
    }
}

impl<T, E> From<Result<T, E>> for Variant2<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(v) => Self::Alt0(v),
            Err(e) => Self::Alt1(e),
        }
    }
}

impl<T, E> TryFrom<Variant2<T, E>> for Result<T, E> {
    type Error = EmptyVariant;

    fn try_from(value: Variant2<T, E>) -> Result<Self, Self::Error> {
        match value {
            Variant2::Empty => Err(EmptyVariant),
            Variant2::Alt0(v) => Ok(Ok(v)),
            Variant2::Alt1(e) => Ok(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::ser_de::{deserialize, serialize};

    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    enum LookupError {
        #[default]
        None,
        Missing,
        Denied,
    }

    impl ErrorKind for LookupError {}

    #[test]
    fn test_error_code() {
        let found: Result<u32, LookupError> = Ok(3);
        let missing: Result<u32, LookupError> = Err(LookupError::Missing);

        assert!(found.error().is_none());
        assert_eq!(missing.error(), LookupError::Missing);
        assert!(!LookupError::Denied.is_none());
    }

    #[test]
    fn test_variant_interop() {
        let v: Variant2<u32, LookupError> = Err(LookupError::Denied).into();
        assert_eq!(v.index(), Some(1));
        assert_eq!(Result::try_from(v), Ok(Err(LookupError::Denied)));

        let empty = Variant2::<u32, LookupError>::new();
        assert_eq!(Result::try_from(empty), Err(EmptyVariant));
    }

    #[test]
    fn test_shared_wire_form() {
        let ok: Result<String, LookupError> = Ok("value".into());
        let err: Result<String, LookupError> = Err(LookupError::Missing);

        for result in [ok, err] {
            let bytes = serialize(&result).unwrap();
            assert_eq!(bytes, serialize(&Variant2::from(result.clone())).unwrap());

            let through_variant: Variant2<String, LookupError> = deserialize(&bytes).unwrap();
            assert_eq!(Result::try_from(through_variant), Ok(result));
        }
    }
}
