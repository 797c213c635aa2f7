//! Engine error codes.
//!
//! A context carries a single sticky error register. Once a code is
//! latched, public mutators become no-ops until
//! [`Context::reset`](crate::context::Context::reset). Internal invariant
//! violations (unknown object tags, copy size-estimate mismatches) are
//! never surfaced here; they panic.

use thiserror::Error;

/// Error codes surfaced at the context boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// A malformed argument was given to an API function.
    #[error("malformed argument")]
    InvalidArgument,
    /// A value's shape did not match what the operation requires.
    #[error("value shape mismatch")]
    TypeMismatch,
    /// The arena could not satisfy a reservation even after collection.
    #[error("context memory exhausted")]
    ContextFull,
    /// Integer division by zero.
    #[error("division by zero")]
    DivideByZero,
    /// A reserved path, e.g. integers past the small-integer range.
    #[error("operation not implemented")]
    Unimplemented,
    /// Host allocation failed while building a context.
    #[error("allocation failure")]
    OutOfMemory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_code_displays_a_message() {
        for code in ErrorCode::iter() {
            assert!(!code.to_string().is_empty());
        }
    }
}
