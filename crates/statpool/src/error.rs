//! Error type for pool operations.
//!
//! Every failure the pool can report is an [`InternalError`] carrying a
//! human-readable message. There are no sub-codes: callers either propagate
//! the error or compare against the message constants below.

use thiserror::Error;

/// `allocate` was asked for zero bytes.
pub const ZERO_SIZE: &str = "cannot allocate 0 bytes";
/// The request can never fit in the pool.
pub const SIZE_EXCEEDS_POOL: &str = "requested size is greater than the pool size";
/// Alignment of zero was requested.
pub const ZERO_ALIGNMENT: &str = "requested alignment is 0";
/// The size cannot be represented as a pointer difference.
pub const SIZE_EXCEEDS_ISIZE: &str = "requested size is larger than isize::MAX";
/// First-fit found no chunk with enough room.
pub const NO_FREE_CHUNK: &str = "no free chunk available";
/// The pointer does not belong to any live allocation.
pub const POINTER_NOT_FOUND: &str = "pointer not found in pool";
/// `deallocate` was handed a null pointer.
pub const NULL_DEALLOCATION: &str = "cannot deallocate nullptr";
/// Array element is narrower than its alignment.
pub const ELEMENT_SMALLER_THAN_ALIGNMENT: &str =
    "element size is smaller than the requested alignment";
/// `count * elem_size` does not fit in `usize`.
pub const ARRAY_SIZE_OVERFLOW: &str = "array size overflows usize";

/// A failed pool operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    message: &'static str,
}

impl InternalError {
    pub(crate) const fn new(message: &'static str) -> Self {
        Self { message }
    }

    /// The message describing what went wrong.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, InternalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            InternalError::new(ZERO_SIZE).to_string(),
            "internal error: cannot allocate 0 bytes"
        );
        assert_eq!(
            InternalError::new(POINTER_NOT_FOUND).to_string(),
            "internal error: pointer not found in pool"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(
            InternalError::new(NO_FREE_CHUNK),
            InternalError::new(NO_FREE_CHUNK)
        );
        assert_ne!(
            InternalError::new(NO_FREE_CHUNK),
            InternalError::new(ZERO_ALIGNMENT)
        );
        assert_eq!(InternalError::new(ZERO_ALIGNMENT).message(), ZERO_ALIGNMENT);
    }
}
