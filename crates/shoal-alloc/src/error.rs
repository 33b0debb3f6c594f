//! Errors for fallible in-arena construction.

use std::error::Error;
use std::fmt;

use shoal_core::ArenaError;

/// Failure of [`try_allocate_unique_with`](crate::try_allocate_unique_with).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructError<E> {
    /// The arena could not provide memory; the constructor never ran.
    Alloc(ArenaError),
    /// The constructor returned an error; its block was already released.
    Construct(E),
}

impl<E> ConstructError<E> {
    /// The allocation error, if that is what failed.
    pub fn alloc_error(&self) -> Option<&ArenaError> {
        match self {
            Self::Alloc(err) => Some(err),
            Self::Construct(_) => None,
        }
    }
}

impl<E> From<ArenaError> for ConstructError<E> {
    fn from(err: ArenaError) -> Self {
        Self::Alloc(err)
    }
}

impl<E: fmt::Display> fmt::Display for ConstructError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc(err) => write!(f, "arena allocation failed: {err}"),
            Self::Construct(err) => write!(f, "in-arena construction failed: {err}"),
        }
    }
}

impl<E: Error + 'static> Error for ConstructError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Alloc(err) => Some(err),
            Self::Construct(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_test_utils::ConstructFailed;

    #[test]
    fn display_and_source() {
        let err: ConstructError<ConstructFailed> =
            ConstructError::Construct(ConstructFailed("bad input"));
        assert_eq!(
            err.to_string(),
            "in-arena construction failed: construction failed: bad input"
        );
        assert!(err.source().is_some());
        assert!(err.alloc_error().is_none());

        let err: ConstructError<ConstructFailed> = ArenaError::ZeroSizedRequest.into();
        assert_eq!(err.alloc_error(), Some(&ArenaError::ZeroSizedRequest));
    }
}
