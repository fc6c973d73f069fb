//! Store failure taxonomy.

use thiserror::Error;

/// Server error codes reported for unique-constraint violations.
pub const DUPLICATE_KEY_CODES: [i32; 3] = [11000, 11001, 12582];

pub fn is_duplicate_key_code(code: i32) -> bool {
    DUPLICATE_KEY_CODES.contains(&code)
}

/// Failure of a single store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The selector matched no document.
    #[error("no document matched the selector")]
    NotFound,

    /// A unique constraint rejected the write.
    #[error("duplicate key error (code {code}): {message}")]
    DuplicateKey { code: i32, message: String },

    /// Connection, validation and any other server-side failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        StoreError::DuplicateKey {
            code: DUPLICATE_KEY_CODES[0],
            message: message.into(),
        }
    }

    pub fn other(message: impl std::fmt::Display) -> Self {
        StoreError::Other(anyhow::anyhow!("{message}"))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            StoreError::NotFound => FailureKind::NotFound,
            StoreError::DuplicateKey { .. } => FailureKind::DuplicateKey,
            StoreError::Other(_) => FailureKind::Other,
        }
    }
}

/// Classification of a [`StoreError`], used by the conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NotFound,
    DuplicateKey,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NotFound => write!(f, "not-found"),
            FailureKind::DuplicateKey => write!(f, "duplicate-key"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_codes() {
        assert!(is_duplicate_key_code(11000));
        assert!(is_duplicate_key_code(11001));
        assert!(is_duplicate_key_code(12582));
        assert!(!is_duplicate_key_code(121));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(StoreError::NotFound.kind(), FailureKind::NotFound);
        assert_eq!(
            StoreError::duplicate_key("E11000").kind(),
            FailureKind::DuplicateKey
        );
        assert_eq!(StoreError::other("socket closed").kind(), FailureKind::Other);
    }

    #[test]
    fn test_other_is_transparent() {
        let err = StoreError::other("connection reset by peer");
        assert_eq!(err.to_string(), "connection reset by peer");
    }
}
