// Error taxonomy for the API boundary.
//
// The resolver and the query interpreter are total and never produce these.
// Store code works in anyhow::Result and raises an IsItOpenError only where a
// caller needs to tell the failure kinds apart (missing place, bad payload).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsItOpenError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl IsItOpenError {
    pub fn place_not_found(id: &str) -> Self {
        IsItOpenError::NotFound(format!("Place {}", id))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        IsItOpenError::InvalidInput(message.into())
    }
}

/// Recover a typed error that was raised inside anyhow-based store code
impl From<anyhow::Error> for IsItOpenError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<IsItOpenError>() {
            Ok(typed) => typed,
            Err(other) => IsItOpenError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, IsItOpenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_error_survives_anyhow() {
        let err: anyhow::Error = IsItOpenError::place_not_found("abc").into();
        let back = IsItOpenError::from(err);

        assert!(matches!(back, IsItOpenError::NotFound(ref what) if what == "Place abc"));
    }

    #[test]
    fn test_untyped_error_becomes_storage() {
        let err = anyhow::anyhow!("disk full");
        let back = IsItOpenError::from(err);

        assert!(matches!(back, IsItOpenError::Storage(_)));
        assert_eq!(back.to_string(), "Storage error: disk full");
    }
}
