//! Crate-level error types for record storage, entity stores and sessions.

/// Error returned by a [`RecordStorage`](crate::RecordStorage) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failure.
    ///
    /// An underlying filesystem error occurred while reading or writing a
    /// record, or a backend reported a failed read/write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded to or decoded from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `add` was called with a key that is already present.
    #[error("record '{key}' already exists in collection '{collection}'")]
    AlreadyExists {
        /// Collection the write targeted.
        collection: String,
        /// The duplicate key.
        key: String,
    },

    /// A collection name or record key cannot be used as a storage key.
    ///
    /// Keys must be non-empty and must not contain path separators.
    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),

    /// The blocking task that performed the I/O panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    /// A value could not be sealed or unsealed for storage at rest.
    #[error("cipher error: {0}")]
    Cipher(String),
}

/// A single field of a draft or patch failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    /// Name of the offending field, as it appears in the persisted record.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    /// Build a validation error for `field`.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Error returned by [`EntityStore`](crate::EntityStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The persistent record store failed to read or write.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// `update` targeted an id with no cached record.
    #[error("no record '{id}' in collection '{collection}'")]
    NotFound {
        /// Collection the update targeted.
        collection: &'static str,
        /// The unknown id.
        id: String,
    },

    /// A draft or patch carried an invalid field.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Error returned by [`AuthStore`](crate::AuthStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The authenticator rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email or password was empty.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The session token could not be persisted or restored.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_io_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn already_exists_names_key_and_collection() {
        let err = StorageError::AlreadyExists {
            collection: "staff".into(),
            key: "s1".into(),
        };
        assert_eq!(
            err.to_string(),
            "record 's1' already exists in collection 'staff'"
        );
    }

    #[test]
    fn not_found_display() {
        let err = StoreError::NotFound {
            collection: "vehicles",
            id: "v-9".into(),
        };
        assert_eq!(err.to_string(), "no record 'v-9' in collection 'vehicles'");
    }

    #[test]
    fn validation_error_is_transparent_in_store_error() {
        let err = StoreError::from(ValidationError::new("name", "must not be empty"));
        assert_eq!(err.to_string(), "invalid field 'name': must not be empty");
    }

    #[test]
    fn store_error_wraps_storage_error() {
        let err = StoreError::from(StorageError::InvalidKey("../x".into()));
        assert!(matches!(err, StoreError::Storage(StorageError::InvalidKey(_))));
    }

    // Errors cross task boundaries, so they must be `Send + Sync`.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<StorageError>();
            assert_send_sync::<StoreError>();
            assert_send_sync::<AuthError>();
        }
    };
}
