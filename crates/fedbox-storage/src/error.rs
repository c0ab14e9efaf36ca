use fedbox_filters::FilterError;
use fedbox_vocab::VocabError;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No document, collection or metadata exists at the IRI.
    #[error("not found: {iri}")]
    NotFound { iri: String },

    /// The request is malformed: missing IRI, non-local collection, bad filter.
    #[error("not valid: {0}")]
    NotValid(String),

    /// A credential did not match.
    #[error("unauthorized: {iri}")]
    Unauthorized { iri: String },

    /// The backend does not provide this capability.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A collection transitively contains itself.
    #[error("cyclic collection: {iri}")]
    CyclicCollection { iri: String },

    /// Document or metadata encoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Password hashing failure.
    #[error("password error: {0}")]
    Password(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside a storage engine, annotated with where it happened.
    #[error("{op} failed at {path}: {reason}")]
    Backend {
        op: &'static str,
        path: String,
        reason: String,
    },
}

impl StorageError {
    pub fn not_found(iri: impl Into<String>) -> Self {
        Self::NotFound { iri: iri.into() }
    }

    /// Wrap an engine error with the operation and location it hit.
    pub fn backend(op: &'static str, path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            op,
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<VocabError> for StorageError {
    fn from(err: VocabError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<FilterError> for StorageError {
    fn from(err: FilterError) -> Self {
        Self::NotValid(err.to_string())
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
