use thiserror::Error;

/// Errors produced while decoding or manipulating documents.
#[derive(Debug, Error)]
pub enum VocabError {
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
