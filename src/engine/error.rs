use thiserror::Error;

use crate::database::store::StoreError;
use crate::engine::catalog::DocumentId;

/// Errors returned by every engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Unsupported type '{declared}' for field '{field}'")]
    UnsupportedType { field: String, declared: String },

    #[error("Document {document_id} is not materialized (table '{table}' does not exist)")]
    NotMaterialized { document_id: DocumentId, table: String },

    #[error("Document {document_id} is already materialized (table '{table}')")]
    AlreadyMaterialized { document_id: DocumentId, table: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        EngineError::MalformedPayload(message.into())
    }

    /// Stable code for callers that serialize errors
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            EngineError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            EngineError::NotMaterialized { .. } => "NOT_MATERIALIZED",
            EngineError::AlreadyMaterialized { .. } => "RECORD_ALREADY_EXIST",
            EngineError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
