use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::engine::{DocumentEngine, DocumentId, MaterializeOutcome};

pub async fn handle(
    engine: &DocumentEngine,
    id: DocumentId,
    strict: bool,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let outcome = if strict {
        engine.materialize_strict(id).await?;
        MaterializeOutcome::Created
    } else {
        engine.materialize(id).await?
    };

    let message = match outcome {
        MaterializeOutcome::Created => format!("Created table for document {}", id),
        MaterializeOutcome::AlreadyMaterialized => format!("Document {} is already materialized", id),
    };

    output_success(
        output_format,
        &message,
        Some(json!({ "document_id": id, "outcome": outcome })),
    )
}
