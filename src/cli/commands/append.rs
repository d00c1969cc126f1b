use std::path::Path;

use serde_json::json;
use tokio::io::AsyncReadExt;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::engine::{DocumentEngine, DocumentId};

pub async fn handle(
    engine: &DocumentEngine,
    id: DocumentId,
    file: Option<&Path>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let payload = read_payload(file).await?;
    let outcome = engine.append(id, &payload).await?;

    output_success(
        output_format,
        &format!("Inserted {} new rows into document {}", outcome.inserted_count, id),
        Some(json!({ "document_id": id, "inserted_count": outcome.inserted_count })),
    )
}

async fn read_payload(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e)),
        None => {
            let mut payload = String::new();
            tokio::io::stdin().read_to_string(&mut payload).await?;
            Ok(payload)
        }
    }
}
