use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::engine::DocumentEngine;

pub async fn handle(engine: &DocumentEngine, output_format: &OutputFormat) -> anyhow::Result<()> {
    let report = engine.ensure_infrastructure().await?;

    let message = if report.created.is_empty() {
        "Infrastructure already present".to_string()
    } else {
        format!("Created {}", report.created.join(", "))
    };

    output_success(output_format, &message, Some(json!({ "bootstrap": report })))
}
