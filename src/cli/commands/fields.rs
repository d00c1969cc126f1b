use serde_json::json;

use crate::cli::OutputFormat;
use crate::engine::{DocumentEngine, DocumentId};

pub async fn handle(
    engine: &DocumentEngine,
    id: DocumentId,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let fields = engine.describe_fields(id).await?;

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "document_id": id, "fields": fields }))?
            );
        }
        OutputFormat::Text => {
            if fields.is_empty() {
                println!("Document {} has no fields", id);
            }
            for field in &fields {
                println!(
                    "{:<24} {:<24} {:<16} -> {} ({:?})",
                    field.field, field.payload_key, field.declared_type, field.sql_type, field.align
                );
            }
        }
    }
    Ok(())
}
