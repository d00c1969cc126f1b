use crate::cli::utils::render_table;
use crate::cli::OutputFormat;
use crate::engine::sanitizer::IDENTITY_COLUMN;
use crate::engine::{Align, ColumnHint, DocumentEngine, DocumentId};

pub async fn handle(
    engine: &DocumentEngine,
    id: DocumentId,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let projection = engine.describe_and_fetch(id).await?;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&projection)?);
        }
        OutputFormat::Text => {
            let identity = ColumnHint {
                key: IDENTITY_COLUMN.to_string(),
                label: IDENTITY_COLUMN.to_string(),
                align: Align::None,
            };
            let columns: Vec<ColumnHint> = std::iter::once(identity)
                .chain(projection.columns.iter().cloned())
                .collect();

            println!("{}", render_table(&columns, &projection.rows));
            println!("({} rows)", projection.rows.len());
        }
    }
    Ok(())
}
