use serde::Serialize;

use crate::database::store::{Row, StoreError};
use crate::engine::catalog::{DocumentId, FieldDefinition};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::sanitizer::{Ident, IDENTITY_COLUMN};
use crate::engine::statement::{SqlBuilder, Statement, StatementKind};
use crate::engine::types::{Align, TypeMapping};
use crate::engine::DocumentEngine;

/// Render metadata for one projected column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnHint {
    pub key: String,
    pub label: String,
    pub align: Align,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    /// Declared fields only; the identity column carries no hint
    pub columns: Vec<ColumnHint>,
    pub rows: Vec<Row>,
}

impl DocumentEngine {
    /// Fetch every row of a materialized document together with its column hints
    pub async fn describe_and_fetch(&self, id: DocumentId) -> EngineResult<Projection> {
        let resolved = self.resolve(id).await?;
        let hints = column_hints(&resolved.fields, &resolved.mappings);
        let select = select_statement(&resolved.table, &resolved.columns, &resolved.mappings);

        let not_materialized = || EngineError::NotMaterialized {
            document_id: id,
            table: resolved.table.as_str().to_string(),
        };

        if !self.table_exists(&resolved.table).await? {
            return Err(not_materialized());
        }

        self.log_statement(&select);
        let rows = match self.store.query(&select).await {
            Ok(rows) => rows,
            // Dropped between the probe and the select
            Err(StoreError::UndefinedObject(_)) => return Err(not_materialized()),
            Err(e) => return Err(e.into()),
        };

        // The synthetic identity entry is only used to order the select list
        let columns = hints
            .into_iter()
            .filter(|hint| hint.key != IDENTITY_COLUMN)
            .collect();

        Ok(Projection { columns, rows })
    }
}

/// Identity column first (align "none"), then one hint per field
pub(crate) fn column_hints(fields: &[FieldDefinition], mappings: &[TypeMapping]) -> Vec<ColumnHint> {
    let identity = ColumnHint {
        key: IDENTITY_COLUMN.to_string(),
        label: IDENTITY_COLUMN.to_string(),
        align: Align::None,
    };

    std::iter::once(identity)
        .chain(fields.iter().zip(mappings).map(|(field, mapping)| ColumnHint {
            key: field.name.clone(),
            label: field.display_key.clone(),
            align: mapping.align,
        }))
        .collect()
}

/// `SELECT "id", "f1", "f2"::TEXT AS "f2", … FROM "t" ORDER BY "id"`
///
/// Decimal and text columns are read back as text: NUMERIC keeps its declared
/// scale, and registered types without a native decoder still project.
pub(crate) fn select_statement(table: &Ident, columns: &[Ident], mappings: &[TypeMapping]) -> Statement {
    let identity = Ident::identity();
    let mut b = SqlBuilder::new();
    b.push("SELECT ").ident(&identity);
    for (column, mapping) in columns.iter().zip(mappings) {
        b.push(", ").ident(column);
        if mapping.projects_as_text() {
            b.push("::TEXT AS ").ident(column);
        }
    }
    b.push(" FROM ")
        .ident(table)
        .push(" ORDER BY ")
        .ident(&identity);

    b.build(StatementKind::Select {
        table: table.as_str().to_string(),
    })
}
