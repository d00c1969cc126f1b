use serde::Serialize;

use crate::database::store::StoreError;
use crate::engine::catalog::DocumentId;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::sanitizer::Ident;
use crate::engine::statement::{SqlBuilder, Statement, StatementKind};
use crate::engine::types::TypeMapping;
use crate::engine::{DocumentEngine, ResolvedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeOutcome {
    Created,
    AlreadyMaterialized,
}

impl DocumentEngine {
    /// Create the document's table if it does not exist yet. Re-running, or
    /// losing a race against another caller, is a successful no-op.
    pub async fn materialize(&self, id: DocumentId) -> EngineResult<MaterializeOutcome> {
        let resolved = self.resolve(id).await?;
        let create = create_table_statement(&resolved.table, &resolved.columns, &resolved.mappings);

        if self.table_exists(&resolved.table).await? {
            tracing::debug!("Document {} already materialized as {}", id, resolved.table);
            return Ok(MaterializeOutcome::AlreadyMaterialized);
        }

        self.log_statement(&create);
        match self
            .store
            .execute_atomic(&[Statement::document_lock(id), create])
            .await
        {
            Ok(_) => {
                tracing::info!(
                    "Created table {} for document '{}' ({} fields)",
                    resolved.table,
                    resolved.document.name,
                    resolved.fields.len()
                );
                Ok(MaterializeOutcome::Created)
            }
            Err(StoreError::DuplicateObject(message)) => {
                tracing::debug!("Concurrent materialization of document {}: {}", id, message);
                Ok(MaterializeOutcome::AlreadyMaterialized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`materialize`](Self::materialize), but an existing table is an
    /// `AlreadyMaterialized` error.
    pub async fn materialize_strict(&self, id: DocumentId) -> EngineResult<()> {
        match self.materialize(id).await? {
            MaterializeOutcome::Created => Ok(()),
            MaterializeOutcome::AlreadyMaterialized => {
                let ResolvedDocument { table, .. } = self.resolve(id).await?;
                Err(EngineError::AlreadyMaterialized {
                    document_id: id,
                    table: table.as_str().to_string(),
                })
            }
        }
    }
}

/// `CREATE TABLE "t" ("id" … PRIMARY KEY, "field" TYPE, …)` in field order
pub(crate) fn create_table_statement(
    table: &Ident,
    columns: &[Ident],
    mappings: &[TypeMapping],
) -> Statement {
    let mut b = SqlBuilder::new();
    b.push("CREATE TABLE ")
        .ident(table)
        .push(" (")
        .ident(&Ident::identity())
        .push(" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY");

    for (column, mapping) in columns.iter().zip(mappings) {
        b.push(", ").ident(column).push(" ").sql_type(&mapping.sql_type);
    }
    b.push(")");

    b.build(StatementKind::CreateTable {
        table: table.as_str().to_string(),
    })
}
