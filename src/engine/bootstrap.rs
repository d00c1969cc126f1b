//! Store objects the engine relies on, created once per database.

use serde::Serialize;

use crate::database::store::{ObjectKind, StoreError};
use crate::engine::error::EngineResult;
use crate::engine::statement::{Statement, StatementKind};
use crate::engine::DocumentEngine;

/// A named object probed by name before creation
pub struct InfrastructureObject {
    pub kind: ObjectKind,
    pub name: &'static str,
    pub ddl: &'static str,
}

impl InfrastructureObject {
    fn statement(&self) -> Statement {
        let kind = match self.kind {
            ObjectKind::Table => StatementKind::CreateTable { table: self.name.to_string() },
            ObjectKind::Function => StatementKind::CreateFunction { name: self.name.to_string() },
        };
        Statement::fixed(self.ddl, kind)
    }
}

/// Created in order; later entries may reference earlier ones
pub const INFRASTRUCTURE: &[InfrastructureObject] = &[
    InfrastructureObject {
        kind: ObjectKind::Table,
        name: "documents",
        ddl: r#"CREATE TABLE documents (
    id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    name TEXT NOT NULL,
    "table" TEXT UNIQUE
)"#,
    },
    InfrastructureObject {
        kind: ObjectKind::Table,
        name: "detail_documents",
        ddl: r#"CREATE TABLE detail_documents (
    id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    document_id BIGINT NOT NULL REFERENCES documents (id) ON DELETE CASCADE,
    field TEXT NOT NULL,
    document_key TEXT NOT NULL,
    type_field TEXT NOT NULL,
    ordinal INTEGER NOT NULL DEFAULT 0,
    UNIQUE (document_id, field)
)"#,
    },
    InfrastructureObject {
        kind: ObjectKind::Function,
        name: "doctable_lock_key",
        // First 64 bits of md5('doctable:<id>'), so keys do not collide with
        // other advisory lock users keyed on raw ids
        ddl: r#"CREATE FUNCTION doctable_lock_key(document_id BIGINT) RETURNS BIGINT
LANGUAGE SQL IMMUTABLE STRICT
AS $$ SELECT ('x' || substr(md5('doctable:' || document_id::text), 1, 16))::bit(64)::bigint $$"#,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

impl DocumentEngine {
    /// Probe each infrastructure object by name and create the missing ones.
    /// Safe to call repeatedly and from several processes at once.
    pub async fn ensure_infrastructure(&self) -> EngineResult<BootstrapReport> {
        let mut report = BootstrapReport::default();

        for object in INFRASTRUCTURE {
            if self.store.exists_object(object.kind, object.name).await? {
                report.existing.push(object.name.to_string());
                continue;
            }

            match self.store.execute(&object.statement()).await {
                Ok(_) => {
                    tracing::info!("Created {:?} '{}'", object.kind, object.name);
                    report.created.push(object.name.to_string());
                }
                Err(StoreError::DuplicateObject(_)) => {
                    report.existing.push(object.name.to_string());
                }
                Err(e) => {
                    tracing::error!("Failed to create {:?} '{}': {}", object.kind, object.name, e);
                    return Err(e.into());
                }
            }
        }

        Ok(report)
    }
}
