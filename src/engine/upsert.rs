use serde::Serialize;
use serde_json::Value;

use crate::database::store::StoreError;
use crate::engine::catalog::DocumentId;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::payload::{self, PayloadColumn};
use crate::engine::sanitizer::{self, Ident};
use crate::engine::statement::{SqlBuilder, Statement, StatementKind};
use crate::engine::types::TypeMapping;
use crate::engine::DocumentEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    pub inserted_count: u64,
}

impl DocumentEngine {
    /// Append a JSON array of records, skipping any row whose every declared
    /// field equals an existing row (or an earlier row in the same payload).
    pub async fn append(&self, id: DocumentId, payload: &str) -> EngineResult<AppendOutcome> {
        let payload = payload::parse(payload)?;
        self.append_value(id, payload).await
    }

    pub async fn append_value(&self, id: DocumentId, mut payload: Value) -> EngineResult<AppendOutcome> {
        let resolved = self.resolve(id).await?;
        let columns: Vec<PayloadColumn> = resolved
            .fields
            .iter()
            .zip(&resolved.mappings)
            .map(|(field, mapping)| PayloadColumn {
                field: field.name.clone(),
                key: sanitizer::payload_key(&field.display_key),
                kind: mapping.kind,
            })
            .collect();

        let row_count = payload::validate(&payload, &columns, self.settings.max_payload_rows)?;
        payload::normalize(&mut payload, &columns);

        let not_materialized = || EngineError::NotMaterialized {
            document_id: id,
            table: resolved.table.as_str().to_string(),
        };
        if !self.table_exists(&resolved.table).await? {
            return Err(not_materialized());
        }
        if row_count == 0 || columns.is_empty() {
            return Ok(AppendOutcome { inserted_count: 0 });
        }

        let keys: Vec<String> = columns.into_iter().map(|c| c.key).collect();
        let insert = insert_missing_statement(
            &resolved.table,
            &resolved.columns,
            &resolved.mappings,
            &keys,
            payload,
        );
        self.log_statement(&insert);

        let affected = match self
            .store
            .execute_atomic(&[Statement::document_lock(id), insert])
            .await
        {
            Ok(affected) => affected,
            Err(StoreError::UndefinedObject(_)) => return Err(not_materialized()),
            Err(StoreError::InvalidData(message)) => return Err(EngineError::MalformedPayload(message)),
            Err(e) => return Err(e.into()),
        };

        let inserted_count = affected.last().copied().unwrap_or(0);
        tracing::info!(
            "Appended {} of {} rows to {} (document {})",
            inserted_count,
            row_count,
            resolved.table,
            id
        );
        Ok(AppendOutcome { inserted_count })
    }
}

/// Build the insert-if-absent statement. `$1` is the whole payload as JSONB,
/// `$2..` are the payload keys in field order.
///
/// ```sql
/// INSERT INTO "t" ("a", "b")
/// SELECT DISTINCT src."a", src."b" FROM (
///     SELECT (elem ->> $2)::BIGINT AS "a", (elem ->> $3)::TEXT AS "b"
///     FROM jsonb_array_elements($1::jsonb) AS payload(elem)
/// ) AS src
/// WHERE NOT EXISTS (
///     SELECT 1 FROM "t" AS trg
///     WHERE trg."a" IS NOT DISTINCT FROM src."a" AND trg."b" IS NOT DISTINCT FROM src."b"
/// )
/// ```
pub(crate) fn insert_missing_statement(
    table: &Ident,
    columns: &[Ident],
    mappings: &[TypeMapping],
    keys: &[String],
    payload: Value,
) -> Statement {
    let mut b = SqlBuilder::new();
    let payload_param = b.bind(payload);
    let key_params: Vec<usize> = keys.iter().map(|k| b.bind(Value::String(k.clone()))).collect();

    b.push("INSERT INTO ").ident(table).push(" (");
    b.join(columns, ", ", |b, c| {
        b.ident(c);
    });
    b.push(") SELECT DISTINCT ");
    b.join(columns, ", ", |b, c| {
        b.qualified("src", c);
    });

    b.push(" FROM (SELECT ");
    b.join(
        columns.iter().zip(mappings).zip(key_params),
        ", ",
        |b, ((column, mapping), key)| {
            b.push("(elem ->> ")
                .placeholder(key)
                .push(")::")
                .sql_type(&mapping.sql_type)
                .push(" AS ")
                .ident(column);
        },
    );
    b.push(" FROM jsonb_array_elements(")
        .placeholder(payload_param)
        .push("::jsonb) AS payload(elem)) AS src");

    b.push(" WHERE NOT EXISTS (SELECT 1 FROM ")
        .ident(table)
        .push(" AS trg WHERE ");
    b.join(columns, " AND ", |b, c| {
        b.qualified("trg", c).push(" IS NOT DISTINCT FROM ").qualified("src", c);
    });
    b.push(")");

    b.build(StatementKind::Insert {
        table: table.as_str().to_string(),
    })
}
