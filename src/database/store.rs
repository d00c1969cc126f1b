//! Relational execution capability consumed by the engine.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::BigDecimal;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::engine::statement::Statement;

/// A fetched row, keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    Function,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object already exists: {0}")]
    DuplicateObject(String),

    #[error("Object does not exist: {0}")]
    UndefinedObject(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    /// Classify database errors by SQLSTATE; everything else stays opaque
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let message = db.message().to_string();
            match db.code().as_deref() {
                // duplicate_table, duplicate_function, and the pg_type unique
                // index hit by two concurrent CREATE TABLEs
                Some("42P07") | Some("42723") | Some("23505") => {
                    return StoreError::DuplicateObject(message)
                }
                Some("42P01") | Some("42883") => return StoreError::UndefinedObject(message),
                Some(code) if code.starts_with("22") => return StoreError::InvalidData(message),
                _ => {}
            }
        }
        StoreError::Sqlx(err)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Run one statement, returning rows affected
    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError>;

    /// Run one statement and fetch all rows
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;

    /// Run statements in order inside one transaction; rows affected per statement
    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, StoreError>;

    async fn exists_object(&self, kind: ObjectKind, name: &str) -> Result<bool, StoreError>;
}

/// PostgreSQL store over a shared pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    settings: DatabaseConfig,
}

impl PgStore {
    pub fn new(pool: PgPool, settings: DatabaseConfig) -> Self {
        Self { pool, settings }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn prepare(statement: &Statement) -> sqlx::query::Query<'_, Postgres, PgArguments> {
        statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), |q, p| bind_param(q, p))
    }

    fn observe(&self, statement: &Statement, started: Instant) {
        let elapsed = started.elapsed();
        if self.settings.enable_query_logging {
            tracing::debug!(
                kind = statement.kind.label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                statement.sql
            );
        }
        if elapsed.as_millis() as u64 > self.settings.slow_query_threshold_ms {
            tracing::warn!(
                kind = statement.kind.label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow statement: {}",
                statement.sql
            );
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        let started = Instant::now();
        let result = Self::prepare(statement)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        self.observe(statement, started);
        Ok(result.rows_affected())
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let started = Instant::now();
        let rows = Self::prepare(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        self.observe(statement, started);
        rows.iter().map(row_to_json).collect()
    }

    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let mut affected = Vec::with_capacity(statements.len());

        for statement in statements {
            let started = Instant::now();
            // Dropping `tx` on error rolls the transaction back
            let result = Self::prepare(statement)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
            self.observe(statement, started);
            affected.push(result.rows_affected());
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(affected)
    }

    async fn exists_object(&self, kind: ObjectKind, name: &str) -> Result<bool, StoreError> {
        let probe = match kind {
            ObjectKind::Table => {
                "SELECT EXISTS (
                    SELECT 1 FROM pg_catalog.pg_tables
                    WHERE schemaname = current_schema() AND tablename = $1
                )"
            }
            ObjectKind::Function => {
                "SELECT EXISTS (
                    SELECT 1 FROM pg_catalog.pg_proc p
                    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
                    WHERE n.nspname = current_schema() AND p.proname = $1
                )"
            }
        };

        let row = sqlx::query(probe)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        row.try_get::<bool, _>(0).map_err(StoreError::from_sqlx)
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Arrays and objects travel as a single JSONB parameter
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

/// Convert a row to JSON by column type. Timestamps use ISO 8601. A value
/// that cannot be decoded is an error, never a silent null.
fn row_to_json(row: &PgRow) -> Result<Row, StoreError> {
    let mut map = Map::new();

    for (i, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT2" => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
            "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(|f| Value::from(f as f64)),
            "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(Value::from),
            // Engine projections read NUMERIC as text to keep the declared scale
            "NUMERIC" => row
                .try_get::<Option<BigDecimal>, _>(i)?
                .map(|d| Value::String(d.to_string())),
            "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(i)?
                .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(i)?
                .map(|t| Value::String(t.to_rfc3339())),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(i)?
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            "TIME" => row
                .try_get::<Option<NaiveTime>, _>(i)?
                .map(|t| Value::String(t.to_string())),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i)?,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(i)?.map(Value::String),
            other => {
                return Err(StoreError::Sqlx(sqlx::Error::ColumnDecode {
                    index: column.name().to_string(),
                    source: format!("no JSON conversion for column type {}", other).into(),
                }))
            }
        };

        map.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }

    Ok(map)
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from_sqlx(err)
    }
}
