#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use doctable::config::DatabaseConfig;
use doctable::database::PgStore;
use doctable::engine::{DocumentEngine, DocumentId, PgFieldCatalog, TypeRegistry};

/// A live database with the catalog tables in place. Every test using it is
/// `#[ignore]`d; run them with `cargo test -- --ignored` and DATABASE_URL set.
pub struct TestDb {
    pub pool: PgPool,
    pub engine: Arc<DocumentEngine>,
    tables: Vec<String>,
}

pub async fn connect() -> Result<TestDb> {
    connect_with_types(TypeRegistry::default()).await
}

pub async fn connect_with_types(types: TypeRegistry) -> Result<TestDb> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to run the database tests")?;

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .context("failed to connect to DATABASE_URL")?;

    let store = Arc::new(PgStore::new(pool.clone(), DatabaseConfig::default()));
    let catalog = Arc::new(PgFieldCatalog::new(pool.clone()));
    let engine = Arc::new(DocumentEngine::new(catalog, store).with_types(types));
    engine.ensure_infrastructure().await?;

    Ok(TestDb { pool, engine, tables: Vec::new() })
}

impl TestDb {
    /// Register a document with a fresh table name; fields are
    /// `(name, display key, declared type)` in ordinal order
    pub async fn register(&mut self, fields: &[(&str, &str, &str)]) -> Result<(DocumentId, String)> {
        let table = format!("doc_{}", Uuid::new_v4().simple());

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO documents (name, "table") VALUES ($1, $2) RETURNING id"#,
        )
        .bind(format!("test {}", table))
        .bind(&table)
        .fetch_one(&self.pool)
        .await?;

        for (ordinal, (name, key, declared)) in fields.iter().enumerate() {
            sqlx::query(
                "INSERT INTO detail_documents (document_id, field, document_key, type_field, ordinal) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(*name)
            .bind(*key)
            .bind(*declared)
            .bind(ordinal as i32)
            .execute(&self.pool)
            .await?;
        }

        self.tables.push(table.clone());
        Ok((id, table))
    }

    pub async fn row_count(&self, table: &str) -> Result<i64> {
        // Table names come from `register` and are plain hex
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Drop the tables and catalog rows this test created
    pub async fn cleanup(self) -> Result<()> {
        for table in &self.tables {
            sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
                .execute(&self.pool)
                .await?;
            sqlx::query(r#"DELETE FROM documents WHERE "table" = $1"#)
                .bind(table)
                .execute(&self.pool)
                .await?;
        }
        self.pool.close().await;
        Ok(())
    }
}
