//! Document and field metadata.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::database::store::StoreError;
use crate::engine::error::{EngineError, EngineResult};

pub type DocumentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    /// Physical table name; must be assigned before materialization
    #[sqlx(rename = "table")]
    #[serde(rename = "table", default)]
    pub table_name: Option<String>,
}

impl Document {
    pub fn new(id: DocumentId, name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            table_name: Some(table_name.into()),
        }
    }

    /// Assigned table name, or `InvalidIdentifier` when unset
    pub fn table(&self) -> EngineResult<&str> {
        match self.table_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(EngineError::invalid_identifier(
                &self.name,
                "document has no physical table name",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FieldDefinition {
    #[sqlx(rename = "field")]
    pub name: String,
    #[sqlx(rename = "document_key")]
    pub display_key: String,
    #[sqlx(rename = "type_field")]
    pub declared_type: String,
    #[serde(default)]
    pub ordinal: i32,
}

impl FieldDefinition {
    pub fn new(
        name: impl Into<String>,
        display_key: impl Into<String>,
        declared_type: impl Into<String>,
        ordinal: i32,
    ) -> Self {
        Self {
            name: name.into(),
            display_key: display_key.into(),
            declared_type: declared_type.into(),
            ordinal,
        }
    }
}

/// Read-only view of document metadata
#[async_trait]
pub trait FieldCatalog: Send + Sync {
    /// Fails with `NotFound` when the document does not exist
    async fn document(&self, id: DocumentId) -> EngineResult<Document>;

    /// Fields ordered by ordinal position
    async fn list_fields(&self, id: DocumentId) -> EngineResult<Vec<FieldDefinition>>;

    async fn table_name(&self, id: DocumentId) -> EngineResult<String> {
        let document = self.document(id).await?;
        document.table().map(str::to_string)
    }
}

/// Catalog entry as written in a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    #[serde(flatten)]
    pub document: Document,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    documents: Vec<DocumentEntry>,
}

/// In-process catalog, loaded from YAML/JSON or built by hand
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    entries: BTreeMap<DocumentId, DocumentEntry>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: Document, mut fields: Vec<FieldDefinition>) -> &mut Self {
        // Stable: equal ordinals keep declaration order
        fields.sort_by_key(|f| f.ordinal);
        self.entries.insert(document.id, DocumentEntry { document, fields });
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        let file: CatalogFile = serde_yaml::from_str(content)?;
        let mut catalog = Self::new();
        for entry in file.documents {
            catalog.insert(entry.document, entry.fields);
        }
        Ok(catalog)
    }

    /// Load a catalog file; JSON parses as YAML too
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read catalog {}: {}", path.display(), e))?;
        Self::from_yaml_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid catalog {}: {}", path.display(), e))
    }
}

#[async_trait]
impl FieldCatalog for MemoryCatalog {
    async fn document(&self, id: DocumentId) -> EngineResult<Document> {
        self.entries
            .get(&id)
            .map(|entry| entry.document.clone())
            .ok_or(EngineError::NotFound(id))
    }

    async fn list_fields(&self, id: DocumentId) -> EngineResult<Vec<FieldDefinition>> {
        self.entries
            .get(&id)
            .map(|entry| entry.fields.clone())
            .ok_or(EngineError::NotFound(id))
    }
}

/// Catalog backed by the `documents` / `detail_documents` tables
pub struct PgFieldCatalog {
    pool: PgPool,
}

impl PgFieldCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FieldCatalog for PgFieldCatalog {
    async fn document(&self, id: DocumentId) -> EngineResult<Document> {
        sqlx::query_as::<_, Document>(r#"SELECT id, name, "table" FROM documents WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?
            .ok_or(EngineError::NotFound(id))
    }

    async fn list_fields(&self, id: DocumentId) -> EngineResult<Vec<FieldDefinition>> {
        // Distinguish "unknown document" from "document without fields"
        self.document(id).await?;

        let fields = sqlx::query_as::<_, FieldDefinition>(
            "SELECT field, document_key, type_field, ordinal
             FROM detail_documents
             WHERE document_id = $1
             ORDER BY ordinal, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(fields)
    }
}
