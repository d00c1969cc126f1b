//! Document table engine: materialize, project and append.

pub mod bootstrap;
pub mod catalog;
pub mod error;
pub mod materializer;
pub mod payload;
pub mod projection;
pub mod sanitizer;
pub mod statement;
pub mod types;
pub mod upsert;

use std::sync::Arc;

use serde::Serialize;

use crate::config::EngineSettings;
use crate::database::store::{ObjectKind, Store};

pub use bootstrap::BootstrapReport;
pub use catalog::{Document, DocumentId, FieldCatalog, FieldDefinition, MemoryCatalog, PgFieldCatalog};
pub use error::{EngineError, EngineResult};
pub use materializer::MaterializeOutcome;
pub use projection::{ColumnHint, Projection};
pub use types::{Align, SqlType, TypeMapping, TypeRegistry, ValueKind};
pub use upsert::AppendOutcome;

use sanitizer::Ident;

/// Entry point for every engine operation. Holds no mutable state; cheap to share.
pub struct DocumentEngine {
    catalog: Arc<dyn FieldCatalog>,
    store: Arc<dyn Store>,
    types: TypeRegistry,
    settings: EngineSettings,
}

/// Field as it will appear in the table and in ingest payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub payload_key: String,
    pub declared_type: String,
    pub sql_type: String,
    pub align: Align,
}

/// A document resolved against the catalog with its identifiers validated
pub(crate) struct ResolvedDocument {
    pub document: Document,
    pub table: Ident,
    pub fields: Vec<FieldDefinition>,
    pub columns: Vec<Ident>,
    pub mappings: Vec<TypeMapping>,
}

impl DocumentEngine {
    pub fn new(catalog: Arc<dyn FieldCatalog>, store: Arc<dyn Store>) -> Self {
        Self {
            catalog,
            store,
            types: TypeRegistry::default(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Read the catalog once and validate every name and type before any
    /// statement is built.
    pub(crate) async fn resolve(&self, id: DocumentId) -> EngineResult<ResolvedDocument> {
        let (document, fields) =
            futures::try_join!(self.catalog.document(id), self.catalog.list_fields(id))?;

        let table = sanitizer::quote(document.table()?)?;
        let columns = sanitizer::validate_fields(&fields)?;
        let mappings = self.types.resolve_all(&fields)?;

        Ok(ResolvedDocument { document, table, fields, columns, mappings })
    }

    /// Validated field list for a document, without touching the store
    pub async fn describe_fields(&self, id: DocumentId) -> EngineResult<Vec<FieldSummary>> {
        let resolved = self.resolve(id).await?;
        Ok(resolved
            .fields
            .into_iter()
            .zip(resolved.mappings)
            .map(|(field, mapping)| FieldSummary {
                payload_key: sanitizer::payload_key(&field.display_key),
                field: field.name,
                declared_type: field.declared_type,
                sql_type: mapping.sql_type.to_string(),
                align: mapping.align,
            })
            .collect())
    }

    pub(crate) async fn table_exists(&self, table: &Ident) -> EngineResult<bool> {
        Ok(self
            .store
            .exists_object(ObjectKind::Table, table.as_str())
            .await?)
    }

    fn log_statement(&self, statement: &statement::Statement) {
        if self.settings.log_statements {
            tracing::debug!(
                kind = statement.kind.label(),
                params = statement.params.len(),
                "{}",
                statement.sql
            );
        }
    }
}
