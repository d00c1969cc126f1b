pub mod commands;
pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::database::{DatabaseManager, PgStore};
use crate::engine::{DocumentEngine, DocumentId, EngineError, FieldCatalog, MemoryCatalog, PgFieldCatalog};

#[derive(Parser)]
#[command(name = "doctable")]
#[command(about = "doctable - materialize and load catalog-defined document tables")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Read document definitions from a YAML/JSON file instead of the database catalog")]
    pub catalog: Option<PathBuf>,

    #[arg(long, global = true, help = "Database name (defaults to the one in DATABASE_URL)")]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the catalog tables and lock function if missing")]
    Bootstrap,

    #[command(about = "Create the table for a document")]
    Materialize {
        #[arg(help = "Document ID")]
        id: DocumentId,
        #[arg(long, help = "Fail if the table already exists")]
        strict: bool,
    },

    #[command(about = "Show column metadata and every row of a document table")]
    Describe {
        #[arg(help = "Document ID")]
        id: DocumentId,
    },

    #[command(about = "Append a JSON array of records, skipping exact duplicates")]
    Append {
        #[arg(help = "Document ID")]
        id: DocumentId,
        #[arg(long, help = "Read the payload from a file instead of stdin")]
        file: Option<PathBuf>,
    },

    #[command(about = "List a document's fields and their column types")]
    Fields {
        #[arg(help = "Document ID")]
        id: DocumentId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Wire the engine to Postgres; the catalog comes from `catalog_file` when given
pub async fn connect_engine(
    catalog_file: Option<&Path>,
    database: Option<&str>,
) -> anyhow::Result<DocumentEngine> {
    let settings = config();
    let pool = DatabaseManager::connect(&settings.database, database).await?;

    let catalog: Arc<dyn FieldCatalog> = match catalog_file {
        Some(path) => Arc::new(MemoryCatalog::from_path(path)?),
        None => Arc::new(PgFieldCatalog::new(pool.clone())),
    };
    let store = Arc::new(PgStore::new(pool, settings.database.clone()));

    Ok(DocumentEngine::new(catalog, store).with_settings(settings.engine.clone()))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let engine = connect_engine(cli.catalog.as_deref(), cli.database.as_deref()).await?;

    let result = match cli.command {
        Commands::Bootstrap => commands::bootstrap::handle(&engine, &output_format).await,
        Commands::Materialize { id, strict } => {
            commands::materialize::handle(&engine, id, strict, &output_format).await
        }
        Commands::Describe { id } => commands::describe::handle(&engine, id, &output_format).await,
        Commands::Append { id, file } => {
            commands::append::handle(&engine, id, file.as_deref(), &output_format).await
        }
        Commands::Fields { id } => commands::fields::handle(&engine, id, &output_format).await,
    };

    DatabaseManager::close_all().await;

    if let Err(e) = &result {
        if let Some(EngineError::Storage(source)) = e.downcast_ref::<EngineError>() {
            tracing::error!("Storage failure: {:?}", source);
        }
        if let OutputFormat::Json = output_format {
            let code = e
                .downcast_ref::<EngineError>()
                .map(EngineError::error_code)
                .unwrap_or("CLI_ERROR");
            utils::output_error(&output_format, &e.to_string(), Some(code))?;
        }
    }
    result
}
