use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Upper bound on rows accepted by a single append
    pub max_payload_rows: usize,
    /// Emit generated statements at debug level
    pub log_statements: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        EngineConfig::development().database
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineConfig::development().engine
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // Engine overrides
        if let Ok(v) = env::var("ENGINE_MAX_PAYLOAD_ROWS") {
            self.engine.max_payload_rows = v.parse().unwrap_or(self.engine.max_payload_rows);
        }
        if let Ok(v) = env::var("ENGINE_LOG_STATEMENTS") {
            self.engine.log_statements = v.parse().unwrap_or(self.engine.log_statements);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
                slow_query_threshold_ms: 100,
            },
            engine: EngineSettings {
                max_payload_rows: 50_000,
                log_statements: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
                slow_query_threshold_ms: 500,
            },
            engine: EngineSettings {
                max_payload_rows: 20_000,
                log_statements: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
                slow_query_threshold_ms: 1000,
            },
            engine: EngineSettings {
                max_payload_rows: 10_000,
                log_statements: false,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static EngineConfig {
    &CONFIG
}
