use serde::{Deserialize, Serialize};

use crate::logic::DEFAULT_MAX_SAMPLES;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub connection_string: Option<String>,
    pub max_connections: Option<u32>,
    /// Create the lab tables and insert the reference instruments at startup.
    pub seed_reference_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Samples schema file; when unset the built-in schema is used.
    pub path: Option<String>,
    /// Largest accepted batch for the built-in schema.
    pub max_samples: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            max_connections: Some(5),
            seed_reference_data: true,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Add environment variables with prefix "LAB_", e.g. LAB_SERVER__PORT
        config = config.add_source(
            config::Environment::with_prefix("LAB")
                .prefix_separator("_")
                .separator("__"),
        );

        let app_config: AppConfig = config.build()?.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the database URL from config or environment
    pub fn database_url(&self) -> String {
        if let Some(connection_string) = &self.database.connection_string {
            return connection_string.clone();
        }

        // Fall back to environment variable
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }

        // Default for local development
        "sqlite://lab.db".to_string()
    }

    pub fn max_connections(&self) -> u32 {
        self.database.max_connections.unwrap_or(5)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
