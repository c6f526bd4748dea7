pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{
    decode_samples, parse_instrument_id, IngestError, IngestStage, IngestionPipeline,
    JsonSchemaValidator, StructuralValidator, Validation,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{RunStore, SqliteStore};

use std::sync::Arc;

use crate::config::AppConfig;

/// Initialize logging with INFO level, keeping sqlx statement logs quiet.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("sqlx", log::LevelFilter::Warn)
        .try_init();
}

/// Build the samples validator named by the configuration.
pub fn load_validator(config: &AppConfig) -> anyhow::Result<JsonSchemaValidator> {
    match &config.schema.path {
        Some(path) => {
            log::info!("Loading samples schema from {}", path);
            JsonSchemaValidator::from_file(path)
        }
        None => {
            log::info!(
                "Using built-in samples schema (max {} samples)",
                config.schema.max_samples
            );
            JsonSchemaValidator::samples(config.schema.max_samples)
        }
    }
}

/// Connect the store and prepare its tables and reference data.
pub async fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(&config.database_url(), config.max_connections()).await?;

    if config.database.seed_reference_data {
        store.migrate().await?;
        seed::load_reference_data(&store).await?;
    }

    Ok(store)
}

/// Everything that can fail at startup happens here, before any request is
/// served.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<axum::Router> {
    let validator = load_validator(config)?;
    let store = open_store(config).await?;
    let pipeline = IngestionPipeline::new(Arc::new(store), Arc::new(validator));

    Ok(routes::create_router().with_state(Arc::new(pipeline)))
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    init_logging();

    let config = AppConfig::load()?;
    let app = build_app(&config).await?;

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Lab samples server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
