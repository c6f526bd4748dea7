use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::logic::StructuralValidator;
use crate::store::traits::RunStore;

pub fn create_router<S: RunStore + 'static, V: StructuralValidator + 'static>() -> Router<AppState<S, V>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Sample submission
        .route(
            "/lab/instrument/:instrument_id/samples",
            post(handlers::submit_samples::<S, V>),
        )
}
