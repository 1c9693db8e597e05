mod account;
mod databases;
mod entries;
mod fields;
mod health;
mod visualizations;

pub use account::{AccountId, ACCOUNT_HEADER};
pub use health::health_check;

use crate::registry::{DatabaseRegistry, EntryStore, VisualizationStore};
use crate::store::DocumentStore;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared state for every endpoint
pub struct AppState {
    pub databases: DatabaseRegistry,
    pub entries: EntryStore,
    pub visualizations: VisualizationStore,
    pub data_dir: PathBuf,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<DocumentStore>, default_per_page: usize, max_per_page: usize) -> Self {
        Self {
            databases: DatabaseRegistry::new(store.clone()),
            entries: EntryStore::new(store.clone(), default_per_page, max_per_page),
            visualizations: VisualizationStore::new(store.clone()),
            data_dir: store.data_dir().to_path_buf(),
            start_time: Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// All routes: `/health` plus the account-scoped `/api/v1` surface
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // Databases
        .route(
            "/databases",
            get(databases::list_databases).post(databases::create_database),
        )
        .route(
            "/databases/:slug",
            get(databases::get_database)
                .put(databases::update_database)
                .delete(databases::delete_database),
        )
        // Fields
        .route(
            "/databases/:slug/fields",
            get(fields::list_fields).post(fields::create_field),
        )
        .route("/databases/:slug/fields/reorder", post(fields::reorder_fields))
        .route(
            "/databases/:slug/fields/:field_id",
            get(fields::get_field)
                .put(fields::update_field)
                .delete(fields::delete_field),
        )
        .route(
            "/databases/:slug/fields/:field_id/preview-type-change",
            post(fields::preview_type_change),
        )
        // Entries
        .route(
            "/databases/:slug/entries",
            get(entries::list_entries).post(entries::create_entry),
        )
        .route(
            "/databases/:slug/entries/:entry_id",
            get(entries::get_entry)
                .put(entries::update_entry)
                .delete(entries::delete_entry),
        )
        // Visualizations
        .route(
            "/visualizations",
            get(visualizations::list_visualizations).post(visualizations::create_visualization),
        )
        .route("/visualizations/data", post(visualizations::preview_data))
        .route(
            "/visualizations/:viz_id",
            get(visualizations::get_visualization)
                .put(visualizations::update_visualization)
                .delete(visualizations::delete_visualization),
        )
        .route(
            "/visualizations/:viz_id/data",
            get(visualizations::visualization_data),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
