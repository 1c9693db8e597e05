use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: &'static str,
    data_dir_present: bool,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let data_dir_present = state.data_dir.is_dir();

    Json(HealthResponse {
        status: if data_dir_present {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION"),
        data_dir_present,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
