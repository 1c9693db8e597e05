//! Visualization endpoints
//!
//! - GET /api/v1/visualizations - List saved visualizations
//! - POST /api/v1/visualizations - Save a visualization
//! - POST /api/v1/visualizations/data - Chart data for an unsaved configuration
//! - GET /api/v1/visualizations/:viz_id - Get a visualization
//! - PUT /api/v1/visualizations/:viz_id - Update a visualization
//! - DELETE /api/v1/visualizations/:viz_id - Delete a visualization
//! - GET /api/v1/visualizations/:viz_id/data - Chart data of a saved visualization

use crate::api::{AccountId, AppState, MessageResponse};
use crate::error::Result;
use crate::registry::{Visualization, VisualizationUpdate};
use crate::visualization::{Aggregation, ChartType, VisualizationConfig};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PREVIEW_TITLE: &str = "Preview";

#[derive(Serialize)]
pub struct VisualizationListResponse {
    pub visualizations: Vec<Visualization>,
}

#[derive(Serialize)]
pub struct VisualizationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub visualization: Visualization,
}

/// Chart parameters as sent by clients; kinds arrive as free-form strings
#[derive(Debug, Deserialize)]
pub struct VisualizationRequest {
    #[serde(default)]
    pub title: String,
    pub chart_type: String,
    #[serde(default)]
    pub database_slugs: Vec<String>,
    pub x_field: String,
    pub y_field: Option<String>,
    pub aggregation: Option<String>,
}

impl VisualizationRequest {
    fn into_config(self) -> Result<VisualizationConfig> {
        let title = if self.title.trim().is_empty() {
            PREVIEW_TITLE
        } else {
            self.title.as_str()
        };
        Ok(VisualizationConfig::parse(
            title,
            &self.chart_type,
            self.database_slugs,
            &self.x_field,
            self.y_field.as_deref(),
            self.aggregation.as_deref(),
        )?)
    }
}

pub async fn list_visualizations(
    State(state): State<Arc<AppState>>,
    account: AccountId,
) -> Result<impl IntoResponse> {
    let visualizations = state.visualizations.list_visualizations(account.as_str())?;
    Ok(Json(VisualizationListResponse { visualizations }))
}

pub async fn create_visualization(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Json(request): Json<VisualizationRequest>,
) -> Result<impl IntoResponse> {
    // Saved charts need a real title
    let title = request.title.clone();
    let mut config = request.into_config()?;
    config.title = title.trim().to_string();

    let visualization = state
        .visualizations
        .create_visualization(account.as_str(), config)?;

    Ok((
        StatusCode::CREATED,
        Json(VisualizationResponse {
            message: Some("Visualization created successfully".to_string()),
            visualization,
        }),
    ))
}

pub async fn get_visualization(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(viz_id): Path<String>,
) -> Result<impl IntoResponse> {
    let visualization = state
        .visualizations
        .get_visualization(account.as_str(), &viz_id)?;
    Ok(Json(VisualizationResponse {
        message: None,
        visualization,
    }))
}

// === Update Visualization ===

#[derive(Debug, Deserialize)]
pub struct UpdateVisualizationRequest {
    pub title: Option<String>,
    pub chart_type: Option<String>,
    pub database_slugs: Option<Vec<String>>,
    pub x_field: Option<String>,
    pub y_field: Option<String>,
    pub aggregation: Option<String>,
}

pub async fn update_visualization(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(viz_id): Path<String>,
    Json(request): Json<UpdateVisualizationRequest>,
) -> Result<impl IntoResponse> {
    let update = VisualizationUpdate {
        title: request.title,
        chart_type: request
            .chart_type
            .as_deref()
            .map(str::parse::<ChartType>)
            .transpose()?,
        database_slugs: request.database_slugs,
        x_field: request.x_field,
        y_field: request.y_field,
        aggregation: request
            .aggregation
            .as_deref()
            .map(str::parse::<Aggregation>)
            .transpose()?,
    };
    let visualization = state
        .visualizations
        .update_visualization(account.as_str(), &viz_id, update)?;

    Ok(Json(VisualizationResponse {
        message: Some("Visualization updated successfully".to_string()),
        visualization,
    }))
}

pub async fn delete_visualization(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(viz_id): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .visualizations
        .delete_visualization(account.as_str(), &viz_id)?;
    Ok(Json(MessageResponse::new("Visualization deleted successfully")))
}

// === Chart Data ===

pub async fn visualization_data(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(viz_id): Path<String>,
) -> Result<impl IntoResponse> {
    let data = state.visualizations.chart_data(account.as_str(), &viz_id)?;
    Ok(Json(data))
}

pub async fn preview_data(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Json(request): Json<VisualizationRequest>,
) -> Result<impl IntoResponse> {
    let config = request.into_config()?;
    let data = state
        .visualizations
        .ad_hoc_chart_data(account.as_str(), &config)?;
    Ok(Json(data))
}
