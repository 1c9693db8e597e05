//! Database endpoints
//!
//! - GET /api/v1/databases - List databases, newest first
//! - POST /api/v1/databases - Create a database
//! - GET /api/v1/databases/:slug - Get a database with its fields
//! - PUT /api/v1/databases/:slug - Update title and/or description
//! - DELETE /api/v1/databases/:slug - Delete a database and its entries

use crate::api::{AccountId, AppState, MessageResponse};
use crate::error::Result;
use crate::registry::{DatabaseRecord, DatabaseUpdate};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
pub struct DatabaseListResponse {
    pub databases: Vec<DatabaseRecord>,
}

#[derive(Serialize)]
pub struct DatabaseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub database: DatabaseRecord,
}

pub async fn list_databases(
    State(state): State<Arc<AppState>>,
    account: AccountId,
) -> Result<impl IntoResponse> {
    let databases = state.databases.list_databases(account.as_str())?;
    Ok(Json(DatabaseListResponse { databases }))
}

// === Create Database ===

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub title: String,
    pub description: Option<String>,
}

pub async fn create_database(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Json(request): Json<CreateDatabaseRequest>,
) -> Result<impl IntoResponse> {
    let database = state.databases.create_database(
        account.as_str(),
        &request.title,
        request.description.as_deref(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(DatabaseResponse {
            message: Some("Database created successfully".to_string()),
            database,
        }),
    ))
}

pub async fn get_database(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let database = state.databases.get_database(account.as_str(), &slug)?;
    Ok(Json(DatabaseResponse {
        message: None,
        database,
    }))
}

// === Update Database ===

#[derive(Debug, Deserialize)]
pub struct UpdateDatabaseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn update_database(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
    Json(request): Json<UpdateDatabaseRequest>,
) -> Result<impl IntoResponse> {
    let database = state.databases.update_database(
        account.as_str(),
        &slug,
        DatabaseUpdate {
            title: request.title,
            description: request.description,
        },
    )?;

    Ok(Json(DatabaseResponse {
        message: Some("Database updated successfully".to_string()),
        database,
    }))
}

pub async fn delete_database(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    state.databases.delete_database(account.as_str(), &slug)?;
    Ok(Json(MessageResponse::new("Database deleted successfully")))
}
