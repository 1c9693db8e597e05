//! Entry endpoints
//!
//! - GET /api/v1/databases/:slug/entries?page=&per_page= - List entries, newest first
//! - POST /api/v1/databases/:slug/entries - Create an entry
//! - GET /api/v1/databases/:slug/entries/:entry_id - Get an entry
//! - PUT /api/v1/databases/:slug/entries/:entry_id - Replace an entry's values
//! - DELETE /api/v1/databases/:slug/entries/:entry_id - Delete an entry

use crate::api::{AccountId, AppState, MessageResponse};
use crate::error::Result;
use crate::schema::{Entry, EntryValues};
use crate::store::{PageRequest, Pagination};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
pub struct EntryListResponse {
    pub entries: Vec<Entry>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct EntryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub entry: Entry,
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    #[serde(default)]
    pub values: EntryValues,
}

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
    Query(request): Query<PageRequest>,
) -> Result<impl IntoResponse> {
    let page = state.entries.list_entries(account.as_str(), &slug, request)?;
    Ok(Json(EntryListResponse {
        entries: page.items,
        pagination: page.pagination,
    }))
}

pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
    Json(request): Json<EntryRequest>,
) -> Result<impl IntoResponse> {
    let entry = state
        .entries
        .create_entry(account.as_str(), &slug, &request.values)?;

    Ok((
        StatusCode::CREATED,
        Json(EntryResponse {
            message: Some("Entry created successfully".to_string()),
            entry,
        }),
    ))
}

pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, entry_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let entry = state.entries.get_entry(account.as_str(), &slug, &entry_id)?;
    Ok(Json(EntryResponse {
        message: None,
        entry,
    }))
}

pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, entry_id)): Path<(String, String)>,
    Json(request): Json<EntryRequest>,
) -> Result<impl IntoResponse> {
    let entry = state
        .entries
        .update_entry(account.as_str(), &slug, &entry_id, &request.values)?;

    Ok(Json(EntryResponse {
        message: Some("Entry updated successfully".to_string()),
        entry,
    }))
}

pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, entry_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.entries.delete_entry(account.as_str(), &slug, &entry_id)?;
    Ok(Json(MessageResponse::new("Entry deleted successfully")))
}
