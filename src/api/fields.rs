//! Field endpoints
//!
//! - GET /api/v1/databases/:slug/fields - List fields in display order
//! - POST /api/v1/databases/:slug/fields - Add a field
//! - POST /api/v1/databases/:slug/fields/reorder - Reorder fields
//! - GET /api/v1/databases/:slug/fields/:field_id - Get a field
//! - PUT /api/v1/databases/:slug/fields/:field_id - Update a field
//! - DELETE /api/v1/databases/:slug/fields/:field_id - Delete a field
//! - POST /api/v1/databases/:slug/fields/:field_id/preview-type-change - Report the impact of a type change

use crate::api::{AccountId, AppState, MessageResponse};
use crate::error::{DabbleError, Result};
use crate::registry::{FieldUpdate, NewField};
use crate::schema::{FieldDefinition, FieldType, TypeChangeAnalysis};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Serialize)]
pub struct FieldListResponse {
    pub fields: Vec<FieldDefinition>,
}

#[derive(Serialize)]
pub struct FieldResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub field: FieldDefinition,
}

fn parse_field_type(value: &str) -> Result<FieldType> {
    value
        .parse()
        .map_err(|message| DabbleError::InvalidRequest { message })
}

/// Keep an explicit `null` distinct from an absent key
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub async fn list_fields(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let fields = state.databases.list_fields(account.as_str(), &slug)?;
    Ok(Json(FieldListResponse { fields }))
}

pub async fn get_field(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, field_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let field = state.databases.get_field(account.as_str(), &slug, &field_id)?;
    Ok(Json(FieldResponse {
        message: None,
        field,
    }))
}

// === Create Field ===

#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    pub name: String,
    #[serde(alias = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub order: i64,
}

pub async fn create_field(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
    Json(request): Json<CreateFieldRequest>,
) -> Result<impl IntoResponse> {
    let new_field = NewField {
        name: request.name,
        field_type: parse_field_type(&request.field_type)?,
        required: request.required,
        default_value: request.default_value,
        order: request.order,
    };
    let field = state.databases.add_field(account.as_str(), &slug, new_field)?;

    Ok((
        StatusCode::CREATED,
        Json(FieldResponse {
            message: Some("Field created successfully".to_string()),
            field,
        }),
    ))
}

// === Update Field ===

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub field_type: Option<String>,
    pub required: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub default_value: Option<Value>,
    pub order: Option<i64>,
    #[serde(default)]
    pub confirm_data_loss: bool,
}

pub async fn update_field(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, field_id)): Path<(String, String)>,
    Json(request): Json<UpdateFieldRequest>,
) -> Result<impl IntoResponse> {
    let update = FieldUpdate {
        name: request.name,
        field_type: request.field_type.as_deref().map(parse_field_type).transpose()?,
        required: request.required,
        default_value: request.default_value,
        order: request.order,
        confirm_data_loss: request.confirm_data_loss,
    };
    let field = state
        .databases
        .update_field(account.as_str(), &slug, &field_id, update)?;

    Ok(Json(FieldResponse {
        message: Some("Field updated successfully".to_string()),
        field,
    }))
}

pub async fn delete_field(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, field_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.databases.delete_field(account.as_str(), &slug, &field_id)?;
    Ok(Json(MessageResponse::new("Field deleted successfully")))
}

// === Reorder ===

#[derive(Debug, Deserialize)]
pub struct ReorderFieldsRequest {
    #[serde(default)]
    pub field_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct ReorderFieldsResponse {
    pub message: String,
    pub fields: Vec<FieldDefinition>,
}

pub async fn reorder_fields(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path(slug): Path<String>,
    Json(request): Json<ReorderFieldsRequest>,
) -> Result<impl IntoResponse> {
    let fields = state
        .databases
        .reorder_fields(account.as_str(), &slug, &request.field_ids)?;

    Ok(Json(ReorderFieldsResponse {
        message: "Fields reordered successfully".to_string(),
        fields,
    }))
}

// === Preview Type Change ===

#[derive(Debug, Deserialize)]
pub struct PreviewTypeChangeRequest {
    #[serde(alias = "field_type")]
    pub new_type: String,
}

#[derive(Serialize)]
pub struct PreviewTypeChangeResponse {
    pub requires_confirmation: bool,
    pub analysis: TypeChangeAnalysis,
}

pub async fn preview_type_change(
    State(state): State<Arc<AppState>>,
    account: AccountId,
    Path((slug, field_id)): Path<(String, String)>,
    Json(request): Json<PreviewTypeChangeRequest>,
) -> Result<impl IntoResponse> {
    let to_type = parse_field_type(&request.new_type)?;
    let analysis = state
        .databases
        .preview_type_change(account.as_str(), &slug, &field_id, to_type)?;

    Ok(Json(PreviewTypeChangeResponse {
        requires_confirmation: analysis.will_lose_data > 0,
        analysis,
    }))
}
