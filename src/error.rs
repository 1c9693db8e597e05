use crate::schema::FieldType;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while coercing entry values or aggregating chart data.
///
/// These are pure input errors: nothing is retried and every one of them is
/// reported back to the caller as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    #[error("Type mismatch for {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: String,
    },

    #[error("Invalid format for {field}: expected {expected}")]
    FormatInvalid { field: String, expected: FieldType },

    #[error("Unsupported chart aggregation: {message}")]
    UnsupportedChartAggregation { message: String },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { .. } => "missing_required_field",
            ValidationError::UnknownField { .. } => "unknown_field",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
            ValidationError::FormatInvalid { .. } => "format_invalid",
            ValidationError::UnsupportedChartAggregation { .. } => "unsupported_chart_aggregation",
        }
    }

    /// Name of the offending field, if the error is tied to one
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingRequiredField { field }
            | ValidationError::UnknownField { field }
            | ValidationError::TypeMismatch { field, .. }
            | ValidationError::FormatInvalid { field, .. } => Some(field),
            ValidationError::UnsupportedChartAggregation { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DabbleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database not found: {slug}")]
    DatabaseNotFound { slug: String },

    #[error("Database already exists: {slug}")]
    DatabaseAlreadyExists { slug: String },

    #[error("Field not found: {field_id}")]
    FieldNotFound { field_id: String },

    #[error("Field already exists: {name}")]
    FieldAlreadyExists { name: String },

    #[error("Field {name} is used by visualizations: {visualizations:?}")]
    FieldInUse {
        name: String,
        visualizations: Vec<String>,
    },

    #[error("Entry not found: {entry_id}")]
    EntryNotFound { entry_id: String },

    #[error("Visualization not found: {visualization_id}")]
    VisualizationNotFound { visualization_id: String },

    #[error("Type change of {field} would lose data in {affected} entries")]
    DataLossNotConfirmed {
        field: String,
        affected: usize,
        analysis: serde_json::Value,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: &str, message: String) -> Self {
        Self {
            error: error.to_string(),
            message,
            field: None,
            requires_confirmation: None,
            details: None,
        }
    }
}

impl IntoResponse for DabbleError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            DabbleError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    field: err.field().map(str::to_string),
                    ..ErrorResponse::new(err.kind(), err.to_string())
                },
            ),
            DabbleError::DatabaseNotFound { slug } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("database_not_found", format!("Database '{}' not found", slug)),
            ),
            DabbleError::DatabaseAlreadyExists { slug } => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "database_already_exists",
                    format!("A database with slug '{}' already exists", slug),
                ),
            ),
            DabbleError::FieldNotFound { field_id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("field_not_found", format!("Field '{}' not found", field_id)),
            ),
            DabbleError::FieldAlreadyExists { name } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    field: Some(name.clone()),
                    ..ErrorResponse::new(
                        "field_already_exists",
                        format!("A field named '{}' already exists", name),
                    )
                },
            ),
            DabbleError::FieldInUse { name, visualizations } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    field: Some(name.clone()),
                    details: Some(serde_json::json!({ "visualizations": visualizations })),
                    ..ErrorResponse::new(
                        "field_in_use",
                        format!(
                            "Field '{}' is used by {} visualization(s); update or delete them first",
                            name,
                            visualizations.len()
                        ),
                    )
                },
            ),
            DabbleError::EntryNotFound { entry_id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("entry_not_found", format!("Entry '{}' not found", entry_id)),
            ),
            DabbleError::VisualizationNotFound { visualization_id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "visualization_not_found",
                    format!("Visualization '{}' not found", visualization_id),
                ),
            ),
            DabbleError::DataLossNotConfirmed {
                field,
                affected,
                analysis,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    field: Some(field.clone()),
                    requires_confirmation: Some(true),
                    details: Some(analysis.clone()),
                    ..ErrorResponse::new(
                        "type_change_data_loss",
                        format!(
                            "Type change will cause data loss in {} entries; resend with confirm_data_loss",
                            affected
                        ),
                    )
                },
            ),
            DabbleError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("unauthorized", message.clone()),
            ),
            DabbleError::InvalidRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_request", message.clone()),
            ),
            DabbleError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", msg.clone()),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<std::io::Error> for DabbleError {
    fn from(err: std::io::Error) -> Self {
        DabbleError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for DabbleError {
    fn from(err: serde_json::Error) -> Self {
        DabbleError::Internal(format!("Serialization error: {}", err))
    }
}

impl From<anyhow::Error> for DabbleError {
    fn from(err: anyhow::Error) -> Self {
        DabbleError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DabbleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let err = DabbleError::from(ValidationError::UnknownField {
            field: "nonexistent".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_and_conflict_statuses() {
        let not_found = DabbleError::DatabaseNotFound {
            slug: "inventory".to_string(),
        };
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let conflict = DabbleError::FieldAlreadyExists {
            name: "amount".to_string(),
        };
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let in_use = DabbleError::FieldInUse {
            name: "amount".to_string(),
            visualizations: vec!["Totals".to_string()],
        };
        assert_eq!(in_use.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_validation_error_field_accessor() {
        let err = ValidationError::TypeMismatch {
            field: "active".to_string(),
            expected: FieldType::Boolean,
            found: "string".to_string(),
        };
        assert_eq!(err.field(), Some("active"));
        assert_eq!(err.kind(), "type_mismatch");

        let err = ValidationError::UnsupportedChartAggregation {
            message: "median".to_string(),
        };
        assert_eq!(err.field(), None);
    }
}
