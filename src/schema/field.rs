//! Field definitions and the ordered schema they form.

use crate::schema::types::FieldType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_NAME_LENGTH: usize = 120;

/// Pseudo-fields that group entries by their timestamps instead of a value
pub const CREATED_AT_FIELD: &str = "__created_at__";
pub const UPDATED_AT_FIELD: &str = "__updated_at__";

/// One typed, named column of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Already coerced to `field_type`
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FieldDefinition {
    pub fn new(id: String, name: &str, field_type: FieldType) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.to_string(),
            field_type,
            required: false,
            default_value: None,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, default_value: Value) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Default value, treating an explicit JSON null as no default
    pub fn effective_default(&self) -> Option<&Value> {
        self.default_value.as_ref().filter(|v| !v.is_null())
    }
}

/// Ordered collection of field definitions describing one custom database.
///
/// `version` increases with every change to the field list so that stored
/// entries can record which layout they were validated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub title: String,
    pub slug: String,
    #[serde(default = "initial_version")]
    pub version: u32,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

fn initial_version() -> u32 {
    1
}

impl Schema {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            slug: slugify(title),
            version: initial_version(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self.sort_fields();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_id(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Keep fields in display order: `order`, then creation time
    pub fn sort_fields(&mut self) {
        self.fields
            .sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
    }

    /// Record a change to the field list
    pub fn bump_version(&mut self) -> u32 {
        self.version += 1;
        self.sort_fields();
        self.version
    }
}

/// Generate a URL-friendly slug from a title.
///
/// Lowercases, drops everything that is not a word character, whitespace or
/// `-`, then collapses runs of whitespace and dashes into a single `-`.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut in_separator = false;

    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
            in_separator = false;
        } else if c.is_whitespace() || c == '-' {
            if !in_separator {
                slug.push('-');
                in_separator = true;
            }
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Book Collection"), "my-book-collection");
        assert_eq!(slugify("  Sales  2024!! "), "sales-2024");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("snake_case ok"), "snake_case-ok");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_fields_sorted_by_order_then_creation() {
        let first = FieldDefinition::new("f1".to_string(), "b", FieldType::String).with_order(1);
        let second = FieldDefinition::new("f2".to_string(), "a", FieldType::String).with_order(0);

        let schema = Schema::new("Books").with_field(first).with_field(second);

        assert_eq!(schema.field_names(), vec!["a", "b"]);
        assert_eq!(schema.slug, "books");
        assert_eq!(schema.version, 1);
    }

    #[test]
    fn test_null_default_is_no_default() {
        let field = FieldDefinition::new("f1".to_string(), "notes", FieldType::String)
            .with_default(Value::Null);
        assert!(field.effective_default().is_none());
    }

    #[test]
    fn test_bump_version() {
        let mut schema = Schema::new("Inventory");
        assert_eq!(schema.bump_version(), 2);
        assert_eq!(schema.version, 2);
    }
}
