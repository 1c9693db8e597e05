use crate::schema::coerce::EntryValues;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record of values conforming to a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub database_id: String,
    /// Schema version the values were last validated against
    pub schema_version: u32,
    pub values: EntryValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(id: String, database_id: &str, schema_version: u32, values: EntryValues) -> Self {
        let now = Utc::now();
        Self {
            id,
            database_id: database_id.to_string(),
            schema_version,
            values,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
