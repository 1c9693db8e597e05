mod change;
mod coerce;
mod entry;
mod field;
mod types;

pub use change::{analyze_type_change, apply_type_change, convert_value, AffectedEntry, TypeChangeAnalysis};
pub use coerce::{coerce, coerce_field, coerce_value, json_type_name, normalize_date, EntryValues};
pub use entry::Entry;
pub use field::{
    slugify, FieldDefinition, Schema, CREATED_AT_FIELD, MAX_NAME_LENGTH, UPDATED_AT_FIELD,
};
pub use types::{format_matrix, FieldType, TypeCompatibility};
