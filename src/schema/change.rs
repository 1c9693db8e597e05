//! Field Type Change
//!
//! A field's type is never changed behind the entries' back. The owner first
//! previews the impact, then confirms if some stored values cannot be
//! converted; those values are cleared to null.
//!
//! Conversion here is deliberately more lenient than entry coercion: it is
//! about salvaging existing data (`"yes"` becomes `true`, anything becomes a
//! string), not about validating fresh input.

use crate::schema::coerce::{is_email, is_url, normalize_date, whole_f64_to_i64};
use crate::schema::entry::Entry;
use crate::schema::types::{FieldType, TypeCompatibility};
use serde::Serialize;
use serde_json::{Number, Value};

const MAX_AFFECTED_ENTRIES: usize = 10;
const MAX_PREVIEW_CHARS: usize = 100;

/// A stored value that would not survive the type change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffectedEntry {
    pub entry_id: String,
    pub current_value: String,
}

/// Impact of changing a field's type on the existing entries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeChangeAnalysis {
    pub field: String,
    pub from_type: FieldType,
    pub to_type: FieldType,
    pub compatibility: TypeCompatibility,
    pub total_entries: usize,
    pub entries_with_value: usize,
    pub convertible: usize,
    pub will_lose_data: usize,
    /// First few entries that would lose their value
    pub affected_entries: Vec<AffectedEntry>,
}

/// Convert a stored value to `to`. `None` means the value cannot be kept.
pub fn convert_value(value: &Value, to: FieldType) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    if let Value::String(s) = value {
        if s.trim().is_empty() {
            return Some(if to == FieldType::String {
                value.clone()
            } else {
                Value::Null
            });
        }
    }

    match to {
        FieldType::String => Some(Value::String(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        FieldType::Integer => match value {
            Value::Bool(b) => Some(Value::from(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_f64_to_i64))
                .map(Value::from),
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| {
                        trimmed.parse::<f64>().ok().and_then(whole_f64_to_i64)
                    })
                    .map(Value::from)
            }
            _ => None,
        },
        FieldType::Decimal => {
            let f = match value {
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            f.and_then(Number::from_f64).map(Value::Number)
        }
        FieldType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Date => value.as_str().and_then(normalize_date).map(Value::String),
        FieldType::Email => value
            .as_str()
            .filter(|s| is_email(s))
            .map(|s| Value::String(s.trim().to_string())),
        FieldType::Url => value
            .as_str()
            .filter(|s| is_url(s))
            .map(|s| Value::String(s.trim().to_string())),
        FieldType::Object => value.is_object().then(|| value.clone()),
        FieldType::List => value.is_array().then(|| value.clone()),
    }
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn preview(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    rendered.chars().take(MAX_PREVIEW_CHARS).collect()
}

/// Report how many stored values of `field` survive a change to `to_type`
pub fn analyze_type_change(
    entries: &[Entry],
    field: &str,
    from_type: FieldType,
    to_type: FieldType,
) -> TypeChangeAnalysis {
    let mut entries_with_value = 0;
    let mut convertible = 0;
    let mut affected = Vec::new();

    for entry in entries {
        let value = entry.values.get(field);
        if !has_value(value) {
            continue;
        }
        entries_with_value += 1;

        match value.and_then(|v| convert_value(v, to_type)) {
            Some(_) => convertible += 1,
            None => affected.push(AffectedEntry {
                entry_id: entry.id.clone(),
                current_value: value.map(preview).unwrap_or_default(),
            }),
        }
    }

    let will_lose_data = affected.len();
    affected.truncate(MAX_AFFECTED_ENTRIES);

    TypeChangeAnalysis {
        field: field.to_string(),
        from_type,
        to_type,
        compatibility: from_type.compatibility_with(to_type),
        total_entries: entries.len(),
        entries_with_value,
        convertible,
        will_lose_data,
        affected_entries: affected,
    }
}

/// Convert every stored value of `field` to `to_type`, clearing the ones that
/// cannot be converted. Returns the number of cleared values.
pub fn apply_type_change(entries: &mut [Entry], field: &str, to_type: FieldType) -> usize {
    let mut cleared = 0;

    for entry in entries.iter_mut() {
        let Some(value) = entry.values.get_mut(field) else {
            continue;
        };

        match convert_value(value, to_type) {
            Some(converted) => *value = converted,
            None => {
                *value = Value::Null;
                cleared += 1;
            }
        }
        entry.touch();
    }

    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::coerce::EntryValues;
    use serde_json::json;

    fn entry(id: &str, values: Value) -> Entry {
        let values: EntryValues = values.as_object().cloned().unwrap();
        Entry::new(id.to_string(), "db1", 1, values)
    }

    #[test]
    fn test_convert_to_string() {
        assert_eq!(convert_value(&json!(12), FieldType::String), Some(json!("12")));
        assert_eq!(convert_value(&json!(true), FieldType::String), Some(json!("true")));
        assert_eq!(
            convert_value(&json!({"a": 1}), FieldType::String),
            Some(json!("{\"a\":1}"))
        );
    }

    #[test]
    fn test_convert_to_integer() {
        assert_eq!(convert_value(&json!("7"), FieldType::Integer), Some(json!(7)));
        assert_eq!(convert_value(&json!("7.0"), FieldType::Integer), Some(json!(7)));
        assert_eq!(convert_value(&json!(2.0), FieldType::Integer), Some(json!(2)));
        assert_eq!(convert_value(&json!(true), FieldType::Integer), Some(json!(1)));
        assert_eq!(convert_value(&json!(2.5), FieldType::Integer), None);
        assert_eq!(convert_value(&json!("seven"), FieldType::Integer), None);
    }

    #[test]
    fn test_convert_out_of_range_integer_is_lost() {
        assert_eq!(convert_value(&json!("1e30"), FieldType::Integer), None);
        assert_eq!(
            convert_value(&json!(9_223_372_036_854_775_808u64), FieldType::Integer),
            None
        );
        assert_eq!(convert_value(&json!("1e3"), FieldType::Integer), Some(json!(1000)));

        let entries = vec![entry("e1", json!({"n": "1e30"})), entry("e2", json!({"n": "5"}))];
        let analysis = analyze_type_change(&entries, "n", FieldType::String, FieldType::Integer);
        assert_eq!(analysis.convertible, 1);
        assert_eq!(analysis.will_lose_data, 1);
        assert_eq!(analysis.affected_entries[0].entry_id, "e1");
    }

    #[test]
    fn test_convert_to_boolean_is_lenient() {
        assert_eq!(convert_value(&json!("yes"), FieldType::Boolean), Some(json!(true)));
        assert_eq!(convert_value(&json!("0"), FieldType::Boolean), Some(json!(false)));
        assert_eq!(convert_value(&json!(3), FieldType::Boolean), Some(json!(true)));
        assert_eq!(convert_value(&json!("maybe"), FieldType::Boolean), None);
    }

    #[test]
    fn test_empty_values_always_convert() {
        assert_eq!(convert_value(&Value::Null, FieldType::List), Some(Value::Null));
        assert_eq!(convert_value(&json!(""), FieldType::Integer), Some(Value::Null));
        assert_eq!(convert_value(&json!(""), FieldType::String), Some(json!("")));
    }

    #[test]
    fn test_structured_conversions() {
        assert_eq!(convert_value(&json!([1]), FieldType::List), Some(json!([1])));
        assert_eq!(convert_value(&json!("[1]"), FieldType::List), None);
        assert_eq!(convert_value(&json!({"a": 1}), FieldType::List), None);
    }

    #[test]
    fn test_analyze_type_change() {
        let entries = vec![
            entry("e1", json!({"qty": "3"})),
            entry("e2", json!({"qty": "three"})),
            entry("e3", json!({"qty": null})),
            entry("e4", json!({"qty": "4.5"})),
        ];

        let analysis = analyze_type_change(&entries, "qty", FieldType::String, FieldType::Integer);

        assert_eq!(analysis.total_entries, 4);
        assert_eq!(analysis.entries_with_value, 3);
        assert_eq!(analysis.convertible, 1);
        assert_eq!(analysis.will_lose_data, 2);
        assert_eq!(analysis.affected_entries[0].entry_id, "e2");
        assert_eq!(analysis.affected_entries[1].current_value, "4.5");
        assert!(matches!(analysis.compatibility, TypeCompatibility::DataLoss { .. }));
    }

    #[test]
    fn test_affected_entries_are_capped_and_truncated() {
        let long = "x".repeat(250);
        let entries: Vec<Entry> = (0..15)
            .map(|i| entry(&format!("e{}", i), json!({"qty": long})))
            .collect();

        let analysis = analyze_type_change(&entries, "qty", FieldType::String, FieldType::Integer);

        assert_eq!(analysis.will_lose_data, 15);
        assert_eq!(analysis.affected_entries.len(), 10);
        assert_eq!(analysis.affected_entries[0].current_value.chars().count(), 100);
    }

    #[test]
    fn test_apply_type_change_clears_unconvertible() {
        let mut entries = vec![
            entry("e1", json!({"qty": "3"})),
            entry("e2", json!({"qty": "three"})),
        ];

        let cleared = apply_type_change(&mut entries, "qty", FieldType::Integer);

        assert_eq!(cleared, 1);
        assert_eq!(entries[0].values["qty"], json!(3));
        assert_eq!(entries[1].values["qty"], Value::Null);
    }
}
