//! Entry Validator/Coercer
//!
//! Turns a raw key/value payload into a value mapping that matches a schema:
//! every declared field present, every value of its declared type.
//!
//! Rules per type:
//! - BOOL: JSON booleans, or "true"/"false" in any case
//! - INT: JSON integers (or floats without a fractional part), base-10 strings
//! - DEC: finite JSON numbers or numeric strings
//! - STR/EMAIL/URL: strings; EMAIL and URL must match their pattern
//! - DATE: ISO-8601 date, RFC 3339 date-time or naive date-time
//! - DICT/LIST: JSON objects / arrays only
//!
//! `null`, an absent key and (for every type but STR) the empty string all
//! mean "no value".

use crate::error::ValidationError;
use crate::schema::field::{FieldDefinition, Schema};
use crate::schema::types::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;

/// Coerced values of one entry, keyed by field name
pub type EntryValues = Map<String, Value>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").unwrap())
}

/// Validate `raw` against `schema` and return the coerced value mapping.
///
/// Fields are checked in schema order, unknown keys afterwards; the first
/// failure is returned. The output holds exactly the schema's field names,
/// with defaults substituted and `null` for optional fields left empty.
pub fn coerce(schema: &Schema, raw: &EntryValues) -> Result<EntryValues, ValidationError> {
    let mut values = EntryValues::new();

    for field in &schema.fields {
        let value = coerce_field(field, raw.get(&field.name))?;
        values.insert(field.name.clone(), value);
    }

    if let Some(unknown) = raw.keys().find(|key| !schema.has_field(key)) {
        return Err(ValidationError::UnknownField {
            field: unknown.clone(),
        });
    }

    Ok(values)
}

/// Coerce a single field's raw value, applying its default when empty
pub fn coerce_field(field: &FieldDefinition, raw: Option<&Value>) -> Result<Value, ValidationError> {
    match raw.filter(|v| !is_empty_for(field.field_type, v)) {
        Some(value) => coerce_value(field.field_type, &field.name, value),
        None => match field.effective_default() {
            Some(default) => Ok(default.clone()),
            None if field.required => Err(ValidationError::MissingRequiredField {
                field: field.name.clone(),
            }),
            None => Ok(Value::Null),
        },
    }
}

fn is_empty_for(field_type: FieldType, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() && field_type != FieldType::String,
        _ => false,
    }
}

/// Coerce one non-empty value to `field_type`
pub fn coerce_value(field_type: FieldType, field: &str, value: &Value) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        field: field.to_string(),
        expected: field_type,
        found: json_type_name(value).to_string(),
    };
    let invalid = || ValidationError::FormatInvalid {
        field: field.to_string(),
        expected: field_type,
    };

    match field_type {
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        FieldType::Integer => match value {
            Value::Number(n) => integer_from_number(n).map(Value::from).ok_or_else(mismatch),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        FieldType::Decimal => {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch)
        }
        FieldType::String => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            _ => Err(mismatch()),
        },
        FieldType::Email | FieldType::Url => match value {
            Value::String(s) => {
                let trimmed = s.trim();
                let pattern = if field_type == FieldType::Email {
                    email_pattern()
                } else {
                    url_pattern()
                };
                if pattern.is_match(trimmed) {
                    Ok(Value::String(trimmed.to_string()))
                } else {
                    Err(invalid())
                }
            }
            _ => Err(mismatch()),
        },
        FieldType::Date => match value {
            Value::String(s) => normalize_date(s).map(Value::String).ok_or_else(invalid),
            _ => Err(mismatch()),
        },
        FieldType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        FieldType::List => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
    }
}

fn integer_from_number(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64().and_then(whole_f64_to_i64)
}

/// Exact conversion of a whole float; `None` outside `i64` range.
///
/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
pub(crate) fn whole_f64_to_i64(f: f64) -> Option<i64> {
    const LOWER: f64 = -9_223_372_036_854_775_808.0;
    const UPPER: f64 = 9_223_372_036_854_775_808.0;

    (f.fract() == 0.0 && (LOWER..UPPER).contains(&f)).then(|| f as i64)
}

/// Parse an ISO-8601 date or date-time and render it in canonical form.
///
/// The output keeps the precision of the input (date, naive date-time or
/// offset date-time) and parses back to itself.
pub fn normalize_date(input: &str) -> Option<String> {
    let s = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(date.format(DATE_FORMAT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, NAIVE_DATETIME_FORMAT) {
        return Some(dt.format(NAIVE_DATETIME_FORMAT).to_string());
    }
    None
}

pub(crate) fn is_email(s: &str) -> bool {
    email_pattern().is_match(s.trim())
}

pub(crate) fn is_url(s: &str) -> bool {
    url_pattern().is_match(s.trim())
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "decimal",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, field_type: FieldType) -> FieldDefinition {
        FieldDefinition::new(format!("id_{}", name), name, field_type)
    }

    fn raw(value: Value) -> EntryValues {
        value.as_object().cloned().unwrap()
    }

    fn single(field_type: FieldType, value: Value) -> Result<Value, ValidationError> {
        coerce_value(field_type, "f", &value)
    }

    fn ledger_schema() -> Schema {
        Schema::new("Ledger")
            .with_field(field("category", FieldType::String).required(true).with_order(0))
            .with_field(field("amount", FieldType::Decimal).with_order(1))
            .with_field(field("paid", FieldType::Boolean).with_default(json!(false)).with_order(2))
    }

    #[test]
    fn test_boolean_strings() {
        assert_eq!(single(FieldType::Boolean, json!("true")).unwrap(), json!(true));
        assert_eq!(single(FieldType::Boolean, json!("FALSE")).unwrap(), json!(false));
        assert_eq!(single(FieldType::Boolean, json!(true)).unwrap(), json!(true));

        let err = single(FieldType::Boolean, json!("yes")).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
        assert!(single(FieldType::Boolean, json!(1)).is_err());
    }

    #[test]
    fn test_integer_rejects_fractions() {
        assert_eq!(single(FieldType::Integer, json!("3")).unwrap(), json!(3));
        assert_eq!(single(FieldType::Integer, json!(-12)).unwrap(), json!(-12));
        assert_eq!(single(FieldType::Integer, json!(4.0)).unwrap(), json!(4));

        let err = single(FieldType::Integer, json!("3.5")).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
        assert!(single(FieldType::Integer, json!(3.5)).is_err());
        assert!(single(FieldType::Integer, json!("abc")).is_err());
        assert!(single(FieldType::Integer, json!(true)).is_err());
    }

    #[test]
    fn test_integer_out_of_range_is_a_mismatch() {
        // 2^63 as a JSON number and as a string are both rejected
        let err = single(FieldType::Integer, json!(9_223_372_036_854_775_808u64)).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
        assert!(single(FieldType::Integer, json!("9223372036854775808")).is_err());
        assert!(single(FieldType::Integer, json!(1e30)).is_err());
        assert!(single(FieldType::Integer, json!(-1e19)).is_err());

        assert_eq!(
            single(FieldType::Integer, json!(i64::MAX)).unwrap(),
            json!(i64::MAX)
        );
        assert_eq!(
            single(FieldType::Integer, json!(-9_223_372_036_854_775_808.0)).unwrap(),
            json!(i64::MIN)
        );
    }

    #[test]
    fn test_decimal() {
        assert_eq!(single(FieldType::Decimal, json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(single(FieldType::Decimal, json!(7)).unwrap(), json!(7.0));
        assert!(single(FieldType::Decimal, json!("NaN")).is_err());
        assert!(single(FieldType::Decimal, json!("ten")).is_err());
        assert!(single(FieldType::Decimal, json!([1])).is_err());
    }

    #[test]
    fn test_email_and_url_formats() {
        assert_eq!(
            single(FieldType::Email, json!(" ada@example.com ")).unwrap(),
            json!("ada@example.com")
        );
        let err = single(FieldType::Email, json!("not-an-email")).unwrap_err();
        assert!(matches!(err, ValidationError::FormatInvalid { .. }));

        assert!(single(FieldType::Url, json!("https://example.com/a?b=c")).is_ok());
        assert!(single(FieldType::Url, json!("HTTP://EXAMPLE.COM")).is_ok());
        let err = single(FieldType::Url, json!("ftp://example.com")).unwrap_err();
        assert!(matches!(err, ValidationError::FormatInvalid { .. }));

        let err = single(FieldType::Url, json!(42)).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn test_dates() {
        assert_eq!(single(FieldType::Date, json!("2024-03-01")).unwrap(), json!("2024-03-01"));
        assert_eq!(
            single(FieldType::Date, json!("2024-03-01T10:30:00Z")).unwrap(),
            json!("2024-03-01T10:30:00+00:00")
        );
        assert_eq!(
            single(FieldType::Date, json!("2024-03-01T10:30:00")).unwrap(),
            json!("2024-03-01T10:30:00")
        );

        let err = single(FieldType::Date, json!("March 1st")).unwrap_err();
        assert!(matches!(err, ValidationError::FormatInvalid { .. }));
        assert!(single(FieldType::Date, json!("2024-02-30")).is_err());
    }

    #[test]
    fn test_structured_types_reject_scalars() {
        assert!(single(FieldType::Object, json!({"a": 1})).is_ok());
        assert!(single(FieldType::List, json!([1, 2])).is_ok());

        let err = single(FieldType::Object, json!("{\"a\": 1}")).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
        assert!(single(FieldType::List, json!({"a": 1})).is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let err = coerce(&ledger_schema(), &raw(json!({"amount": 3}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequiredField {
                field: "category".to_string()
            }
        );

        // Null counts as absent
        let err = coerce(&ledger_schema(), &raw(json!({"category": null}))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_required_field_with_default_is_filled() {
        let schema = Schema::new("Tasks").with_field(
            field("status", FieldType::String)
                .required(true)
                .with_default(json!("open")),
        );
        let values = coerce(&schema, &EntryValues::new()).unwrap();
        assert_eq!(values["status"], json!("open"));
    }

    #[test]
    fn test_unknown_field() {
        let err = coerce(
            &ledger_schema(),
            &raw(json!({"category": "A", "nonexistent": 1})),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownField {
                field: "nonexistent".to_string()
            }
        );
    }

    #[test]
    fn test_output_keys_match_schema() {
        let schema = ledger_schema();
        let values = coerce(&schema, &raw(json!({"category": "A"}))).unwrap();

        let mut keys: Vec<&str> = values.keys().map(String::as_str).collect();
        let mut expected = schema.field_names();
        keys.sort();
        expected.sort();
        assert_eq!(keys, expected);

        assert_eq!(values["amount"], Value::Null);
        assert_eq!(values["paid"], json!(false));
    }

    #[test]
    fn test_empty_string_is_absent_for_non_string_types() {
        let values = coerce(
            &ledger_schema(),
            &raw(json!({"category": "", "amount": "", "paid": ""})),
        )
        .unwrap();
        assert_eq!(values["category"], json!(""));
        assert_eq!(values["amount"], Value::Null);
        assert_eq!(values["paid"], json!(false));
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let schema = Schema::new("Everything")
            .with_field(field("b", FieldType::Boolean))
            .with_field(field("i", FieldType::Integer))
            .with_field(field("d", FieldType::Decimal))
            .with_field(field("s", FieldType::String))
            .with_field(field("dt", FieldType::Date))
            .with_field(field("dtz", FieldType::Date))
            .with_field(field("e", FieldType::Email))
            .with_field(field("u", FieldType::Url))
            .with_field(field("o", FieldType::Object))
            .with_field(field("l", FieldType::List));

        let input = raw(json!({
            "b": "True",
            "i": "42",
            "d": "10",
            "s": "hello",
            "dt": "2024-01-05",
            "dtz": "2024-01-05T08:00:00.250+02:00",
            "e": "a@b.io",
            "u": "https://b.io",
            "o": {"k": [1, 2]},
            "l": ["x"]
        }));

        let once = coerce(&schema, &input).unwrap();
        let twice = coerce(&schema, &once).unwrap();
        assert_eq!(once, twice);
    }
}
