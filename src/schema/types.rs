//! Field Type Compatibility Matrix
//!
//! The closed set of field types a database schema can declare, and which
//! changes between them are SAFE vs DATALOSS.
//! Used to classify a field type change before existing entries are converted.
//!
//! Classification:
//! - SAFE: every stored value converts
//! - DATALOSS: some stored values may not convert and would be cleared
//! - INCOMPATIBLE: stored values will practically never convert

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a field.
///
/// Serialized with the short codes used by the dashboard (`BOOL`, `INT`, ...);
/// the long lowercase names are accepted as aliases on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "BOOL", alias = "boolean")]
    Boolean,
    #[serde(rename = "INT", alias = "integer")]
    Integer,
    #[serde(rename = "DEC", alias = "decimal")]
    Decimal,
    #[serde(rename = "STR", alias = "string")]
    String,
    #[serde(rename = "DATE", alias = "date")]
    Date,
    #[serde(rename = "EMAIL", alias = "email")]
    Email,
    #[serde(rename = "URL", alias = "url")]
    Url,
    #[serde(rename = "DICT", alias = "object")]
    Object,
    #[serde(rename = "LIST", alias = "list")]
    List,
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::Decimal,
        FieldType::String,
        FieldType::Date,
        FieldType::Email,
        FieldType::Url,
        FieldType::Object,
        FieldType::List,
    ];

    /// Wire code stored with the field definition
    pub fn code(&self) -> &'static str {
        match self {
            FieldType::Boolean => "BOOL",
            FieldType::Integer => "INT",
            FieldType::Decimal => "DEC",
            FieldType::String => "STR",
            FieldType::Date => "DATE",
            FieldType::Email => "EMAIL",
            FieldType::Url => "URL",
            FieldType::Object => "DICT",
            FieldType::List => "LIST",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Object => "object",
            FieldType::List => "list",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }

    /// Text-backed types whose values are plain strings once coerced
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Date | FieldType::Email | FieldType::Url
        )
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, FieldType::Object | FieldType::List)
    }

    /// Classify changing a field from `self` to `to`
    pub fn compatibility_with(&self, to: FieldType) -> TypeCompatibility {
        use FieldType::*;

        let from = *self;
        if from == to {
            return TypeCompatibility::Identical;
        }

        match (from, to) {
            // Everything has a string rendering
            (_, String) => TypeCompatibility::Safe,

            // Widenings
            (Boolean, Integer) | (Boolean, Decimal) | (Integer, Decimal) => TypeCompatibility::Safe,

            // Narrowings
            (Decimal, Integer) => TypeCompatibility::DataLoss {
                reason: "Values with a fractional part cannot be stored as integers".to_string(),
            },
            (Integer, Boolean) | (Decimal, Boolean) => TypeCompatibility::DataLoss {
                reason: "Numbers collapse to true/false".to_string(),
            },
            (String, Boolean) | (String, Integer) | (String, Decimal) | (String, Date)
            | (String, Email) | (String, Url) => TypeCompatibility::DataLoss {
                reason: format!("Text values must parse as {}", to),
            },
            (Email, Url) | (Url, Email) => TypeCompatibility::DataLoss {
                reason: format!("Values must match the {} format", to),
            },

            (Object, _) | (List, _) | (_, Object) | (_, List) => TypeCompatibility::Incompatible {
                reason: format!("Structured values cannot be converted between {} and {}", from, to),
            },

            _ => TypeCompatibility::Incompatible {
                reason: format!("No conversion from {} to {}", from, to),
            },
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    /// Accepts either the wire code or the long name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.code().eq_ignore_ascii_case(needle) || t.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("Unknown field type: {}", s))
    }
}

/// Result of a type compatibility check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeCompatibility {
    /// Same type, no change needed
    Identical,
    /// Every value converts
    Safe,
    /// Some values may not convert
    DataLoss { reason: String },
    /// Values will not convert
    Incompatible { reason: String },
}

impl TypeCompatibility {
    pub fn is_safe(&self) -> bool {
        matches!(self, TypeCompatibility::Identical | TypeCompatibility::Safe)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TypeCompatibility::Identical => "IDENTICAL",
            TypeCompatibility::Safe => "SAFE",
            TypeCompatibility::DataLoss { .. } => "DATALOSS",
            TypeCompatibility::Incompatible { .. } => "INCOMPATIBLE",
        }
    }
}

/// Format the compatibility matrix as a readable string
pub fn format_matrix() -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════\n");
    output.push_str("               FIELD TYPE COMPATIBILITY MATRIX\n");
    output.push_str("═══════════════════════════════════════════════════════════════\n\n");

    output.push_str(&format!("{:<8}", "from\\to"));
    for to in FieldType::ALL {
        output.push_str(&format!("{:>7}", to.code()));
    }
    output.push('\n');

    for from in FieldType::ALL {
        output.push_str(&format!("{:<8}", from.code()));
        for to in FieldType::ALL {
            let cell = match from.compatibility_with(to) {
                TypeCompatibility::Identical => "=",
                TypeCompatibility::Safe => "safe",
                TypeCompatibility::DataLoss { .. } => "loss",
                TypeCompatibility::Incompatible { .. } => "-",
            };
            output.push_str(&format!("{:>7}", cell));
        }
        output.push('\n');
    }

    output.push_str("\nDATALOSS CHANGES (some values may be cleared):\n");
    output.push_str("───────────────────────────────────────────────────────────────\n");

    for from in FieldType::ALL {
        for to in FieldType::ALL {
            if let TypeCompatibility::DataLoss { reason } = from.compatibility_with(to) {
                output.push_str(&format!("  {} → {}\n    Reason: {}\n", from.code(), to.code(), reason));
            }
        }
    }

    output.push_str("\n═══════════════════════════════════════════════════════════════\n");

    output
}
