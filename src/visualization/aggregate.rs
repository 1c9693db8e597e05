//! Visualization Aggregator
//!
//! Folds the entries of each source database into labeled buckets:
//! - label: the grouping field's value rendered as text ("Unknown" when empty),
//!   or the entry's creation/update day for the timestamp pseudo-fields
//! - value: count, sum or average of the value field per bucket
//!
//! Buckets are kept in a `BTreeMap`, so each series comes out sorted by label
//! and repeated calls over unchanged data return identical output.

use crate::error::ValidationError;
use crate::schema::{Entry, Schema, CREATED_AT_FIELD, UPDATED_AT_FIELD};
use crate::visualization::config::{Aggregation, VisualizationConfig};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const UNKNOWN_LABEL: &str = "Unknown";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Entries of one source database, already loaded by the caller
#[derive(Debug, Clone, Copy)]
pub struct SourceData<'a> {
    pub schema: &'a Schema,
    pub entries: &'a [Entry],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Labeled bucket series of one source database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataSeries {
    pub database_slug: String,
    #[serde(rename = "database_title")]
    pub source_schema_title: String,
    pub data: Vec<ChartPoint>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    count: u64,
    sum: f64,
}

impl Bucket {
    fn value(&self, aggregation: Aggregation) -> f64 {
        match aggregation {
            Aggregation::Count => self.count as f64,
            Aggregation::Sum => self.sum,
            Aggregation::Average if self.count == 0 => 0.0,
            Aggregation::Average => self.sum / self.count as f64,
        }
    }
}

fn is_timestamp_field(name: &str) -> bool {
    name == CREATED_AT_FIELD || name == UPDATED_AT_FIELD
}

/// Produce one series per source, in source order.
///
/// Fails with `UnknownField` when a source schema lacks the grouping or value
/// field, and with `UnsupportedChartAggregation` when `sum`/`average` has no
/// value field to read.
pub fn aggregate(
    config: &VisualizationConfig,
    sources: &[SourceData<'_>],
) -> Result<Vec<ChartDataSeries>, ValidationError> {
    config.check_aggregation()?;

    for source in sources {
        check_source_fields(config, source.schema)?;
    }

    let value_field = config.value_field();

    Ok(sources
        .iter()
        .map(|source| {
            let buckets = source.entries.iter().fold(
                BTreeMap::<String, Bucket>::new(),
                |mut buckets, entry| {
                    let bucket = buckets.entry(bucket_label(entry, &config.x_field)).or_default();
                    bucket.count += 1;
                    if let Some(field) = value_field {
                        bucket.sum += numeric_contribution(entry.values.get(field));
                    }
                    buckets
                },
            );

            ChartDataSeries {
                database_slug: source.schema.slug.clone(),
                source_schema_title: source.schema.title.clone(),
                data: buckets
                    .into_iter()
                    .map(|(label, bucket)| ChartPoint {
                        label,
                        value: bucket.value(config.aggregation),
                    })
                    .collect(),
            }
        })
        .collect())
}

/// Check that `schema` has the grouping and value fields `config` reads
pub fn check_source_fields(config: &VisualizationConfig, schema: &Schema) -> Result<(), ValidationError> {
    if !is_timestamp_field(&config.x_field) && !schema.has_field(&config.x_field) {
        return Err(ValidationError::UnknownField {
            field: config.x_field.clone(),
        });
    }

    if let Some(field) = config.value_field() {
        if !schema.has_field(field) {
            return Err(ValidationError::UnknownField {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

fn bucket_label(entry: &Entry, x_field: &str) -> String {
    match x_field {
        CREATED_AT_FIELD => entry.created_at.format(DAY_FORMAT).to_string(),
        UPDATED_AT_FIELD => entry.updated_at.format(DAY_FORMAT).to_string(),
        _ => match entry.values.get(x_field) {
            None | Some(Value::Null) => UNKNOWN_LABEL.to_string(),
            Some(Value::String(s)) if s.is_empty() => UNKNOWN_LABEL.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        },
    }
}

fn numeric_contribution(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Sorted union of the labels of every series, for a shared chart axis
pub fn collect_labels(series: &[ChartDataSeries]) -> Vec<String> {
    series
        .iter()
        .flat_map(|s| s.data.iter().map(|p| p.label.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
