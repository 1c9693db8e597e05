use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "pie" => Ok(ChartType::Pie),
            other => Err(ValidationError::UnsupportedChartAggregation {
                message: format!("chart type '{}' is not one of bar, line, pie", other),
            }),
        }
    }
}

/// How entries falling in the same bucket are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Count,
    Sum,
    Average,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::Average => "average",
        }
    }

    /// Whether the aggregation reads a value field
    pub fn needs_value_field(&self) -> bool {
        !matches!(self, Aggregation::Count)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(Aggregation::Count),
            "sum" => Ok(Aggregation::Sum),
            "average" | "avg" => Ok(Aggregation::Average),
            other => Err(ValidationError::UnsupportedChartAggregation {
                message: format!("aggregation '{}' is not one of count, sum, average", other),
            }),
        }
    }
}

/// User-specified chart parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    pub title: String,
    pub chart_type: ChartType,
    /// Source databases, by slug
    pub database_slugs: Vec<String>,
    /// Grouping field; entries are bucketed by its value
    pub x_field: String,
    /// Value field read by `sum` and `average`
    #[serde(default)]
    pub y_field: Option<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl VisualizationConfig {
    /// Parse the loosely-typed chart parameters of a request
    pub fn parse(
        title: &str,
        chart_type: &str,
        database_slugs: Vec<String>,
        x_field: &str,
        y_field: Option<&str>,
        aggregation: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let config = Self {
            title: title.trim().to_string(),
            chart_type: chart_type.parse()?,
            database_slugs,
            x_field: x_field.trim().to_string(),
            y_field: y_field
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            aggregation: aggregation
                .map(str::parse::<Aggregation>)
                .transpose()?
                .unwrap_or_default(),
        };
        config.check_aggregation()?;
        Ok(config)
    }

    pub fn value_field(&self) -> Option<&str> {
        self.y_field.as_deref().filter(|s| !s.is_empty())
    }

    /// `sum` and `average` are meaningless without a value field
    pub fn check_aggregation(&self) -> Result<(), ValidationError> {
        if self.aggregation.needs_value_field() && self.value_field().is_none() {
            return Err(ValidationError::UnsupportedChartAggregation {
                message: format!(
                    "{} aggregation on a {} chart requires a value field",
                    self.aggregation, self.chart_type
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("Bar".parse::<ChartType>().unwrap(), ChartType::Bar);
        assert_eq!("avg".parse::<Aggregation>().unwrap(), Aggregation::Average);

        let err = "scatter".parse::<ChartType>().unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedChartAggregation { .. }));
        let err = "median".parse::<Aggregation>().unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedChartAggregation { .. }));
    }

    #[test]
    fn test_sum_requires_value_field() {
        let err = VisualizationConfig::parse(
            "Totals",
            "bar",
            vec!["ledger".to_string()],
            "category",
            Some("  "),
            Some("sum"),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedChartAggregation { .. }));

        let config = VisualizationConfig::parse(
            "Totals",
            "pie",
            vec!["ledger".to_string()],
            "category",
            Some("amount"),
            Some("sum"),
        )
        .unwrap();
        assert_eq!(config.value_field(), Some("amount"));
    }

    #[test]
    fn test_aggregation_defaults_to_count() {
        let config =
            VisualizationConfig::parse("Counts", "line", vec!["ledger".to_string()], "category", None, None)
                .unwrap();
        assert_eq!(config.aggregation, Aggregation::Count);
        assert_eq!(config.y_field, None);
    }
}
