mod aggregate;
mod config;

pub use aggregate::{aggregate, check_source_fields, collect_labels, ChartDataSeries, ChartPoint, SourceData, UNKNOWN_LABEL};
pub use config::{Aggregation, ChartType, VisualizationConfig};
