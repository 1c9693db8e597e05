//! Saved chart configurations and the chart data computed from them

use crate::error::{DabbleError, Result};
use crate::registry::{
    check_length, databases_path, find_database, load_entries, visualizations_path, DatabaseDocument,
    VisualizationDocument,
};
use crate::schema::{Entry, MAX_NAME_LENGTH};
use crate::store::DocumentStore;
use crate::visualization::{
    aggregate, check_source_fields, collect_labels, Aggregation, ChartDataSeries, ChartType, SourceData,
    VisualizationConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub id: String,
    #[serde(flatten)]
    pub config: VisualizationConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visualization {
    pub fn reads_database(&self, slug: &str) -> bool {
        self.config.database_slugs.iter().any(|s| s == slug)
    }

    /// Whether the chart groups by or sums `field` of database `slug`
    pub fn uses_field(&self, slug: &str, field: &str) -> bool {
        self.reads_database(slug)
            && (self.config.x_field == field || self.config.value_field() == Some(field))
    }
}

/// A rename that saved visualizations must follow
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReferenceChange {
    Database { from: String, to: String },
    Field { slug: String, from: String, to: String },
}

impl ReferenceChange {
    /// Rewrite matching references; returns the number of visualizations changed
    pub(crate) fn apply(&self, visualizations: &mut [Visualization]) -> usize {
        let mut changed = 0;

        for visualization in visualizations.iter_mut() {
            let touched = match self {
                ReferenceChange::Database { from, to } => {
                    let mut touched = false;
                    for slug in visualization.config.database_slugs.iter_mut() {
                        if slug == from {
                            *slug = to.clone();
                            touched = true;
                        }
                    }
                    touched
                }
                ReferenceChange::Field { slug, from, to } => {
                    if visualization.uses_field(slug, from) {
                        let config = &mut visualization.config;
                        if config.x_field == *from {
                            config.x_field = to.clone();
                        }
                        if config.y_field.as_deref() == Some(from.as_str()) {
                            config.y_field = Some(to.clone());
                        }
                        true
                    } else {
                        false
                    }
                }
            };

            if touched {
                visualization.updated_at = Utc::now();
                changed += 1;
            }
        }

        changed
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisualizationUpdate {
    pub title: Option<String>,
    pub chart_type: Option<ChartType>,
    pub database_slugs: Option<Vec<String>>,
    pub x_field: Option<String>,
    /// `Some("")` removes the value field
    pub y_field: Option<String>,
    pub aggregation: Option<Aggregation>,
}

impl VisualizationUpdate {
    fn apply_to(self, config: &mut VisualizationConfig) {
        if let Some(title) = self.title {
            config.title = title.trim().to_string();
        }
        if let Some(chart_type) = self.chart_type {
            config.chart_type = chart_type;
        }
        if let Some(slugs) = self.database_slugs {
            config.database_slugs = slugs;
        }
        if let Some(x_field) = self.x_field {
            config.x_field = x_field.trim().to_string();
        }
        if let Some(y_field) = self.y_field {
            let y_field = y_field.trim();
            config.y_field = (!y_field.is_empty()).then(|| y_field.to_string());
        }
        if let Some(aggregation) = self.aggregation {
            config.aggregation = aggregation;
        }
    }
}

/// Series of every source plus the chart parameters they were computed with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<ChartDataSeries>,
    pub chart_type: ChartType,
    pub x_field: String,
    pub y_field: Option<String>,
    pub aggregation: Aggregation,
}

pub struct VisualizationStore {
    store: Arc<DocumentStore>,
}

impl VisualizationStore {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Newest first
    pub fn list_visualizations(&self, account: &str) -> Result<Vec<Visualization>> {
        let mut visualizations: VisualizationDocument = self.store.load(&visualizations_path(account))?;
        visualizations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visualizations)
    }

    pub fn get_visualization(&self, account: &str, id: &str) -> Result<Visualization> {
        let visualizations: VisualizationDocument = self.store.load(&visualizations_path(account))?;
        visualizations
            .into_iter()
            .find(|v| v.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub fn create_visualization(&self, account: &str, config: VisualizationConfig) -> Result<Visualization> {
        let id = self.store.next_id(account);

        self.store
            .read_locked(&databases_path(account), |databases: &DatabaseDocument| {
                validate(databases, &config)?;
                self.store
                    .update(&visualizations_path(account), |visualizations: &mut VisualizationDocument| {
                        let now = Utc::now();
                        let visualization = Visualization {
                            id,
                            config,
                            created_at: now,
                            updated_at: now,
                        };
                        visualizations.push(visualization.clone());

                        info!(
                            "Created visualization '{}' ({}) for account '{}'",
                            visualization.config.title, visualization.id, account
                        );
                        Ok(visualization)
                    })
            })
    }

    pub fn update_visualization(
        &self,
        account: &str,
        id: &str,
        update: VisualizationUpdate,
    ) -> Result<Visualization> {
        self.store
            .read_locked(&databases_path(account), |databases: &DatabaseDocument| {
                self.store
                    .update(&visualizations_path(account), |visualizations: &mut VisualizationDocument| {
                        let visualization = visualizations
                            .iter_mut()
                            .find(|v| v.id == id)
                            .ok_or_else(|| not_found(id))?;

                        let mut config = visualization.config.clone();
                        update.apply_to(&mut config);
                        validate(databases, &config)?;

                        visualization.config = config;
                        visualization.updated_at = Utc::now();

                        info!("Updated visualization {} for account '{}'", id, account);
                        Ok(visualization.clone())
                    })
            })
    }

    pub fn delete_visualization(&self, account: &str, id: &str) -> Result<Visualization> {
        self.store
            .update(&visualizations_path(account), |visualizations: &mut VisualizationDocument| {
                let index = visualizations
                    .iter()
                    .position(|v| v.id == id)
                    .ok_or_else(|| not_found(id))?;

                info!("Deleted visualization {} for account '{}'", id, account);
                Ok(visualizations.remove(index))
            })
    }

    /// Chart data of a saved visualization; deleted source databases are skipped
    pub fn chart_data(&self, account: &str, id: &str) -> Result<ChartData> {
        let visualization = self.get_visualization(account, id)?;
        self.compute(account, &visualization.config, true)
    }

    /// Chart data of an unsaved configuration; every source database must exist
    pub fn ad_hoc_chart_data(&self, account: &str, config: &VisualizationConfig) -> Result<ChartData> {
        check_sources_present(config)?;
        self.compute(account, config, false)
    }

    fn compute(&self, account: &str, config: &VisualizationConfig, skip_missing: bool) -> Result<ChartData> {
        let databases: DatabaseDocument = self.store.load(&databases_path(account))?;

        let mut loaded = Vec::with_capacity(config.database_slugs.len());
        for slug in &config.database_slugs {
            match find_database(&databases, slug) {
                Ok(db) => {
                    let entries: Vec<Entry> = load_entries(&self.store, account, &db.id)?;
                    loaded.push((db, entries));
                }
                Err(_) if skip_missing => debug!("Skipping deleted source database '{}'", slug),
                Err(e) => return Err(e),
            }
        }

        let sources: Vec<SourceData<'_>> = loaded
            .iter()
            .map(|(db, entries)| SourceData {
                schema: &db.schema,
                entries: entries.as_slice(),
            })
            .collect();
        let series = aggregate(config, &sources)?;

        Ok(ChartData {
            labels: collect_labels(&series),
            series,
            chart_type: config.chart_type,
            x_field: config.x_field.clone(),
            y_field: config.value_field().map(str::to_string),
            aggregation: config.aggregation,
        })
    }
}

fn validate(databases: &DatabaseDocument, config: &VisualizationConfig) -> Result<()> {
    check_length("Title", &config.title, 1, MAX_NAME_LENGTH)?;
    check_sources_present(config)?;
    config.check_aggregation()?;

    for slug in &config.database_slugs {
        let db = find_database(databases, slug)?;
        check_source_fields(config, &db.schema)?;
    }
    Ok(())
}

fn check_sources_present(config: &VisualizationConfig) -> Result<()> {
    if config.database_slugs.is_empty() {
        return Err(DabbleError::InvalidRequest {
            message: "At least one database is required".to_string(),
        });
    }
    Ok(())
}

fn not_found(id: &str) -> DabbleError {
    DabbleError::VisualizationNotFound {
        visualization_id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::registry::{DatabaseRegistry, DatabaseUpdate, EntryStore, FieldUpdate, NewField};
    use crate::schema::FieldType;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        registry: DatabaseRegistry,
        entries: EntryStore,
        visualizations: VisualizationStore,
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::new(dir.path()));
        let fixture = Fixture {
            registry: DatabaseRegistry::new(store.clone()),
            entries: EntryStore::new(store.clone(), 20, 100),
            visualizations: VisualizationStore::new(store),
            _dir: dir,
        };

        fixture.registry.create_database("acme", "Ledger", None).unwrap();
        fixture
            .registry
            .add_field("acme", "ledger", NewField::new("category", FieldType::String))
            .unwrap();
        fixture
            .registry
            .add_field("acme", "ledger", NewField::new("amount", FieldType::Decimal))
            .unwrap();

        for (category, amount) in [("A", 10), ("B", 5), ("A", 3)] {
            let values = json!({"category": category, "amount": amount});
            fixture
                .entries
                .create_entry("acme", "ledger", values.as_object().unwrap())
                .unwrap();
        }
        fixture
    }

    fn sum_config(slugs: &[&str]) -> VisualizationConfig {
        VisualizationConfig::parse(
            "Totals",
            "bar",
            slugs.iter().map(|s| s.to_string()).collect(),
            "category",
            Some("amount"),
            Some("sum"),
        )
        .unwrap()
    }

    #[test]
    fn test_visualization_crud() {
        let f = setup();

        let created = f
            .visualizations
            .create_visualization("acme", sum_config(&["ledger"]))
            .unwrap();
        assert_eq!(f.visualizations.list_visualizations("acme").unwrap().len(), 1);

        let updated = f
            .visualizations
            .update_visualization(
                "acme",
                &created.id,
                VisualizationUpdate {
                    chart_type: Some(ChartType::Pie),
                    aggregation: Some(Aggregation::Count),
                    y_field: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.config.chart_type, ChartType::Pie);
        assert_eq!(updated.config.y_field, None);

        f.visualizations.delete_visualization("acme", &created.id).unwrap();
        assert!(matches!(
            f.visualizations.get_visualization("acme", &created.id).unwrap_err(),
            DabbleError::VisualizationNotFound { .. }
        ));
    }

    #[test]
    fn test_create_validates_sources() {
        let f = setup();

        let err = f
            .visualizations
            .create_visualization("acme", sum_config(&["missing"]))
            .unwrap_err();
        assert!(matches!(err, DabbleError::DatabaseNotFound { .. }));

        let err = f
            .visualizations
            .create_visualization("acme", sum_config(&[]))
            .unwrap_err();
        assert!(matches!(err, DabbleError::InvalidRequest { .. }));

        let mut config = sum_config(&["ledger"]);
        config.x_field = "colour".to_string();
        let err = f.visualizations.create_visualization("acme", config).unwrap_err();
        assert!(matches!(
            err,
            DabbleError::Validation(ValidationError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_saved_chart_data() {
        let f = setup();
        let visualization = f
            .visualizations
            .create_visualization("acme", sum_config(&["ledger"]))
            .unwrap();

        let data = f.visualizations.chart_data("acme", &visualization.id).unwrap();
        assert_eq!(data.labels, vec!["A", "B"]);
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.series[0].source_schema_title, "Ledger");
        let values: Vec<f64> = data.series[0].data.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![13.0, 5.0]);
        assert_eq!(data.y_field.as_deref(), Some("amount"));
    }

    #[test]
    fn test_deleted_source_is_skipped_for_saved_charts() {
        let f = setup();
        let visualization = f
            .visualizations
            .create_visualization("acme", sum_config(&["ledger"]))
            .unwrap();

        f.registry.delete_database("acme", "ledger").unwrap();

        let data = f.visualizations.chart_data("acme", &visualization.id).unwrap();
        assert!(data.series.is_empty());
        assert!(data.labels.is_empty());

        let err = f
            .visualizations
            .ad_hoc_chart_data("acme", &sum_config(&["ledger"]))
            .unwrap_err();
        assert!(matches!(err, DabbleError::DatabaseNotFound { .. }));
    }

    #[test]
    fn test_ad_hoc_chart_data_counts() {
        let f = setup();
        let config =
            VisualizationConfig::parse("Counts", "line", vec!["ledger".to_string()], "category", None, None)
                .unwrap();

        let data = f.visualizations.ad_hoc_chart_data("acme", &config).unwrap();
        let values: Vec<f64> = data.series[0].data.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 1.0]);
        assert_eq!(data.aggregation, Aggregation::Count);
    }

    fn field_id(f: &Fixture, name: &str) -> String {
        f.registry
            .list_fields("acme", "ledger")
            .unwrap()
            .into_iter()
            .find(|field| field.name == name)
            .unwrap()
            .id
    }

    #[test]
    fn test_saved_chart_follows_database_rename() {
        let f = setup();
        let visualization = f
            .visualizations
            .create_visualization("acme", sum_config(&["ledger"]))
            .unwrap();

        f.registry
            .update_database(
                "acme",
                "ledger",
                DatabaseUpdate {
                    title: Some("Ledger 2024".to_string()),
                    description: None,
                },
            )
            .unwrap();

        let saved = f.visualizations.get_visualization("acme", &visualization.id).unwrap();
        assert_eq!(saved.config.database_slugs, vec!["ledger-2024"]);

        let data = f.visualizations.chart_data("acme", &visualization.id).unwrap();
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.series[0].database_slug, "ledger-2024");
        let values: Vec<f64> = data.series[0].data.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![13.0, 5.0]);
    }

    #[test]
    fn test_saved_chart_follows_field_rename() {
        let f = setup();
        let visualization = f
            .visualizations
            .create_visualization("acme", sum_config(&["ledger"]))
            .unwrap();

        f.registry
            .update_field(
                "acme",
                "ledger",
                &field_id(&f, "category"),
                FieldUpdate {
                    name: Some("kind".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        f.registry
            .update_field(
                "acme",
                "ledger",
                &field_id(&f, "amount"),
                FieldUpdate {
                    name: Some("total".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let saved = f.visualizations.get_visualization("acme", &visualization.id).unwrap();
        assert_eq!(saved.config.x_field, "kind");
        assert_eq!(saved.config.y_field.as_deref(), Some("total"));

        let data = f.visualizations.chart_data("acme", &visualization.id).unwrap();
        assert_eq!(data.labels, vec!["A", "B"]);
        let values: Vec<f64> = data.series[0].data.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![13.0, 5.0]);
    }

    #[test]
    fn test_field_rename_refused_for_chart_over_several_databases() {
        let f = setup();
        f.registry.create_database("acme", "Budget", None).unwrap();
        f.registry
            .add_field("acme", "budget", NewField::new("category", FieldType::String))
            .unwrap();
        f.registry
            .add_field("acme", "budget", NewField::new("amount", FieldType::Decimal))
            .unwrap();
        f.visualizations
            .create_visualization("acme", sum_config(&["ledger", "budget"]))
            .unwrap();

        let err = f
            .registry
            .update_field(
                "acme",
                "ledger",
                &field_id(&f, "category"),
                FieldUpdate {
                    name: Some("kind".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        match err {
            DabbleError::FieldInUse { name, visualizations } => {
                assert_eq!(name, "category");
                assert_eq!(visualizations, vec!["Totals"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(f
            .registry
            .list_fields("acme", "ledger")
            .unwrap()
            .iter()
            .any(|field| field.name == "category"));
    }

    #[test]
    fn test_field_delete_refused_while_charted() {
        let f = setup();
        let visualization = f
            .visualizations
            .create_visualization("acme", sum_config(&["ledger"]))
            .unwrap();
        let amount = field_id(&f, "amount");

        let err = f.registry.delete_field("acme", "ledger", &amount).unwrap_err();
        assert!(matches!(err, DabbleError::FieldInUse { .. }));
        let data = f.visualizations.chart_data("acme", &visualization.id).unwrap();
        assert_eq!(data.series[0].data.len(), 2);

        f.visualizations.delete_visualization("acme", &visualization.id).unwrap();
        let removed = f.registry.delete_field("acme", "ledger", &amount).unwrap();
        assert_eq!(removed.name, "amount");
    }

    #[test]
    fn test_rename_leaves_other_databases_charts_alone() {
        let f = setup();
        f.registry.create_database("acme", "Budget", None).unwrap();
        f.registry
            .add_field("acme", "budget", NewField::new("category", FieldType::String))
            .unwrap();
        let other = f
            .visualizations
            .create_visualization(
                "acme",
                VisualizationConfig::parse("Budget", "pie", vec!["budget".to_string()], "category", None, None)
                    .unwrap(),
            )
            .unwrap();

        f.registry
            .update_field(
                "acme",
                "ledger",
                &field_id(&f, "category"),
                FieldUpdate {
                    name: Some("kind".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let saved = f.visualizations.get_visualization("acme", &other.id).unwrap();
        assert_eq!(saved.config.x_field, "category");
        assert_eq!(saved.updated_at, other.updated_at);
    }
}
