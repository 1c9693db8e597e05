//! Database Registry
//!
//! Per-account databases and their ordered field definitions.
//! Every change to a field list bumps the schema version; entries touched by
//! the change are re-stamped with the new version. Renames carry over to the
//! entries and to saved visualizations.

use crate::error::{DabbleError, Result};
use crate::registry::{
    check_length, databases_path, entries_path, find_database, find_database_mut, load_entries,
    visualizations_path, DatabaseDocument, EntryDocument, ReferenceChange, Visualization,
    VisualizationDocument,
};
use crate::schema::{
    analyze_type_change, apply_type_change, coerce_field, convert_value, slugify, FieldDefinition,
    FieldType, Schema, TypeChangeAnalysis, CREATED_AT_FIELD, MAX_NAME_LENGTH, UPDATED_AT_FIELD,
};
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_DESCRIPTION_LENGTH: usize = 500;

/// A user-defined database: its schema plus bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub id: String,
    pub owner: String,
    #[serde(flatten)]
    pub schema: Schema,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewField {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub default_value: Option<Value>,
    pub order: i64,
}

impl NewField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            default_value: None,
            order: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldUpdate {
    pub name: Option<String>,
    pub field_type: Option<FieldType>,
    pub required: Option<bool>,
    /// `Some(Value::Null)` clears the default
    pub default_value: Option<Value>,
    pub order: Option<i64>,
    /// Allow a type change that clears values which cannot be converted
    pub confirm_data_loss: bool,
}

pub struct DatabaseRegistry {
    store: Arc<DocumentStore>,
}

impl DatabaseRegistry {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    // === Databases ===

    /// Newest first
    pub fn list_databases(&self, account: &str) -> Result<Vec<DatabaseRecord>> {
        let mut databases: DatabaseDocument = self.store.load(&databases_path(account))?;
        databases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(databases)
    }

    pub fn get_database(&self, account: &str, slug: &str) -> Result<DatabaseRecord> {
        let databases: DatabaseDocument = self.store.load(&databases_path(account))?;
        find_database(&databases, slug).cloned()
    }

    pub fn create_database(
        &self,
        account: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<DatabaseRecord> {
        let title = title.trim();
        check_length("Title", title, 1, MAX_NAME_LENGTH)?;
        let description = description.unwrap_or_default().to_string();
        check_length("Description", &description, 0, MAX_DESCRIPTION_LENGTH)?;

        let slug = title_slug(title)?;
        let id = self.store.next_id(account);

        self.store
            .update(&databases_path(account), |databases: &mut DatabaseDocument| {
                if databases.iter().any(|db| db.schema.slug == slug) {
                    return Err(DabbleError::DatabaseAlreadyExists { slug: slug.clone() });
                }

                let now = Utc::now();
                let record = DatabaseRecord {
                    id,
                    owner: account.to_string(),
                    schema: Schema::new(title),
                    description,
                    created_at: now,
                    updated_at: now,
                };
                databases.push(record.clone());

                info!("Created database '{}' ({}) for account '{}'", slug, record.id, account);
                Ok(record)
            })
    }

    /// Change title and/or description; a new title moves the slug.
    ///
    /// Saved visualizations follow the slug.
    pub fn update_database(&self, account: &str, slug: &str, update: DatabaseUpdate) -> Result<DatabaseRecord> {
        let title = update.title.as_deref().map(str::trim);
        if let Some(title) = title {
            check_length("Title", title, 1, MAX_NAME_LENGTH)?;
        }
        if let Some(description) = &update.description {
            check_length("Description", description, 0, MAX_DESCRIPTION_LENGTH)?;
        }

        self.change_schema(account, |databases: &mut DatabaseDocument| {
            find_database(databases, slug)?;

            let new_slug = title.map(title_slug).transpose()?;
            if let Some(new_slug) = new_slug.as_deref().filter(|s| *s != slug) {
                if databases.iter().any(|db| db.schema.slug == new_slug) {
                    return Err(DabbleError::DatabaseAlreadyExists {
                        slug: new_slug.to_string(),
                    });
                }
            }

            let mut followup = Followup::default();
            let db = find_database_mut(databases, slug)?;
            if let (Some(title), Some(new_slug)) = (title, new_slug) {
                if new_slug != slug {
                    followup.references = Some(ReferenceChange::Database {
                        from: slug.to_string(),
                        to: new_slug.clone(),
                    });
                }
                db.schema.title = title.to_string();
                db.schema.slug = new_slug;
            }
            if let Some(description) = &update.description {
                db.description = description.clone();
            }
            db.updated_at = Utc::now();

            info!("Updated database '{}' -> '{}' for account '{}'", slug, db.schema.slug, account);
            Ok((db.clone(), followup))
        })
    }

    /// Delete a database together with all of its entries
    pub fn delete_database(&self, account: &str, slug: &str) -> Result<DatabaseRecord> {
        self.change_schema(account, |databases: &mut DatabaseDocument| {
            let index = databases
                .iter()
                .position(|db| db.schema.slug == slug)
                .ok_or_else(|| DabbleError::DatabaseNotFound {
                    slug: slug.to_string(),
                })?;

            let removed = databases.remove(index);
            let followup = Followup {
                removed_entries: Some(entries_path(account, &removed.id)),
                ..Default::default()
            };

            info!("Deleted database '{}' ({}) for account '{}'", slug, removed.id, account);
            Ok((removed, followup))
        })
    }

    // === Fields ===

    pub fn list_fields(&self, account: &str, slug: &str) -> Result<Vec<FieldDefinition>> {
        Ok(self.get_database(account, slug)?.schema.fields)
    }

    pub fn get_field(&self, account: &str, slug: &str, field_id: &str) -> Result<FieldDefinition> {
        self.get_database(account, slug)?
            .schema
            .field_by_id(field_id)
            .cloned()
            .ok_or_else(|| DabbleError::FieldNotFound {
                field_id: field_id.to_string(),
            })
    }

    /// Add a field; existing entries receive its default (or null).
    ///
    /// A required field needs a default once the database has entries.
    pub fn add_field(&self, account: &str, slug: &str, new_field: NewField) -> Result<FieldDefinition> {
        let name = new_field.name.trim().to_string();
        validate_field_name(&name)?;
        let default_value = coerce_default(new_field.field_type, &name, new_field.default_value.as_ref())?;
        let field_id = self.store.next_id(slug);

        self.change_schema(account, |databases: &mut DatabaseDocument| {
            let db = find_database_mut(databases, slug)?;
            if db.schema.has_field(&name) {
                return Err(DabbleError::FieldAlreadyExists { name: name.clone() });
            }

            let mut field = FieldDefinition::new(field_id, &name, new_field.field_type)
                .required(new_field.required)
                .with_order(new_field.order);
            field.default_value = default_value;

            let path = entries_path(account, &db.id);
            let mut entries: EntryDocument = self.store.load(&path)?;
            if field.required && field.effective_default().is_none() && !entries.is_empty() {
                return Err(DabbleError::InvalidRequest {
                    message: format!(
                        "Required field '{}' needs a default_value while the database has entries",
                        name
                    ),
                });
            }

            let backfill = field.effective_default().cloned().unwrap_or(Value::Null);
            db.schema.fields.push(field.clone());
            let version = db.schema.bump_version();
            db.updated_at = Utc::now();

            for entry in entries.iter_mut() {
                entry
                    .values
                    .entry(name.clone())
                    .or_insert_with(|| backfill.clone());
                entry.schema_version = version;
            }

            info!(
                "Added field '{}' ({}) to database '{}', schema version {}",
                name,
                field.field_type.code(),
                slug,
                version
            );
            Ok((field, Followup::entries(path, entries)))
        })
    }

    /// Update a field definition.
    ///
    /// A rename moves the stored values to the new key and the saved
    /// visualizations of this database to the new name. A type change converts
    /// stored values and is refused when some of them would be lost, unless
    /// `confirm_data_loss` is set; values that cannot be converted are cleared.
    pub fn update_field(
        &self,
        account: &str,
        slug: &str,
        field_id: &str,
        update: FieldUpdate,
    ) -> Result<FieldDefinition> {
        let requested_name = update.name.as_deref().map(str::trim);
        if let Some(name) = requested_name {
            validate_field_name(name)?;
        }

        self.change_schema(account, |databases: &mut DatabaseDocument| {
            let db = find_database_mut(databases, slug)?;
            let index = field_index(&db.schema, field_id)?;
            let current = db.schema.fields[index].clone();

            let new_name = requested_name.filter(|name| *name != current.name);
            if let Some(name) = new_name {
                if db.schema.has_field(name) {
                    return Err(DabbleError::FieldAlreadyExists {
                        name: name.to_string(),
                    });
                }
            }
            let new_type = update.field_type.filter(|t| *t != current.field_type);
            let final_name = new_name.unwrap_or(&current.name).to_string();
            let final_type = new_type.unwrap_or(current.field_type);

            let default_value = match &update.default_value {
                Some(value) => coerce_default(final_type, &final_name, Some(value))?,
                None => match (new_type, &current.default_value) {
                    (Some(to), Some(default)) => convert_value(default, to).filter(|v| !v.is_null()),
                    _ => current.default_value.clone(),
                },
            };

            let mut followup = Followup::default();

            if new_name.is_some() {
                // A chart over several databases reads the same name from each
                let shared: Vec<String> = self
                    .field_users(account, slug, &current.name)?
                    .into_iter()
                    .filter(|v| v.config.database_slugs.len() > 1)
                    .map(|v| v.config.title)
                    .collect();
                if !shared.is_empty() {
                    return Err(DabbleError::FieldInUse {
                        name: current.name.clone(),
                        visualizations: shared,
                    });
                }
                followup.references = Some(ReferenceChange::Field {
                    slug: slug.to_string(),
                    from: current.name.clone(),
                    to: final_name.clone(),
                });
            }

            let next_version = db.schema.version + 1;

            if new_name.is_some() || new_type.is_some() {
                let path = entries_path(account, &db.id);
                let mut entries: EntryDocument = self.store.load(&path)?;

                if let Some(to) = new_type {
                    let analysis = analyze_type_change(&entries, &current.name, current.field_type, to);
                    if analysis.will_lose_data > 0 && !update.confirm_data_loss {
                        return Err(DabbleError::DataLossNotConfirmed {
                            field: current.name.clone(),
                            affected: analysis.will_lose_data,
                            analysis: serde_json::to_value(&analysis)?,
                        });
                    }
                }

                if new_name.is_some() {
                    for entry in entries.iter_mut() {
                        if let Some(value) = entry.values.remove(&current.name) {
                            entry.values.insert(final_name.clone(), value);
                            entry.touch();
                        }
                    }
                }

                if let Some(to) = new_type {
                    let cleared = apply_type_change(&mut entries, &final_name, to);
                    if cleared > 0 {
                        warn!(
                            "Type change of '{}' in database '{}' cleared {} values",
                            final_name, slug, cleared
                        );
                    }
                }

                for entry in entries.iter_mut() {
                    entry.schema_version = next_version;
                }
                followup.entries = Some((path, entries));
            }

            let field = &mut db.schema.fields[index];
            field.name = final_name;
            field.field_type = final_type;
            field.default_value = default_value;
            if let Some(required) = update.required {
                field.required = required;
            }
            if let Some(order) = update.order {
                field.order = order;
            }
            field.updated_at = Utc::now();
            let updated = field.clone();

            let version = db.schema.bump_version();
            db.updated_at = Utc::now();

            info!(
                "Updated field '{}' in database '{}', schema version {}",
                updated.name, slug, version
            );
            Ok((updated, followup))
        })
    }

    /// Delete a field and drop its values from every entry.
    ///
    /// Refused while a saved visualization reads the field.
    pub fn delete_field(&self, account: &str, slug: &str, field_id: &str) -> Result<FieldDefinition> {
        self.change_schema(account, |databases: &mut DatabaseDocument| {
            let db = find_database_mut(databases, slug)?;
            let index = field_index(&db.schema, field_id)?;

            let name = db.schema.fields[index].name.clone();
            let users: Vec<String> = self
                .field_users(account, slug, &name)?
                .into_iter()
                .map(|v| v.config.title)
                .collect();
            if !users.is_empty() {
                return Err(DabbleError::FieldInUse {
                    name,
                    visualizations: users,
                });
            }

            let removed = db.schema.fields.remove(index);
            let version = db.schema.bump_version();
            db.updated_at = Utc::now();

            let path = entries_path(account, &db.id);
            let mut entries: EntryDocument = self.store.load(&path)?;
            for entry in entries.iter_mut() {
                entry.values.remove(&removed.name);
                entry.schema_version = version;
            }

            info!(
                "Deleted field '{}' from database '{}', schema version {}",
                removed.name, slug, version
            );
            Ok((removed, Followup::entries(path, entries)))
        })
    }

    /// Give the listed fields orders 0, 1, 2, ... in list order
    pub fn reorder_fields(&self, account: &str, slug: &str, field_ids: &[String]) -> Result<Vec<FieldDefinition>> {
        if field_ids.is_empty() {
            return Err(DabbleError::InvalidRequest {
                message: "field_ids is required".to_string(),
            });
        }

        self.store
            .update(&databases_path(account), |databases: &mut DatabaseDocument| {
                let db = find_database_mut(databases, slug)?;

                for (position, field_id) in field_ids.iter().enumerate() {
                    let field = db
                        .schema
                        .fields
                        .iter_mut()
                        .find(|f| &f.id == field_id)
                        .ok_or_else(|| DabbleError::FieldNotFound {
                            field_id: field_id.clone(),
                        })?;
                    field.order = position as i64;
                    field.updated_at = Utc::now();
                }

                let version = db.schema.bump_version();
                db.updated_at = Utc::now();

                info!(
                    "Reordered {} fields in database '{}', schema version {}",
                    field_ids.len(),
                    slug,
                    version
                );
                Ok(db.schema.fields.clone())
            })
    }

    /// Report what changing a field's type would do to the stored entries
    pub fn preview_type_change(
        &self,
        account: &str,
        slug: &str,
        field_id: &str,
        to_type: FieldType,
    ) -> Result<TypeChangeAnalysis> {
        let db = self.get_database(account, slug)?;
        let field = db
            .schema
            .field_by_id(field_id)
            .ok_or_else(|| DabbleError::FieldNotFound {
                field_id: field_id.to_string(),
            })?;

        let entries = load_entries(&self.store, account, &db.id)?;
        Ok(analyze_type_change(&entries, &field.name, field.field_type, to_type))
    }

    /// Apply `f` to the account's databases document, then write what it
    /// staged in the returned [`Followup`] while still holding the lock
    fn change_schema<R, F>(&self, account: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut DatabaseDocument) -> Result<(R, Followup)>,
    {
        let (result, _) = self.store.update_then(
            &databases_path(account),
            f,
            |staged: &mut (R, Followup)| self.write_followup(account, &mut staged.1),
        )?;
        Ok(result)
    }

    fn write_followup(&self, account: &str, followup: &mut Followup) -> Result<()> {
        if let Some((path, entries)) = followup.entries.take() {
            self.store.save(&path, &entries)?;
        }
        if let Some(path) = followup.removed_entries.take() {
            self.store.remove(&path)?;
        }
        if let Some(change) = followup.references.take() {
            let changed = self
                .store
                .update(&visualizations_path(account), |visualizations: &mut VisualizationDocument| {
                    Ok(change.apply(visualizations))
                })?;
            if changed > 0 {
                info!("Rewrote {} visualizations for account '{}': {:?}", changed, account, change);
            }
        }
        Ok(())
    }

    /// Saved visualizations reading `field` of database `slug`
    fn field_users(&self, account: &str, slug: &str, field: &str) -> Result<Vec<Visualization>> {
        let visualizations: VisualizationDocument = self.store.load(&visualizations_path(account))?;
        Ok(visualizations
            .into_iter()
            .filter(|v| v.uses_field(slug, field))
            .collect())
    }
}

/// Writes that follow a saved schema change.
///
/// Entries are staged here rather than saved in place so that the schema
/// reaches disk first; a failed follow-up leaves entries that the next write
/// of each entry brings back in line with the schema.
#[derive(Default)]
struct Followup {
    entries: Option<(PathBuf, EntryDocument)>,
    removed_entries: Option<PathBuf>,
    references: Option<ReferenceChange>,
}

impl Followup {
    fn entries(path: PathBuf, entries: EntryDocument) -> Self {
        Self {
            entries: (!entries.is_empty()).then_some((path, entries)),
            ..Default::default()
        }
    }
}

fn field_index(schema: &Schema, field_id: &str) -> Result<usize> {
    schema
        .fields
        .iter()
        .position(|f| f.id == field_id)
        .ok_or_else(|| DabbleError::FieldNotFound {
            field_id: field_id.to_string(),
        })
}

fn title_slug(title: &str) -> Result<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(DabbleError::InvalidRequest {
            message: format!("Title '{}' must contain at least one letter or digit", title),
        });
    }
    Ok(slug)
}

fn validate_field_name(name: &str) -> Result<()> {
    check_length("Field name", name, 1, MAX_NAME_LENGTH)?;
    if name == CREATED_AT_FIELD || name == UPDATED_AT_FIELD {
        return Err(DabbleError::InvalidRequest {
            message: format!("Field name '{}' is reserved", name),
        });
    }
    Ok(())
}

/// Coerce a default value through the field's own type rule
fn coerce_default(field_type: FieldType, name: &str, default: Option<&Value>) -> Result<Option<Value>> {
    let field = FieldDefinition::new(String::new(), name, field_type);
    let value = coerce_field(&field, default)?;
    Ok(Some(value).filter(|v| !v.is_null()))
}
