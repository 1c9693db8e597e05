use crate::error::{DabbleError, Result};
use crate::registry::{databases_path, entries_path, find_database, load_entries, DatabaseDocument, EntryDocument};
use crate::schema::{coerce, Entry, EntryValues};
use crate::store::{DocumentStore, Page, PageRequest};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Entries of every database, one document per database.
///
/// Writes hold the account's database document lock while the entry document
/// is updated, so a concurrent schema change cannot interleave with them.
pub struct EntryStore {
    store: Arc<DocumentStore>,
    default_per_page: usize,
    max_per_page: usize,
}

impl EntryStore {
    pub fn new(store: Arc<DocumentStore>, default_per_page: usize, max_per_page: usize) -> Self {
        Self {
            store,
            default_per_page,
            max_per_page,
        }
    }

    /// Newest first
    pub fn list_entries(&self, account: &str, slug: &str, request: PageRequest) -> Result<Page<Entry>> {
        let mut entries = self.entries_for(account, slug)?;
        entries.reverse();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Page::paginate(entries, request, self.default_per_page, self.max_per_page))
    }

    /// Every entry of a database, in insertion order
    pub fn entries_for(&self, account: &str, slug: &str) -> Result<Vec<Entry>> {
        let databases: DatabaseDocument = self.store.load(&databases_path(account))?;
        let db = find_database(&databases, slug)?;
        load_entries(&self.store, account, &db.id)
    }

    pub fn get_entry(&self, account: &str, slug: &str, entry_id: &str) -> Result<Entry> {
        self.entries_for(account, slug)?
            .into_iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| DabbleError::EntryNotFound {
                entry_id: entry_id.to_string(),
            })
    }

    /// Validate `raw` against the current schema and store it
    pub fn create_entry(&self, account: &str, slug: &str, raw: &EntryValues) -> Result<Entry> {
        let id = self.store.next_id(slug);

        self.store
            .read_locked(&databases_path(account), |databases: &DatabaseDocument| {
                let db = find_database(databases, slug)?;
                let values = coerce(&db.schema, raw)?;
                let entry = Entry::new(id, &db.id, db.schema.version, values);

                self.store
                    .update(&entries_path(account, &db.id), |entries: &mut EntryDocument| {
                        entries.push(entry.clone());
                        Ok(())
                    })?;

                info!("Created entry {} in database '{}'", entry.id, slug);
                Ok(entry)
            })
    }

    /// Replace an entry's values; they are validated against the current schema
    pub fn update_entry(&self, account: &str, slug: &str, entry_id: &str, raw: &EntryValues) -> Result<Entry> {
        self.store
            .read_locked(&databases_path(account), |databases: &DatabaseDocument| {
                let db = find_database(databases, slug)?;
                let values = coerce(&db.schema, raw)?;

                self.store
                    .update(&entries_path(account, &db.id), |entries: &mut EntryDocument| {
                        let entry = entries
                            .iter_mut()
                            .find(|e| e.id == entry_id)
                            .ok_or_else(|| DabbleError::EntryNotFound {
                                entry_id: entry_id.to_string(),
                            })?;

                        entry.values = values;
                        entry.schema_version = db.schema.version;
                        entry.updated_at = Utc::now();

                        debug!("Updated entry {} in database '{}'", entry_id, slug);
                        Ok(entry.clone())
                    })
            })
    }

    pub fn delete_entry(&self, account: &str, slug: &str, entry_id: &str) -> Result<Entry> {
        self.store
            .read_locked(&databases_path(account), |databases: &DatabaseDocument| {
                let db = find_database(databases, slug)?;

                self.store
                    .update(&entries_path(account, &db.id), |entries: &mut EntryDocument| {
                        let index = entries
                            .iter()
                            .position(|e| e.id == entry_id)
                            .ok_or_else(|| DabbleError::EntryNotFound {
                                entry_id: entry_id.to_string(),
                            })?;

                        info!("Deleted entry {} from database '{}'", entry_id, slug);
                        Ok(entries.remove(index))
                    })
            })
    }
}
