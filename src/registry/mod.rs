//! Schema Registry and Entry Store
//!
//! Manages per-account databases (schemas), their entries and saved
//! visualizations on top of the document store.
//!
//! Lock order when more than one document is involved:
//! `databases.json` first, then `entries/{database_id}.json`, then
//! `visualizations.json`.
//!
//! An entries document is only ever written while the account's
//! `databases.json` lock is held. Schema changes rely on this: they write the
//! schema first and the entries they rewrite right after, under that one lock.

mod databases;
mod entries;
mod visualizations;

pub use databases::{DatabaseRecord, DatabaseRegistry, DatabaseUpdate, FieldUpdate, NewField};
pub use entries::EntryStore;
pub use visualizations::{ChartData, Visualization, VisualizationStore, VisualizationUpdate};
pub(crate) use visualizations::ReferenceChange;

use crate::error::{DabbleError, Result};
use crate::schema::Entry;
use crate::store::DocumentStore;
use std::path::PathBuf;

pub const MAX_ACCOUNT_LENGTH: usize = 64;

pub(crate) type DatabaseDocument = Vec<DatabaseRecord>;
pub(crate) type EntryDocument = Vec<Entry>;
pub(crate) type VisualizationDocument = Vec<Visualization>;

pub(crate) fn databases_path(account: &str) -> PathBuf {
    PathBuf::from(account).join("databases.json")
}

pub(crate) fn entries_path(account: &str, database_id: &str) -> PathBuf {
    PathBuf::from(account)
        .join("entries")
        .join(format!("{}.json", database_id))
}

pub(crate) fn visualizations_path(account: &str) -> PathBuf {
    PathBuf::from(account).join("visualizations.json")
}

/// Account ids name directories, so only `[A-Za-z0-9_-]` is allowed
pub fn validate_account(account: &str) -> Result<()> {
    if account.is_empty()
        || account.len() > MAX_ACCOUNT_LENGTH
        || !account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DabbleError::Unauthorized {
            message: format!("Invalid account id: '{}'", account),
        });
    }
    Ok(())
}

pub(crate) fn find_database<'a>(databases: &'a [DatabaseRecord], slug: &str) -> Result<&'a DatabaseRecord> {
    databases
        .iter()
        .find(|db| db.schema.slug == slug)
        .ok_or_else(|| DabbleError::DatabaseNotFound {
            slug: slug.to_string(),
        })
}

pub(crate) fn find_database_mut<'a>(
    databases: &'a mut [DatabaseRecord],
    slug: &str,
) -> Result<&'a mut DatabaseRecord> {
    databases
        .iter_mut()
        .find(|db| db.schema.slug == slug)
        .ok_or_else(|| DabbleError::DatabaseNotFound {
            slug: slug.to_string(),
        })
}

pub(crate) fn load_entries(store: &DocumentStore, account: &str, database_id: &str) -> Result<EntryDocument> {
    store.load(&entries_path(account, database_id))
}

pub(crate) fn check_length(what: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DabbleError::InvalidRequest {
            message: if min > 0 {
                format!("{} must be between {} and {} characters", what, min, max)
            } else {
                format!("{} must be at most {} characters", what, max)
            },
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account() {
        assert!(validate_account("user_42").is_ok());
        assert!(validate_account("acme-corp").is_ok());

        assert!(validate_account("").is_err());
        assert!(validate_account("../etc").is_err());
        assert!(validate_account("a b").is_err());
        assert!(validate_account(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_document_paths() {
        assert_eq!(databases_path("acme"), PathBuf::from("acme/databases.json"));
        assert_eq!(entries_path("acme", "abc"), PathBuf::from("acme/entries/abc.json"));
        assert_eq!(
            visualizations_path("acme"),
            PathBuf::from("acme/visualizations.json")
        );
    }

    #[test]
    fn test_check_length() {
        assert!(check_length("Title", "Books", 1, 120).is_ok());
        assert!(check_length("Title", "", 1, 120).is_err());
        assert!(check_length("Description", &"d".repeat(501), 0, 500).is_err());
    }
}
