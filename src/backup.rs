//! The backup store: a single-slot CSV shadow copy of the expense collection.
//!
//! Every successful write to the primary store is followed by a `save` here. At startup the
//! backup is the preferred recovery source because it is written by the same code path as CSV
//! exports and can be read by a person.

use crate::codec;
use crate::error::{ErrorType, IntoResult};
use crate::kv::KvStore;
use crate::model::{now_iso, Categories, Expense};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// The key holding the CSV text.
pub const CSV_KEY: &str = "expense-tracker-csv-backup";

/// The key holding the instant the CSV text was written.
pub const TIMESTAMP_KEY: &str = "expense-tracker-csv-timestamp";

/// A decoded backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub expenses: Vec<Expense>,
    pub categories: Categories,
    /// `None` when the timestamp slot was missing.
    pub timestamp: Option<String>,
    pub skipped_rows: usize,
}

/// What is known about the stored backup without decoding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub timestamp: Option<String>,
    /// Counted from the raw text, so approximate if the text is corrupt.
    pub expense_count: usize,
    pub size_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    store: Arc<dyn KvStore>,
}

impl BackupStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Encodes and stores the collection, replacing the previous backup. Failures are logged and
    /// otherwise ignored.
    pub fn save(&self, expenses: &[Expense], categories: &Categories) {
        let csv = codec::encode(expenses, categories);
        let result = self
            .store
            .set(CSV_KEY, &csv)
            .and_then(|_| self.store.set(TIMESTAMP_KEY, &now_iso()));
        match result {
            Ok(_) => debug!("Backed up {} expenses ({} bytes)", expenses.len(), csv.len()),
            Err(e) => warn!("Unable to write the CSV backup: {e:#}"),
        }
    }

    /// Returns the stored backup, or `None` if there is none. A backup that cannot be decoded at
    /// all is an error of type `Format`.
    pub fn load(&self) -> Result<Option<Backup>> {
        let Some(csv) = self.store.get(CSV_KEY).pub_result(ErrorType::Storage)? else {
            debug!("No CSV backup found");
            return Ok(None);
        };
        let timestamp = self.store.get(TIMESTAMP_KEY).pub_result(ErrorType::Storage)?;
        let decoded = codec::decode(&csv).pub_result(ErrorType::Format)?;
        debug!(
            "Loaded {} expenses from the CSV backup written at {}",
            decoded.expenses.len(),
            timestamp.as_deref().unwrap_or("an unknown time")
        );
        Ok(Some(Backup {
            expenses: decoded.expenses,
            categories: decoded.categories,
            timestamp,
            skipped_rows: decoded.skipped_rows,
        }))
    }

    /// Describes the stored backup, or returns `None` if there is none or it cannot be read.
    pub fn info(&self) -> Option<BackupInfo> {
        let csv = match self.store.get(CSV_KEY) {
            Ok(csv) => csv?,
            Err(e) => {
                warn!("Unable to read the CSV backup: {e:#}");
                return None;
            }
        };
        let timestamp = self.store.get(TIMESTAMP_KEY).ok().flatten();
        Some(BackupInfo {
            timestamp,
            expense_count: codec::count_rows(&csv),
            size_bytes: csv.len(),
        })
    }

    /// Removes the backup and its timestamp.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(CSV_KEY).pub_result(ErrorType::Storage)?;
        self.store
            .remove(TIMESTAMP_KEY)
            .pub_result(ErrorType::Storage)
    }
}
