//! The `Ledger` owns the expense collection and decides how it reaches durable storage.
//!
//! There are three storage tiers. The primary key-value store is the system of record and is
//! written first. The CSV backup is written second and is the preferred source at startup. When
//! auto-save is active, a JSON snapshot is also written to the user's file by a background task.
//!
//! Nothing is written until `initialize` has run, and nothing is written while the collection is
//! still the untouched default of a fresh installation. This keeps a fresh start from wiping an
//! existing backup.

use crate::backup::{BackupInfo, BackupStore};
use crate::error::{Error, ErrorType, IntoResult};
use crate::kv::KvStore;
use crate::model::{Categories, Expense, ExpenseData, ExpenseUpdate, NewExpense};
use crate::snapshot::{
    write_snapshot, FileHandle, FileOutcome, FileSnapshots, Saved, SnapshotError,
};
use crate::Result;
use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The primary-store key holding the expenses as JSON.
pub const EXPENSES_KEY: &str = "expenses";

/// The primary-store key holding the categories as JSON.
pub const CATEGORIES_KEY: &str = "categories";

/// Where `initialize` found the collection.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// The CSV backup held at least one expense.
    Backup,
    /// The primary store held expenses or categories.
    Primary,
    /// Nothing was stored; the built-in defaults are in use.
    Defaults,
}

serde_plain::derive_display_from_serialize!(LoadSource);

/// What an `import` changed.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
    pub new_categories: usize,
}

/// Collects the failures of background file saves. They are logged and otherwise only kept for
/// inspection.
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl FailureLog {
    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("Background file save failed: {message}");
        self.lock().push(message);
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The persistence orchestrator.
#[derive(Debug)]
pub struct Ledger {
    data: Arc<RwLock<ExpenseData>>,
    primary: Arc<dyn KvStore>,
    backup: BackupStore,
    files: Arc<FileSnapshots>,
    loaded_from: Option<LoadSource>,
    /// Set by the first mutation so that later writes happen even if the collection returns to
    /// the default state.
    dirty: bool,
    error: Option<String>,
    background: Vec<JoinHandle<()>>,
    failures: FailureLog,
}

impl Ledger {
    pub fn new(primary: Arc<dyn KvStore>, backup: BackupStore, files: Arc<FileSnapshots>) -> Self {
        Self {
            data: Arc::default(),
            primary,
            backup,
            files,
            loaded_from: None,
            dirty: false,
            error: None,
            background: Vec::new(),
            failures: FailureLog::default(),
        }
    }

    /// Reconstructs the collection from storage. The CSV backup wins when it holds any expenses,
    /// otherwise the primary store is read. Problems are recorded in `error` and never stop
    /// initialization from completing. Calling this again returns the first result.
    pub fn initialize(&mut self) -> LoadSource {
        if let Some(source) = self.loaded_from {
            return source;
        }
        let source = self.load();
        info!("Loaded {} expenses from {source}", self.read().expenses.len());
        self.loaded_from = Some(source);
        source
    }

    pub fn is_initialized(&self) -> bool {
        self.loaded_from.is_some()
    }

    /// A read guard on the collection.
    pub fn data(&self) -> RwLockReadGuard<'_, ExpenseData> {
        self.read()
    }

    /// The last load or save problem, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn files(&self) -> &FileSnapshots {
        &self.files
    }

    pub fn add_expense(&mut self, expense: NewExpense) -> Result<Expense> {
        expense
            .validate(&self.read().categories)
            .pub_result(ErrorType::Request)?;
        let expense = expense.into_expense();
        self.write().expenses.push(expense.clone());
        debug!("Added expense {}", expense.id);
        self.mutated()?;
        Ok(expense)
    }

    /// Changes every field of an expense except its id and timestamp.
    pub fn edit_expense(&mut self, id: &str, update: ExpenseUpdate) -> Result<Expense> {
        update
            .validate(&self.read().categories)
            .pub_result(ErrorType::Request)?;
        let edited = {
            let mut data = self.write();
            let expense = data
                .expenses
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| not_found(id))?;
            expense.apply(update);
            expense.clone()
        };
        self.mutated()?;
        Ok(edited)
    }

    pub fn delete_expense(&mut self, id: &str) -> Result<Expense> {
        let removed = {
            let mut data = self.write();
            let ix = data
                .expenses
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| not_found(id))?;
            data.expenses.remove(ix)
        };
        self.mutated()?;
        Ok(removed)
    }

    /// Appends a category. Returns false if it already existed.
    pub fn add_category(&mut self, name: &str) -> Result<bool> {
        let added = self
            .write()
            .categories
            .insert(name)
            .pub_result(ErrorType::Request)?;
        if added {
            self.mutated()?;
        }
        Ok(added)
    }

    /// Removes a category even while expenses still refer to it. Returns how many expenses were
    /// left pointing at the removed category.
    pub fn remove_category(&mut self, name: &str) -> Result<usize> {
        let orphaned = {
            let mut data = self.write();
            if !data.categories.remove(name) {
                return Err(Error::msg(
                    ErrorType::NotFound,
                    format!("There is no category named '{name}'"),
                ));
            }
            data.expenses.iter().filter(|e| e.category == name).count()
        };
        if orphaned > 0 {
            warn!("Removed category '{name}' is still used by {orphaned} expense(s)");
        }
        self.mutated()?;
        Ok(orphaned)
    }

    /// Merges `incoming` by id: an expense whose id already exists replaces it in place, others
    /// are appended. New categories are appended.
    pub fn import(&mut self, incoming: ExpenseData) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        {
            let mut data = self.write();
            for expense in incoming.expenses {
                match data.expenses.iter_mut().find(|e| e.id == expense.id) {
                    Some(existing) => {
                        *existing = expense;
                        summary.replaced += 1;
                    }
                    None => {
                        data.expenses.push(expense);
                        summary.added += 1;
                    }
                }
            }
            summary.new_categories = data.categories.merge(&incoming.categories);
        }
        info!(
            "Imported {} new and {} replaced expenses, {} new categories",
            summary.added, summary.replaced, summary.new_categories
        );
        self.mutated()?;
        Ok(summary)
    }

    /// Resets to the defaults and deletes the primary keys and the CSV backup.
    pub fn clear_all(&mut self) -> Result<()> {
        self.primary
            .remove(EXPENSES_KEY)
            .and_then(|_| self.primary.remove(CATEGORIES_KEY))
            .pub_result(ErrorType::Storage)?;
        self.backup.clear()?;
        *self.write() = ExpenseData::default();
        self.dirty = false;
        self.error = None;
        info!("Cleared all data");
        Ok(())
    }

    /// Writes the collection to the primary store, then the CSV backup, then (in the background)
    /// to the auto-save file. Does nothing before `initialize` or while the collection is the
    /// untouched default. Only a primary-store failure is returned.
    pub fn persist(&mut self) -> Result<()> {
        if !self.is_initialized() {
            debug!("Not persisting, the ledger is not initialized");
            return Ok(());
        }
        let data = self.read().clone();
        if !self.dirty && data.is_untouched_default() {
            debug!("Not persisting the untouched default collection");
            return Ok(());
        }

        if let Err(e) = self.write_primary(&data) {
            self.error = Some(format!("Failed to save data: {e:#}"));
            return Err(e).pub_result(ErrorType::Storage);
        }
        self.error = None;
        self.backup.save(&data.expenses, &data.categories);
        if let Some(handle) = self.files.auto_save_handle() {
            self.spawn_snapshot_write(handle, data);
        }
        Ok(())
    }

    pub fn backup_info(&self) -> Option<BackupInfo> {
        self.backup.info()
    }

    /// Asks for a destination and writes a JSON snapshot to it.
    pub async fn save_to_file(&mut self) -> FileOutcome<Saved> {
        let data = self.read().clone();
        let outcome = self.files.save_as(&data.expenses, &data.categories).await;
        self.note(&outcome);
        outcome
    }

    /// Replaces the collection with the contents of a JSON snapshot the user picks. Returns the
    /// number of expenses loaded.
    pub async fn load_from_file(&mut self) -> FileOutcome<usize> {
        let loaded = match self.files.load_from().await {
            FileOutcome::Done(loaded) => loaded,
            FileOutcome::Cancelled => return FileOutcome::Cancelled,
            FileOutcome::Failed(e) => {
                self.error = Some(e.to_string());
                return FileOutcome::Failed(e);
            }
        };
        let count = loaded.expenses.len();
        {
            let mut data = self.write();
            data.expenses = loaded.expenses;
            if !loaded.categories.is_empty() {
                data.categories = loaded.categories;
            }
        }
        match self.mutated() {
            Ok(()) => FileOutcome::Done(count),
            Err(e) => FileOutcome::Failed(SnapshotError::Storage(e.to_string())),
        }
    }

    pub async fn quick_save(&mut self) -> FileOutcome<Saved> {
        let data = self.read().clone();
        let outcome = self.files.quick_save(&data.expenses, &data.categories).await;
        self.note(&outcome);
        outcome
    }

    pub async fn save_backup_csv(&mut self) -> FileOutcome<Saved> {
        let data = self.read().clone();
        let outcome = self
            .files
            .save_backup_csv(&data.expenses, &data.categories)
            .await;
        self.note(&outcome);
        outcome
    }

    /// Writes the CSV export document. An empty collection is not exported.
    pub async fn export_csv(&mut self) -> Result<Saved> {
        let data = self.read().clone();
        if data.expenses.is_empty() {
            return Err(Error::msg(
                ErrorType::Request,
                "There are no expenses to export",
            ));
        }
        let outcome = self.files.export_csv(&data.expenses, &data.categories).await;
        self.note(&outcome);
        outcome.into_result()
    }

    /// Starts auto-save. The timer reads the live collection on every tick.
    pub async fn start_auto_save(&self) -> FileOutcome<()> {
        let data = self.data.clone();
        self.files
            .start_auto_save(move || read_lock(&data).clone())
            .await
    }

    /// Starts auto-save reading storage on every tick instead of this ledger's collection, so
    /// changes written by other ledgers over the same store reach the file.
    pub async fn start_auto_save_from_store(&self) -> FileOutcome<()> {
        self.files.start_auto_save(self.stored()).await
    }

    /// Replaces the collection with what storage holds now.
    pub fn reload(&mut self) {
        let data = self.stored()();
        *self.write() = data;
    }

    pub fn stop_auto_save(&self) -> bool {
        self.files.stop_auto_save()
    }

    pub fn is_auto_save_active(&self) -> bool {
        self.files.is_auto_save_active()
    }

    /// Waits for every background save started so far.
    pub async fn flush(&mut self) {
        for task in self.background.drain(..) {
            if let Err(e) = task.await {
                self.failures.record(format!("The save task did not finish: {e}"));
            }
        }
    }

    /// Messages from background saves that failed.
    pub fn background_failures(&self) -> Vec<String> {
        self.failures.messages()
    }

    fn load(&mut self) -> LoadSource {
        match self.backup.load() {
            Ok(Some(backup)) if !backup.expenses.is_empty() => {
                debug!(
                    "Using the CSV backup with {} expenses",
                    backup.expenses.len()
                );
                let mut data = self.write();
                data.expenses = backup.expenses;
                if !backup.categories.is_empty() {
                    data.categories = backup.categories;
                }
                return LoadSource::Backup;
            }
            Ok(_) => debug!("The CSV backup is missing or empty, reading the primary store"),
            Err(e) => {
                warn!("Unable to load the CSV backup: {e}");
                self.error = Some(format!("Failed to load the CSV backup: {e}"));
            }
        }

        let mut source = LoadSource::Defaults;
        match self.read_primary::<Vec<Expense>>(EXPENSES_KEY) {
            Ok(Some(expenses)) => {
                self.write().expenses = expenses;
                source = LoadSource::Primary;
            }
            Ok(None) => {}
            Err(e) => self.load_failed(e),
        }
        let categories = self
            .read_primary::<Vec<String>>(CATEGORIES_KEY)
            .and_then(|names| names.map(Categories::try_from_names).transpose());
        match categories {
            Ok(Some(categories)) => {
                self.write().categories = categories;
                source = LoadSource::Primary;
            }
            Ok(None) => {}
            Err(e) => self.load_failed(e.context("The stored categories are not valid")),
        }
        source
    }

    /// Reads the collection back from storage with the same cascade as `initialize`.
    fn stored(&self) -> impl Fn() -> ExpenseData + Send + Sync + 'static {
        let primary = self.primary.clone();
        let backup = self.backup.clone();
        let files = self.files.clone();
        move || {
            let mut fresh = Ledger::new(primary.clone(), backup.clone(), files.clone());
            fresh.load();
            let data = fresh.read().clone();
            data
        }
    }

    fn load_failed(&mut self, e: anyhow::Error) {
        warn!("Failed to load saved data: {e:#}");
        self.error = Some(format!("Failed to load saved data: {e:#}"));
    }

    fn read_primary<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(json) = self.primary.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&json)
            .with_context(|| format!("The stored '{key}' entry is not valid"))?;
        Ok(Some(value))
    }

    fn write_primary(&self, data: &ExpenseData) -> anyhow::Result<()> {
        let expenses =
            serde_json::to_string(&data.expenses).context("Unable to serialize expenses")?;
        let categories =
            serde_json::to_string(&data.categories).context("Unable to serialize categories")?;
        self.primary.set(EXPENSES_KEY, &expenses)?;
        self.primary.set(CATEGORIES_KEY, &categories)?;
        Ok(())
    }

    /// Writes to the auto-save file held right now. The task never asks for a file, so stopping
    /// auto-save before it runs cannot lead to a prompt.
    fn spawn_snapshot_write(&mut self, handle: Arc<dyn FileHandle>, data: ExpenseData) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, skipping the auto-save file write");
            return;
        };
        let failures = self.failures.clone();
        self.background.retain(|task| !task.is_finished());
        self.background.push(runtime.spawn(async move {
            match write_snapshot(handle.as_ref(), &data.expenses, &data.categories).await {
                FileOutcome::Done(saved) => debug!("Background save {saved}"),
                FileOutcome::Cancelled => failures.record("the save was cancelled"),
                FileOutcome::Failed(e) => failures.record(e.to_string()),
            }
        }));
    }

    fn mutated(&mut self) -> Result<()> {
        self.dirty = true;
        self.persist()
    }

    /// Records the result of a user-initiated file operation in `error`.
    fn note<T>(&mut self, outcome: &FileOutcome<T>) {
        match outcome {
            FileOutcome::Done(_) => self.error = None,
            FileOutcome::Cancelled => {}
            FileOutcome::Failed(e) => self.error = Some(e.to_string()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ExpenseData> {
        read_lock(&self.data)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ExpenseData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_lock(data: &RwLock<ExpenseData>) -> RwLockReadGuard<'_, ExpenseData> {
    data.read().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(id: &str) -> Error {
    Error::msg(ErrorType::NotFound, format!("There is no expense with id '{id}'"))
}
