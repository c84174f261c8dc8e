//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::backup::BackupStore;
use crate::kv::{KvStore, MemoryStore};
use crate::model::{Amount, Expense};
use crate::snapshot::{FileHandle, FileKind, FilePicker, FileSnapshots, OpenedFile};
use crate::{Config, Ledger};
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;

/// An expense in the first default category, dated 2024-01-15.
pub(crate) fn sample_expense(id: &str, description: &str, amount: &str) -> Expense {
    Expense {
        id: id.to_string(),
        description: description.to_string(),
        amount: Amount::from_str(amount).unwrap(),
        category: "🍔 Food & Dining".to_string(),
        date: "2024-01-15".to_string(),
        timestamp: "2024-01-15T09:30:00.000Z".to_string(),
        notes: String::new(),
    }
}

/// Test environment that sets up an expense home directory with a Config.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub(crate) struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    pub(crate) async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::create(temp_dir.path().join("expenses"))
            .await
            .unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    pub(crate) fn config(&self) -> Config {
        self.config.clone()
    }
}

/// The pieces of an in-memory ledger, kept so tests can look behind the ledger's back.
pub(crate) struct MemoryLedger {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) picker: Arc<MemoryPicker>,
    pub(crate) ledger: Ledger,
}

impl MemoryLedger {
    /// An uninitialized ledger over an empty store and a supported picker.
    pub(crate) fn new() -> Self {
        Self::with(Arc::new(MemoryStore::new()), Arc::new(MemoryPicker::new()))
    }

    pub(crate) fn with(store: Arc<MemoryStore>, picker: Arc<MemoryPicker>) -> Self {
        let ledger = Ledger::new(
            store.clone(),
            BackupStore::new(store.clone()),
            Arc::new(FileSnapshots::new(picker.clone())),
        );
        Self {
            store,
            picker,
            ledger,
        }
    }
}

/// A `KvStore` whose every operation fails.
#[derive(Debug, Default)]
pub(crate) struct FailingStore;

impl KvStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        bail!("Unable to read '{key}': the store is unavailable")
    }

    fn set(&self, key: &str, _value: &str) -> Result<()> {
        bail!("Unable to write '{key}': quota exceeded")
    }

    fn remove(&self, key: &str) -> Result<()> {
        bail!("Unable to remove '{key}': the store is unavailable")
    }
}

/// What a `MemoryPicker` has been asked to do, and how it should answer.
#[derive(Debug, Default)]
pub(crate) struct PickerState {
    /// Dismiss every dialog.
    pub(crate) cancel: bool,
    /// Fail every write through a picked handle.
    pub(crate) fail_writes: bool,
    /// The contents of the file returned by `pick_open`.
    pub(crate) open_contents: Option<String>,
    pub(crate) save_prompts: usize,
    pub(crate) open_prompts: usize,
    /// Every write to every picked file, by file name.
    pub(crate) files: BTreeMap<String, Vec<String>>,
    /// Every download as (suggested name, contents).
    pub(crate) downloads: Vec<(String, String)>,
}

/// A `FilePicker` that keeps everything in memory. The nth save dialog picks `picked-{n}.{ext}`.
#[derive(Debug)]
pub(crate) struct MemoryPicker {
    supported: bool,
    state: Arc<Mutex<PickerState>>,
}

impl MemoryPicker {
    pub(crate) fn new() -> Self {
        Self {
            supported: true,
            state: Arc::default(),
        }
    }

    pub(crate) fn unsupported() -> Self {
        Self {
            supported: false,
            state: Arc::default(),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, PickerState> {
        lock(&self.state)
    }

    /// The writes made to the file `name`, oldest first.
    pub(crate) fn writes(&self, name: &str) -> Vec<String> {
        self.state().files.get(name).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl FilePicker for MemoryPicker {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn pick_save(
        &self,
        _suggested_name: &str,
        kind: FileKind,
    ) -> Result<Option<Arc<dyn FileHandle>>> {
        let mut state = self.state();
        state.save_prompts += 1;
        if state.cancel {
            return Ok(None);
        }
        let name = format!("picked-{}.{}", state.save_prompts, kind.extension());
        Ok(Some(Arc::new(MemoryHandle {
            name,
            state: self.state.clone(),
        })))
    }

    async fn pick_open(&self, _kind: FileKind) -> Result<Option<OpenedFile>> {
        let mut state = self.state();
        state.open_prompts += 1;
        if state.cancel {
            return Ok(None);
        }
        match &state.open_contents {
            Some(contents) => Ok(Some(OpenedFile {
                name: "opened.json".to_string(),
                contents: contents.clone(),
            })),
            None => bail!("There is no file to open"),
        }
    }

    async fn download(&self, suggested_name: &str, contents: &str) -> Result<PathBuf> {
        let mut state = self.state();
        state
            .downloads
            .push((suggested_name.to_string(), contents.to_string()));
        Ok(PathBuf::from("downloads").join(suggested_name))
    }
}

#[derive(Debug)]
struct MemoryHandle {
    name: String,
    state: Arc<Mutex<PickerState>>,
}

#[async_trait::async_trait]
impl FileHandle for MemoryHandle {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn write(&self, contents: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            bail!("Unable to write {}: permission revoked", self.name);
        }
        state
            .files
            .entry(self.name.clone())
            .or_default()
            .push(contents.to_string());
        Ok(())
    }
}

fn lock(state: &Mutex<PickerState>) -> MutexGuard<'_, PickerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
