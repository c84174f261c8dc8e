use crate::codec::{self, Preamble};
use crate::model::{Categories, Expense, ExpenseData};
use crate::snapshot::{
    FileHandle, FileKind, FileOutcome, FilePicker, Saved, Snapshot, SnapshotError,
    BACKUP_FILE_NAME, CSV_FILE_NAME, DATA_FILE_NAME,
};
use chrono::Utc;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// How often auto-save writes to the retained file.
pub const AUTO_SAVE_PERIOD: Duration = Duration::from_secs(30);

/// Saves and loads snapshots through a `FilePicker` and runs the auto-save loop.
///
/// Auto-save is either absent or holds exactly one file handle and one timer task. Starting it
/// while it is held does nothing, stopping it while it is absent does nothing. Dropping the
/// service stops the timer.
pub struct FileSnapshots {
    picker: Arc<dyn FilePicker>,
    period: Duration,
    /// Serializes `start_auto_save` so two concurrent starts cannot both prompt.
    start_lock: tokio::sync::Mutex<()>,
    auto_save: Mutex<Option<AutoSave>>,
}

struct AutoSave {
    handle: Arc<dyn FileHandle>,
    task: JoinHandle<()>,
}

impl FileSnapshots {
    pub fn new(picker: Arc<dyn FilePicker>) -> Self {
        Self::with_period(picker, AUTO_SAVE_PERIOD)
    }

    pub fn with_period(picker: Arc<dyn FilePicker>, period: Duration) -> Self {
        Self {
            picker,
            period,
            start_lock: tokio::sync::Mutex::new(()),
            auto_save: Mutex::new(None),
        }
    }

    /// True when the picker offers interactive save and open dialogs.
    pub fn is_supported(&self) -> bool {
        self.picker.is_supported()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Asks for a destination and writes a JSON snapshot there. The destination is not
    /// retained. Without file dialogs the snapshot is downloaded instead.
    pub async fn save_as(&self, expenses: &[Expense], categories: &Categories) -> FileOutcome<Saved> {
        let json = match Snapshot::new(expenses, categories).to_json() {
            Ok(json) => json,
            Err(e) => return FileOutcome::Failed(e),
        };
        self.save_text(DATA_FILE_NAME, FileKind::Json, &json).await
    }

    /// Asks for a JSON snapshot file and reads the collection out of it.
    pub async fn load_from(&self) -> FileOutcome<ExpenseData> {
        if !self.picker.is_supported() {
            return FileOutcome::Failed(SnapshotError::NotSupported);
        }
        let opened = match self.picker.pick_open(FileKind::Json).await {
            Ok(Some(opened)) => opened,
            Ok(None) => {
                debug!("Open cancelled");
                return FileOutcome::Cancelled;
            }
            Err(e) => {
                return FileOutcome::Failed(SnapshotError::storage("Unable to open the file", e))
            }
        };
        match Snapshot::parse(&opened.contents) {
            Ok(data) => {
                info!(
                    "Loaded {} expenses from {}",
                    data.expenses().len(),
                    opened.name
                );
                FileOutcome::Done(data)
            }
            Err(e) => FileOutcome::Failed(e),
        }
    }

    /// Writes the backup CSV to a file the user picks, or downloads it.
    pub async fn save_backup_csv(
        &self,
        expenses: &[Expense],
        categories: &Categories,
    ) -> FileOutcome<Saved> {
        let csv = codec::encode_at(expenses, categories, Utc::now(), Preamble::Backup);
        self.save_text(BACKUP_FILE_NAME, FileKind::Csv, &csv).await
    }

    /// Writes the CSV export document to a file the user picks, or downloads it.
    pub async fn export_csv(&self, expenses: &[Expense], categories: &Categories) -> FileOutcome<Saved> {
        let csv = codec::encode(expenses, categories);
        self.save_text(CSV_FILE_NAME, FileKind::Csv, &csv).await
    }

    /// Asks for a destination, retains it and starts writing a JSON snapshot to it every
    /// `period`. `collection` is called on each tick to get the latest data. Ticks that find no
    /// expenses write nothing.
    ///
    /// When auto-save is already active this returns `Done` without asking again.
    pub async fn start_auto_save<F>(&self, collection: F) -> FileOutcome<()>
    where
        F: Fn() -> ExpenseData + Send + Sync + 'static,
    {
        if !self.picker.is_supported() {
            return FileOutcome::Failed(SnapshotError::NotSupported);
        }
        let _guard = self.start_lock.lock().await;
        if self.is_auto_save_active() {
            debug!("Auto-save is already active");
            return FileOutcome::Done(());
        }
        let handle = match self.picker.pick_save(DATA_FILE_NAME, FileKind::Json).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!("Auto-save cancelled");
                return FileOutcome::Cancelled;
            }
            Err(e) => {
                return FileOutcome::Failed(SnapshotError::storage(
                    "Unable to pick a file for auto-save",
                    e,
                ))
            }
        };
        let task = tokio::spawn(auto_save_loop(handle.clone(), self.period, collection));
        info!(
            "Auto-save started, writing to {} every {}s",
            handle.name(),
            self.period.as_secs()
        );
        *self.state() = Some(AutoSave { handle, task });
        FileOutcome::Done(())
    }

    /// Stops the timer and releases the retained file. Returns whether auto-save was active.
    pub fn stop_auto_save(&self) -> bool {
        match self.state().take() {
            Some(auto_save) => {
                auto_save.task.abort();
                info!("Auto-save to {} stopped", auto_save.handle.name());
                true
            }
            None => false,
        }
    }

    pub fn is_auto_save_active(&self) -> bool {
        self.state().is_some()
    }

    /// Writes a JSON snapshot to the retained auto-save file without asking. Without a retained
    /// file this is the same as `save_as`.
    pub async fn quick_save(
        &self,
        expenses: &[Expense],
        categories: &Categories,
    ) -> FileOutcome<Saved> {
        let Some(handle) = self.auto_save_handle() else {
            return self.save_as(expenses, categories).await;
        };
        write_snapshot(handle.as_ref(), expenses, categories).await
    }

    /// The file auto-save writes to, while it is active.
    pub fn auto_save_handle(&self) -> Option<Arc<dyn FileHandle>> {
        self.state().as_ref().map(|a| a.handle.clone())
    }

    async fn save_text(&self, suggested_name: &str, kind: FileKind, contents: &str) -> FileOutcome<Saved> {
        if !self.picker.is_supported() {
            debug!("File dialogs are not available, downloading {suggested_name}");
            return match self.picker.download(suggested_name, contents).await {
                Ok(path) => {
                    info!("Downloaded {suggested_name} to {}", path.display());
                    FileOutcome::Done(Saved::Downloaded(path))
                }
                Err(e) => {
                    FileOutcome::Failed(SnapshotError::storage("Unable to download the file", e))
                }
            };
        }
        let handle = match self.picker.pick_save(suggested_name, kind).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!("Save of {suggested_name} cancelled");
                return FileOutcome::Cancelled;
            }
            Err(e) => {
                return FileOutcome::Failed(SnapshotError::storage("Unable to pick a file", e))
            }
        };
        write(handle.as_ref(), contents).await
    }

    fn state(&self) -> MutexGuard<'_, Option<AutoSave>> {
        self.auto_save
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for FileSnapshots {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSnapshots")
            .field("picker", &self.picker)
            .field("period", &self.period)
            .field("auto_save", &self.is_auto_save_active())
            .finish()
    }
}

impl Drop for FileSnapshots {
    fn drop(&mut self) {
        if let Some(auto_save) = self.state().take() {
            auto_save.task.abort();
        }
    }
}

async fn write(handle: &dyn FileHandle, contents: &str) -> FileOutcome<Saved> {
    match handle.write(contents).await {
        Ok(()) => {
            info!("Saved {}", handle.name());
            FileOutcome::Done(Saved::File(handle.name()))
        }
        Err(e) => FileOutcome::Failed(SnapshotError::storage(
            &format!("Unable to write {}", handle.name()),
            e,
        )),
    }
}

/// Writes a JSON snapshot to `handle` without involving the picker.
pub(crate) async fn write_snapshot(
    handle: &dyn FileHandle,
    expenses: &[Expense],
    categories: &Categories,
) -> FileOutcome<Saved> {
    match Snapshot::new(expenses, categories).to_json() {
        Ok(json) => write(handle, &json).await,
        Err(e) => FileOutcome::Failed(e),
    }
}

async fn auto_save_loop<F>(handle: Arc<dyn FileHandle>, period: Duration, collection: F)
where
    F: Fn() -> ExpenseData,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let data = collection();
        let expenses = data.expenses();
        if expenses.is_empty() {
            debug!("Auto-save skipped, there are no expenses");
            continue;
        }
        let json = match Snapshot::new(expenses, data.categories()).to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Auto-save error: {e}");
                continue;
            }
        };
        match handle.write(&json).await {
            Ok(()) => debug!("Auto-saved {} expenses to {}", expenses.len(), handle.name()),
            Err(e) => error!("Auto-save to {} failed: {e:#}", handle.name()),
        }
    }
}
