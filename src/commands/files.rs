//! Commands that move the collection to and from files.

use crate::commands::{open_ledger, Out};
use crate::import::{self, CsvFormat};
use crate::ledger::ImportSummary;
use crate::{Config, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::info;

/// Merges the expenses in the CSV file at `file` into the collection.
pub async fn import(config: Config, file: &Path) -> Result<Out<ImportSummary>> {
    let csv = import::read_csv_file(file).await?;
    let format = csv.format;
    let skipped = csv.skipped_rows;
    let mut ledger = open_ledger(&config, None)?;
    let summary = ledger.import(csv.data)?;

    let mut message = format!(
        "Imported {} new and {} replaced expense(s) from {}",
        summary.added,
        summary.replaced,
        file.display()
    );
    if format == CsvFormat::Plain {
        message.push_str(" (plain CSV)");
    }
    if skipped > 0 {
        message.push_str(&format!(", skipped {skipped} unreadable row(s)"));
    }
    Ok(Out::new(message, summary))
}

pub async fn export(config: Config, file: Option<PathBuf>) -> Result<Out<()>> {
    let mut ledger = open_ledger(&config, file)?;
    let saved = ledger.export_csv().await?;
    Ok(format!("Exported CSV, {saved}").into())
}

pub async fn save(config: Config, file: Option<PathBuf>) -> Result<Out<()>> {
    let mut ledger = open_ledger(&config, file)?;
    let saved = ledger.save_to_file().await.into_result()?;
    Ok(format!("Saved snapshot, {saved}").into())
}

/// Replaces the collection with the contents of a JSON snapshot.
pub async fn open(config: Config, file: Option<PathBuf>) -> Result<Out<usize>> {
    let mut ledger = open_ledger(&config, file)?;
    let count = ledger.load_from_file().await.into_result()?;
    Ok(Out::new(format!("Loaded {count} expense(s)"), count))
}

pub async fn quick_save(config: Config, file: Option<PathBuf>) -> Result<Out<()>> {
    let mut ledger = open_ledger(&config, file)?;
    let saved = ledger.quick_save().await.into_result()?;
    Ok(format!("Quick save done, {saved}").into())
}

pub async fn backup_csv(config: Config, file: Option<PathBuf>) -> Result<Out<()>> {
    let mut ledger = open_ledger(&config, file)?;
    let saved = ledger.save_backup_csv().await.into_result()?;
    Ok(format!("Saved backup CSV, {saved}").into())
}

/// Starts auto-save to `file` and keeps it running until `shutdown` completes, then writes the
/// file one last time. Every write reads the store, so changes made by other commands while
/// watching are picked up.
pub async fn watch<F>(config: Config, file: &Path, shutdown: F) -> Result<Out<()>>
where
    F: Future<Output = ()>,
{
    let mut ledger = open_ledger(&config, Some(file.to_path_buf()))?;
    ledger.start_auto_save_from_store().await.into_result()?;
    info!(
        "Watching, saving every {}s until interrupted",
        config.auto_save_period().as_secs()
    );

    shutdown.await;

    ledger.reload();
    let saved = ledger.quick_save().await.into_result();
    ledger.stop_auto_save();
    ledger.flush().await;
    let saved = saved?;
    Ok(format!("Stopped watching, {saved}").into())
}
