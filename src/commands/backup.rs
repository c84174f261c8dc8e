use crate::backup::{BackupInfo, BackupStore};
use crate::commands::{open_ledger, Out};
use crate::error::ErrorType;
use crate::{Config, Error, Result};

/// Describes the CSV backup kept in the store.
pub async fn backup_info(config: Config) -> Result<Out<Option<BackupInfo>>> {
    let ledger = open_ledger(&config, None)?;
    let info = ledger.backup_info();
    let message = match &info {
        None => "There is no CSV backup".to_string(),
        Some(info) => format!(
            "The CSV backup holds {} expense(s) in {} bytes, written at {}",
            info.expense_count,
            info.size_bytes,
            info.timestamp.as_deref().unwrap_or("an unknown time")
        ),
    };
    Ok(Out::new(message, info))
}

/// Deletes the CSV backup and leaves the primary store alone.
pub async fn backup_clear(config: Config) -> Result<Out<()>> {
    BackupStore::new(config.open_store()?).clear()?;
    Ok("Cleared the CSV backup".into())
}

/// Deletes every expense and custom category along with the CSV backup. `yes` must be set.
pub async fn clear(config: Config, yes: bool) -> Result<Out<()>> {
    if !yes {
        return Err(Error::msg(
            ErrorType::Request,
            "This deletes all expenses and the CSV backup, pass --yes to confirm",
        ));
    }
    let mut ledger = open_ledger(&config, None)?;
    ledger.clear_all()?;
    Ok("Cleared all data".into())
}
