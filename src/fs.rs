//! Blocking filesystem helpers for the synchronous key-value store.

use anyhow::{Context, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;

pub(crate) fn create_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).context(format!("Unable to create directory {}", path.display()))
}

/// Writes `data` next to `path` and renames it into place, so a reader never sees a partially
/// written value.
pub(crate) fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)
            .context(format!("Unable to create file {}", tmp.display()))?;
        f.write_all(data)
            .context(format!("Unable to write data to {}", tmp.display()))?;
        f.sync_all()
            .context(format!("Unable to flush data to {}", tmp.display()))?;
    }
    std::fs::rename(&tmp, path).context(format!(
        "Unable to move {} to {}",
        tmp.display(),
        path.display()
    ))
}

/// Reads a file to a `String`, returning `None` if it does not exist.
pub(crate) fn read_optional(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context(format!("Unable to read file {}", path.display())),
    }
}

/// Removes a file. A file that does not exist is not an error.
pub(crate) fn remove_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(format!("Unable to remove file {}", path.display())),
    }
}
