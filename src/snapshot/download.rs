use crate::model::today;
use crate::snapshot::{FileHandle, FileKind, FilePicker, OpenedFile};
use crate::utils;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The picker for hosts without file dialogs. Nothing can be picked; every save becomes a new
/// file in the downloads directory.
///
/// Downloaded files are named `{stem}.{YYYY-MM-DD}-{NNN}.{ext}` where `NNN` counts up from `001`
/// for each stem and day, so earlier downloads are never overwritten.
#[derive(Debug, Clone)]
pub struct DownloadPicker {
    dir: PathBuf,
}

impl DownloadPicker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) async fn write_new(&self, suggested_name: &str, contents: &str) -> Result<PathBuf> {
        utils::make_dir(&self.dir).await?;
        let (stem, extension) = split_name(suggested_name);
        let date = today();
        let seq = self.next_sequence_number(stem, &date, extension).await?;
        let filename = if extension.is_empty() {
            format!("{stem}.{date}-{seq:03}")
        } else {
            format!("{stem}.{date}-{seq:03}.{extension}")
        };
        let path = self.dir.join(filename);
        utils::write(&path, contents).await?;
        debug!("Downloaded {suggested_name} to {}", path.display());
        Ok(path)
    }

    /// Scans the downloads directory for files with the given stem and date, and returns the
    /// next sequence number.
    async fn next_sequence_number(&self, stem: &str, date: &str, extension: &str) -> Result<u32> {
        let max_seq = utils::file_names(&self.dir)
            .await?
            .iter()
            .filter_map(|name| parse_sequence_number(name, stem, date, extension))
            .max()
            .unwrap_or(0);
        Ok(max_seq + 1)
    }
}

#[async_trait::async_trait]
impl FilePicker for DownloadPicker {
    fn is_supported(&self) -> bool {
        false
    }

    async fn pick_save(
        &self,
        _suggested_name: &str,
        kind: FileKind,
    ) -> Result<Option<Arc<dyn FileHandle>>> {
        bail!("Unable to pick a {kind} file to save: file dialogs are turned off")
    }

    async fn pick_open(&self, kind: FileKind) -> Result<Option<OpenedFile>> {
        bail!("Unable to pick a {kind} file to open: file dialogs are turned off")
    }

    async fn download(&self, suggested_name: &str, contents: &str) -> Result<PathBuf> {
        self.write_new(suggested_name, contents).await
    }
}

/// Splits `name.ext` into `("name", "ext")`. A name without a dot has an empty extension.
fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, extension),
        _ => (name, ""),
    }
}

/// Parses the sequence number from a downloaded file name.
/// Returns None if the name doesn't match the expected pattern.
fn parse_sequence_number(filename: &str, stem: &str, date: &str, extension: &str) -> Option<u32> {
    let remainder = filename.strip_prefix(&format!("{stem}.{date}-"))?;
    let seq = if extension.is_empty() {
        remainder
    } else {
        remainder.strip_suffix(&format!(".{extension}"))?
    };
    if seq.len() < 3 || !seq.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    seq.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence_number() {
        assert_eq!(
            parse_sequence_number(
                "expense_tracker_data.2025-12-14-001.json",
                "expense_tracker_data",
                "2025-12-14",
                "json"
            ),
            Some(1)
        );
        assert_eq!(
            parse_sequence_number(
                "expense_tracker_data.2025-12-14-042.json",
                "expense_tracker_data",
                "2025-12-14",
                "json"
            ),
            Some(42)
        );
        assert_eq!(
            parse_sequence_number("notes.2025-12-14-003", "notes", "2025-12-14", ""),
            Some(3)
        );
        // Wrong extension
        assert_eq!(
            parse_sequence_number(
                "expense_tracker_data.2025-12-14-001.csv",
                "expense_tracker_data",
                "2025-12-14",
                "json"
            ),
            None
        );
        // Wrong date
        assert_eq!(
            parse_sequence_number(
                "expense_tracker_data.2025-12-13-001.json",
                "expense_tracker_data",
                "2025-12-14",
                "json"
            ),
            None
        );
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.json"), ("a", "json"));
        assert_eq!(split_name("a.b.csv"), ("a.b", "csv"));
        assert_eq!(split_name("plain"), ("plain", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }

    #[tokio::test]
    async fn test_download_never_overwrites() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let picker = DownloadPicker::new(tempdir.path().join("downloads"));
        assert!(!picker.is_supported());

        let first = picker.download("data.json", "one").await.unwrap();
        let second = picker.download("data.json", "two").await.unwrap();
        let other = picker.download("backup.csv", "three").await.unwrap();

        let date = today();
        assert_eq!(
            first.file_name().unwrap().to_string_lossy(),
            format!("data.{date}-001.json")
        );
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            format!("data.{date}-002.json")
        );
        assert_eq!(
            other.file_name().unwrap().to_string_lossy(),
            format!("backup.{date}-001.csv")
        );
        assert_eq!(std::fs::read_to_string(first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "two");
    }

    #[tokio::test]
    async fn test_pick_is_an_error() {
        let picker = DownloadPicker::new("unused");
        assert!(picker.pick_open(FileKind::Json).await.is_err());
        assert!(picker.pick_save("x.json", FileKind::Json).await.is_err());
    }
}
