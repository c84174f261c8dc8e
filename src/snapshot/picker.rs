use crate::snapshot::{DownloadPicker, FileKind};
use crate::utils;
use anyhow::{bail, Context, Result};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// A writable reference to a file the user picked. It can be written any number of times; each
/// write replaces the whole file.
#[async_trait::async_trait]
pub trait FileHandle: Debug + Send + Sync {
    /// A name for the file suitable for messages.
    fn name(&self) -> String;

    async fn write(&self, contents: &str) -> Result<()>;
}

/// A file the user picked to open.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OpenedFile {
    pub name: String,
    pub contents: String,
}

/// The host's file dialogs.
///
/// `pick_save` and `pick_open` return `Ok(None)` when the user dismisses the dialog. They are
/// only called when `is_supported` is true. `download` is the fallback used otherwise.
#[async_trait::async_trait]
pub trait FilePicker: Debug + Send + Sync {
    fn is_supported(&self) -> bool;

    async fn pick_save(
        &self,
        suggested_name: &str,
        kind: FileKind,
    ) -> Result<Option<Arc<dyn FileHandle>>>;

    async fn pick_open(&self, kind: FileKind) -> Result<Option<OpenedFile>>;

    /// Writes a new file without asking where, returning where it went.
    async fn download(&self, suggested_name: &str, contents: &str) -> Result<PathBuf>;
}

/// A `FileHandle` for a path on the local filesystem.
#[derive(Debug, Clone)]
pub struct PathHandle {
    path: PathBuf,
}

impl PathHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl FileHandle for PathHandle {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn write(&self, contents: &str) -> Result<()> {
        utils::write(&self.path, contents).await
    }
}

/// Asks for file paths on the terminal. An empty answer cancels.
///
/// When constructed with a preset path, that path is used without asking. This is how the
/// `--file` flag of the CLI works.
#[derive(Debug, Clone)]
pub struct PromptPicker {
    preset: Option<PathBuf>,
    downloads: DownloadPicker,
}

impl PromptPicker {
    pub fn new(preset: Option<PathBuf>, downloads: DownloadPicker) -> Self {
        Self { preset, downloads }
    }

    async fn ask(&self, question: &str) -> Result<Option<PathBuf>> {
        if let Some(preset) = &self.preset {
            debug!("Using preset path {}", preset.display());
            return Ok(Some(preset.clone()));
        }
        eprint!("{question} (leave empty to cancel): ");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let answer = lines
            .next_line()
            .await
            .context("Unable to read from the terminal")?
            .unwrap_or_default();
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(answer)))
    }
}

#[async_trait::async_trait]
impl FilePicker for PromptPicker {
    fn is_supported(&self) -> bool {
        true
    }

    async fn pick_save(
        &self,
        suggested_name: &str,
        kind: FileKind,
    ) -> Result<Option<Arc<dyn FileHandle>>> {
        let Some(path) = self
            .ask(&format!("Save {kind} file as, e.g. {suggested_name}"))
            .await?
        else {
            return Ok(None);
        };
        let path = with_extension(path, kind);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            utils::make_dir(parent).await?;
        }
        Ok(Some(Arc::new(PathHandle::new(path))))
    }

    async fn pick_open(&self, kind: FileKind) -> Result<Option<OpenedFile>> {
        let Some(path) = self.ask(&format!("Open {kind} file")).await? else {
            return Ok(None);
        };
        if !has_extension(&path, kind) {
            bail!(
                "Please select a {} file, got {}",
                kind.extension().to_uppercase(),
                path.display()
            );
        }
        let contents = utils::read(&path).await?;
        Ok(Some(OpenedFile {
            name: path.display().to_string(),
            contents,
        }))
    }

    async fn download(&self, suggested_name: &str, contents: &str) -> Result<PathBuf> {
        self.downloads.write_new(suggested_name, contents).await
    }
}

pub(crate) fn has_extension(path: &Path, kind: FileKind) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(kind.extension()))
        .unwrap_or(false)
}

/// Adds the extension for `kind` when the path has none.
fn with_extension(path: PathBuf, kind: FileKind) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(kind.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picker(preset: &Path, downloads: &Path) -> PromptPicker {
        PromptPicker::new(Some(preset.to_path_buf()), DownloadPicker::new(downloads))
    }

    #[tokio::test]
    async fn test_preset_save_handle_overwrites() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let target = tempdir.path().join("nested").join("data");
        let picker = picker(&target, tempdir.path());
        let handle = picker
            .pick_save("expense_tracker_data.json", FileKind::Json)
            .await
            .unwrap()
            .unwrap();
        handle.write("first").await.unwrap();
        handle.write("second").await.unwrap();
        let written = std::fs::read_to_string(target.with_extension("json")).unwrap();
        assert_eq!(written, "second");
        assert!(handle.name().ends_with("data.json"));
    }

    #[tokio::test]
    async fn test_preset_open() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let source = tempdir.path().join("data.json");
        std::fs::write(&source, "{}").unwrap();
        let opened = picker(&source, tempdir.path())
            .pick_open(FileKind::Json)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(opened.contents, "{}");
    }

    #[tokio::test]
    async fn test_open_wrong_extension() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let source = tempdir.path().join("data.txt");
        std::fs::write(&source, "{}").unwrap();
        let err = picker(&source, tempdir.path())
            .pick_open(FileKind::Json)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Please select a JSON file"));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a/b.CSV"), FileKind::Csv));
        assert!(!has_extension(Path::new("a/b.csv.txt"), FileKind::Csv));
        assert!(!has_extension(Path::new("a/b"), FileKind::Json));
    }
}
