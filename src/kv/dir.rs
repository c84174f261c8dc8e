use crate::fs;
use crate::kv::KvStore;
use anyhow::{bail, ensure, Context, Result};
use std::path::{Path, PathBuf};

const LAYOUT_VERSION: &str = "1";

/// A `KvStore` that keeps each key in its own file inside a directory. Values are replaced
/// atomically.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens the store at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let myself = Self {
            root: root.to_path_buf(),
        };
        fs::create_dir_all(&myself.root)?;
        match fs::read_optional(myself.layout())? {
            Some(version) if version.trim() != LAYOUT_VERSION => bail!(
                "Store layout {} is unsupported. Is a newer version of expense available?",
                version.trim()
            ),
            Some(_) => {}
            None => fs::write_atomic(myself.layout(), LAYOUT_VERSION.as_bytes())
                .context("Unable to write store layout file")?,
        }
        Ok(myself)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn layout(&self) -> PathBuf {
        self.root.join(".layout")
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        ensure!(
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "Invalid store key '{key}'"
        );
        Ok(self.root.join(format!("{key}.value")))
    }
}

impl KvStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        fs::read_optional(self.path(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::write_atomic(self.path(key)?, value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        fs::remove_file(self.path(key)?)
    }
}

#[test]
fn dir_store_test() {
    let tempdir = tempfile::TempDir::new().unwrap();
    let store = DirStore::new(tempdir.path().join("store")).unwrap();
    assert!(store.root().is_dir());
    assert_eq!(store.get("expenses").unwrap(), None);
    store.set("expenses", "[]").unwrap();
    assert_eq!(store.get("expenses").unwrap().as_deref(), Some("[]"));
    store.remove("expenses").unwrap();
    assert_eq!(store.get("expenses").unwrap(), None);
}

#[test]
fn dir_store_survives_reopen() {
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().join("store");
    DirStore::new(&root).unwrap().set("k", "🍔 ✓").unwrap();
    let reopened = DirStore::new(&root).unwrap();
    assert_eq!(reopened.get("k").unwrap().as_deref(), Some("🍔 ✓"));
}

#[test]
fn dir_store_rejects_bad_key() {
    let tempdir = tempfile::TempDir::new().unwrap();
    let store = DirStore::new(tempdir.path()).unwrap();
    assert!(store.set("../escape", "x").is_err());
    assert!(store.get("").is_err());
}

#[test]
fn dir_store_bad_layout_version() {
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().join("z");
    fs::create_dir_all(&root).unwrap();
    fs::write_atomic(root.join(".layout"), b"999999").unwrap();
    assert!(DirStore::new(&root).is_err());
}
