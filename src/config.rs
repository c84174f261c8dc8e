//! Configuration file handling for the expense tracker.
//!
//! The configuration file is stored at `$EXPENSE_HOME/config.json`. The home directory also
//! holds the key-value store (`store/`) and the default downloads directory (`downloads/`).

use crate::backup::BackupStore;
use crate::error::{ErrorType, IntoResult};
use crate::kv::{DirStore, KvStore};
use crate::ledger::Ledger;
use crate::snapshot::{DownloadPicker, FilePicker, FileSnapshots, PromptPicker};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const APP_NAME: &str = "expense-tracker";
const CONFIG_VERSION: u8 = 1;
const AUTO_SAVE_SECS: u64 = 30;
const CURRENCY: &str = "₹";
const STORE: &str = "store";
const DOWNLOADS: &str = "downloads";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSE_HOME` and from there it loads `$EXPENSE_HOME/config.json`. It provides
/// paths to the other items that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    store: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its subdirectories and an initial `config.json` with default
    /// settings.
    ///
    /// # Errors
    /// - Returns an error if `config.json` already exists or if any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        create_inner(dir.into()).await.pub_result(ErrorType::Config)
    }

    /// This will
    /// - validate that `expense_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the store directory exists
    /// - return the loaded configuration object
    pub async fn load(expense_home: impl Into<PathBuf>) -> Result<Self> {
        load_inner(expense_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn store_dir(&self) -> &Path {
        &self.store
    }

    /// The configured downloads directory, resolved against the home directory when relative.
    pub fn downloads_dir(&self) -> PathBuf {
        match &self.config_file.downloads_dir {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.root.join(p),
            None => self.root.join(DOWNLOADS),
        }
    }

    pub fn auto_save_period(&self) -> Duration {
        Duration::from_secs(self.config_file.auto_save_secs)
    }

    pub fn currency(&self) -> &str {
        &self.config_file.currency
    }

    pub fn file_dialogs(&self) -> bool {
        self.config_file.file_dialogs
    }

    /// Opens the key-value store that holds both the primary data and the CSV backup.
    pub fn open_store(&self) -> Result<Arc<dyn KvStore>> {
        let store = DirStore::new(&self.store).pub_result(ErrorType::Storage)?;
        Ok(Arc::new(store))
    }

    /// The file picker for this configuration. `preset` is used instead of asking for a path.
    pub fn picker(&self, preset: Option<PathBuf>) -> Arc<dyn FilePicker> {
        let downloads = DownloadPicker::new(self.downloads_dir());
        if self.file_dialogs() {
            Arc::new(PromptPicker::new(preset, downloads))
        } else {
            Arc::new(downloads)
        }
    }

    /// Builds an uninitialized `Ledger` on top of this home directory.
    pub fn ledger(&self, preset: Option<PathBuf>) -> Result<Ledger> {
        let store = self.open_store()?;
        let files = FileSnapshots::with_period(self.picker(preset), self.auto_save_period());
        Ok(Ledger::new(
            store.clone(),
            BackupStore::new(store),
            Arc::new(files),
        ))
    }
}

async fn create_inner(maybe_relative: PathBuf) -> anyhow::Result<Config> {
    utils::make_dir(&maybe_relative)
        .await
        .context("Unable to create the expense home directory")?;
    let root = utils::canonicalize(&maybe_relative).await?;

    let config_path = root.join(CONFIG_JSON);
    if config_path.exists() {
        bail!(
            "An expense home already exists at '{}', remove its config.json to start over",
            root.display()
        );
    }

    let store = root.join(STORE);
    utils::make_dir(&store).await?;
    utils::make_dir(&root.join(DOWNLOADS)).await?;

    let config_file = ConfigFile::default();
    config_file.save(&config_path).await?;

    Ok(Config {
        root,
        store,
        config_path,
        config_file,
    })
}

async fn load_inner(maybe_relative: PathBuf) -> anyhow::Result<Config> {
    let root = utils::canonicalize(&maybe_relative)
        .await
        .context("Expense home is missing, run 'expense init' first")?;

    let config_path = root.join(CONFIG_JSON);
    if !config_path.is_file() {
        bail!(
            "The config file is missing '{}', run 'expense init' first",
            config_path.display()
        )
    }
    let config_file = ConfigFile::load(&config_path).await?;

    let config = Config {
        store: root.join(STORE),
        root,
        config_path,
        config_file,
    };
    if !config.store.is_dir() {
        bail!(
            "The store directory is missing '{}'",
            config.store.display()
        )
    }
    Ok(config)
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expense-tracker",
///   "config_version": 1,
///   "auto_save_secs": 30,
///   "currency": "₹",
///   "file_dialogs": true,
///   "downloads_dir": "/home/me/Downloads"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expense-tracker"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Seconds between auto-save writes
    #[serde(default = "default_auto_save_secs")]
    auto_save_secs: u64,

    /// Currency symbol used in reports
    #[serde(default = "default_currency")]
    currency: String,

    /// When false, saves go to the downloads directory instead of asking for a path
    #[serde(default = "default_file_dialogs")]
    file_dialogs: bool,

    /// Where downloaded files go (optional, relative to the home directory or absolute)
    /// Defaults to $EXPENSE_HOME/downloads if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    downloads_dir: Option<PathBuf>,
}

fn default_auto_save_secs() -> u64 {
    AUTO_SAVE_SECS
}

fn default_currency() -> String {
    CURRENCY.to_string()
}

fn default_file_dialogs() -> bool {
    true
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            auto_save_secs: AUTO_SAVE_SECS,
            currency: CURRENCY.to_string(),
            file_dialogs: true,
            downloads_dir: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if its values are invalid
    async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.auto_save_secs > 0,
            "Invalid auto_save_secs in config file: it must be at least 1"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}
