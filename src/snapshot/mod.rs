//! File snapshots: JSON and CSV copies of the collection written to files the user picks.
//!
//! The host capability is abstracted by `FilePicker`. `PromptPicker` asks for paths on the
//! terminal, `DownloadPicker` stands in for hosts without file dialogs by writing numbered files
//! into a downloads directory. `FileSnapshots` builds the save, load and auto-save operations on
//! top of whichever picker it is given.

mod download;
mod picker;
mod service;

pub use download::DownloadPicker;
pub use picker::{FileHandle, FilePicker, OpenedFile, PathHandle, PromptPicker};
pub(crate) use picker::has_extension;
pub use service::{FileSnapshots, AUTO_SAVE_PERIOD};
pub(crate) use service::write_snapshot;

use crate::error::{Error, ErrorType};
use crate::model::{now_iso, Amount, Categories, Expense, ExpenseData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// The file name offered when saving a JSON snapshot.
pub const DATA_FILE_NAME: &str = "expense_tracker_data.json";

/// The file name offered when saving the backup CSV.
pub const BACKUP_FILE_NAME: &str = "expense_tracker_backup.csv";

/// The file name offered when exporting CSV.
pub const CSV_FILE_NAME: &str = "expense_tracker_data.csv";

const SNAPSHOT_VERSION: &str = "1.0";
const SNAPSHOT_APP: &str = "Expense Tracker Pro";

/// The kind of file a picker is asked for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Json,
    Csv,
}

serde_plain::derive_display_from_serialize!(FileKind);

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Json => "json",
            FileKind::Csv => "csv",
        }
    }
}

/// Why a file operation failed.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("File dialogs are not available, so this operation cannot be performed")]
    NotSupported,
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
    #[error("{0}")]
    Storage(String),
}

impl SnapshotError {
    pub(crate) fn storage(context: &str, e: anyhow::Error) -> Self {
        SnapshotError::Storage(format!("{context}: {e:#}"))
    }

    fn error_type(&self) -> ErrorType {
        match self {
            SnapshotError::NotSupported => ErrorType::NotSupported,
            SnapshotError::InvalidFormat(_) => ErrorType::Format,
            SnapshotError::Storage(_) => ErrorType::Storage,
        }
    }
}

/// The result of an operation that involves a file picker.
#[derive(Debug)]
#[must_use]
pub enum FileOutcome<T> {
    Done(T),
    /// The user dismissed the picker.
    Cancelled,
    Failed(SnapshotError),
}

impl<T> FileOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, FileOutcome::Done(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FileOutcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FileOutcome<U> {
        match self {
            FileOutcome::Done(t) => FileOutcome::Done(f(t)),
            FileOutcome::Cancelled => FileOutcome::Cancelled,
            FileOutcome::Failed(e) => FileOutcome::Failed(e),
        }
    }

    /// Converts to the crate's `Result`. A cancellation becomes an error of type `Cancelled`.
    pub fn into_result(self) -> crate::Result<T> {
        match self {
            FileOutcome::Done(t) => Ok(t),
            FileOutcome::Cancelled => Err(Error::msg(
                ErrorType::Cancelled,
                "The file dialog was cancelled",
            )),
            FileOutcome::Failed(e) => Err(Error::new(e.error_type(), e)),
        }
    }
}

/// Where a snapshot ended up.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Saved {
    /// Written to the file the user picked.
    File(String),
    /// Written into the downloads directory because file dialogs are unavailable.
    Downloaded(PathBuf),
}

impl Display for Saved {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Saved::File(name) => write!(f, "saved to {name}"),
            Saved::Downloaded(path) => write!(f, "downloaded to {}", path.display()),
        }
    }
}

/// The JSON document written by `save_as`, `quick_save` and auto-save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub timestamp: String,
    pub app: String,
    pub data: SnapshotData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub expenses: Vec<Expense>,
    pub categories: Categories,
    pub total_expenses: usize,
    pub total_amount: Amount,
}

impl Snapshot {
    pub fn new(expenses: &[Expense], categories: &Categories) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: now_iso(),
            app: SNAPSHOT_APP.to_string(),
            data: SnapshotData {
                expenses: expenses.to_vec(),
                categories: categories.clone(),
                total_expenses: expenses.len(),
                total_amount: expenses.iter().map(|e| &e.amount).sum(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::storage("Unable to serialize the snapshot", e.into()))
    }

    /// Reads the expenses and categories out of a snapshot document. Only `data.expenses` and
    /// `data.categories` are required, the remaining fields are informational.
    pub fn parse(text: &str) -> Result<ExpenseData, SnapshotError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SnapshotError::InvalidFormat(format!("the file is not valid JSON ({e})")))?;
        let data = value.get("data").ok_or_else(|| {
            SnapshotError::InvalidFormat(format!(
                "expected a top-level 'data' object but found the fields [{}]",
                field_names(&value)
            ))
        })?;
        let expenses = required_array(data, "expenses")?;
        let categories = required_array(data, "categories")?;

        let expenses: Vec<Expense> = serde_json::from_value(expenses.clone()).map_err(|e| {
            SnapshotError::InvalidFormat(format!("'data.expenses' contains an invalid expense ({e})"))
        })?;
        let categories: Vec<String> = serde_json::from_value(categories.clone()).map_err(|e| {
            SnapshotError::InvalidFormat(format!("'data.categories' must hold strings ({e})"))
        })?;
        let categories = Categories::try_from_names(categories).map_err(|e| {
            SnapshotError::InvalidFormat(format!("'data.categories' holds an invalid name ({e})"))
        })?;
        Ok(ExpenseData::new(expenses, categories))
    }
}

fn required_array<'a>(data: &'a Value, name: &str) -> Result<&'a Value, SnapshotError> {
    match data.get(name) {
        Some(v) if v.is_array() => Ok(v),
        Some(_) => Err(SnapshotError::InvalidFormat(format!(
            "expected 'data.{name}' to be a list"
        ))),
        None => Err(SnapshotError::InvalidFormat(format!(
            "expected 'data.{name}' but it is missing, found [{}]",
            field_names(data)
        ))),
    }
}

fn field_names(value: &Value) -> String {
    match value.as_object() {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::sample_expense;

    #[test]
    fn test_snapshot_shape() {
        let expenses = vec![sample_expense("1", "Coffee", "250")];
        let snapshot = Snapshot::new(&expenses, &Categories::default());
        let json = snapshot.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["app"], "Expense Tracker Pro");
        assert_eq!(value["data"]["totalExpenses"], 1);
        assert_eq!(value["data"]["totalAmount"], 250.0);
        assert_eq!(value["data"]["expenses"][0]["amount"], 250.0);
        assert_eq!(value["data"]["expenses"][0]["description"], "Coffee");
        assert_eq!(value["data"]["categories"][0], "🍔 Food & Dining");
    }

    #[test]
    fn test_parse_round_trip() {
        let expenses = vec![
            sample_expense("1", "Coffee", "250"),
            sample_expense("2", "Tea, \"green\"", "12.5"),
        ];
        let json = Snapshot::new(&expenses, &Categories::default())
            .to_json()
            .unwrap();
        let data = Snapshot::parse(&json).unwrap();
        assert_eq!(data.expenses(), expenses.as_slice());
        assert_eq!(data.categories(), &Categories::default());
    }

    #[test]
    fn test_parse_missing_data() {
        let err = Snapshot::parse(r#"{"version": "1.0", "expenses": []}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidFormat(_)));
        let message = err.to_string();
        assert!(message.contains("'data'"), "{message}");
        assert!(message.contains("expenses"), "{message}");
    }

    #[test]
    fn test_parse_missing_categories() {
        let err = Snapshot::parse(r#"{"data": {"expenses": []}}"#).unwrap_err();
        assert!(err.to_string().contains("data.categories"));
    }

    #[test]
    fn test_parse_bad_expense() {
        let err =
            Snapshot::parse(r#"{"data": {"expenses": [{"id": "1"}], "categories": []}}"#).unwrap_err();
        assert!(err.to_string().contains("invalid expense"));
    }

    #[test]
    fn test_parse_rejects_unstorable_category() {
        let err = Snapshot::parse(
            r#"{"data": {"expenses": [], "categories": ["Food; Drinks", "Other"]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidFormat(_)));
        assert!(err.to_string().contains("Food; Drinks"), "{err}");
    }

    #[test]
    fn test_parse_not_json() {
        let err = Snapshot::parse("ID,Description").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_outcome_into_result() {
        let cancelled: FileOutcome<()> = FileOutcome::Cancelled;
        assert_eq!(
            cancelled.into_result().unwrap_err().error_type(),
            ErrorType::Cancelled
        );
        let failed: FileOutcome<()> = FileOutcome::Failed(SnapshotError::NotSupported);
        assert_eq!(
            failed.into_result().unwrap_err().error_type(),
            ErrorType::NotSupported
        );
        assert_eq!(FileOutcome::Done(3).map(|n| n * 2).into_result().unwrap(), 6);
    }

    #[test]
    fn test_file_kind_display() {
        assert_eq!(FileKind::Json.to_string(), "json");
        assert_eq!(FileKind::Csv.extension(), "csv");
    }
}
