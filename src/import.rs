//! Reads expenses from CSV files on disk.
//!
//! Two layouts are understood: the tracker's own export document (see `codec`) and a plain
//! spreadsheet export with a `Date,Amount,Category,Description[,Notes]` header.

use crate::codec::{self, CodecError, HEADER_MARKER};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{new_id, now_iso, today, Amount, Categories, Expense, ExpenseData};
use crate::snapshot::FileKind;
use crate::{utils, Result};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

const PLAIN_HEADER: &str = "Date,Amount,Category,Description[,Notes]";

/// Which layout a CSV file was read as.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvFormat {
    Tracker,
    Plain,
}

serde_plain::derive_display_from_serialize!(CsvFormat);

/// The result of reading a CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvImport {
    pub data: ExpenseData,
    pub format: CsvFormat,
    pub skipped_rows: usize,
}

/// Reads the CSV file at `path`. The file must have a `.csv` extension.
pub async fn read_csv_file(path: &Path) -> Result<CsvImport> {
    if !crate::snapshot::has_extension(path, FileKind::Csv) {
        return Err(Error::msg(
            ErrorType::Request,
            format!("Please select a CSV file, got {}", path.display()),
        ));
    }
    let text = utils::read(path).await.pub_result(ErrorType::Storage)?;
    parse_csv(&text).pub_result(ErrorType::Format)
}

/// Reads CSV text in either layout.
pub fn parse_csv(text: &str) -> anyhow::Result<CsvImport> {
    match codec::decode(text) {
        Ok(decoded) => Ok(CsvImport {
            data: ExpenseData::new(decoded.expenses, decoded.categories),
            format: CsvFormat::Tracker,
            skipped_rows: decoded.skipped_rows,
        }),
        Err(CodecError::MissingHeader { .. }) => {
            debug!("No tracker header found, trying the plain layout");
            parse_plain(text)
        }
    }
}

/// A row of a plain spreadsheet export.
#[derive(Debug, Deserialize)]
struct PlainRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Notes", default)]
    notes: String,
}

fn parse_plain(text: &str) -> anyhow::Result<CsvImport> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let has = |name: &str| headers.iter().any(|h| h == name);
    if !(has("Date") && has("Amount") && has("Category")) {
        bail!(
            "Unrecognized CSV format: expected a header row containing '{}' or '{}', found '{}'",
            HEADER_MARKER,
            PLAIN_HEADER,
            headers.iter().collect::<Vec<_>>().join(",")
        );
    }

    let mut expenses = Vec::new();
    let mut skipped_rows = 0;
    for (ix, result) in rdr.deserialize::<PlainRecord>().enumerate() {
        // the header is line 1
        let line = ix + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping CSV row {line}: {e}");
                skipped_rows += 1;
                continue;
            }
        };
        match plain_expense(record) {
            Ok(expense) => expenses.push(expense),
            Err(e) => {
                warn!("Skipping CSV row {line}: {e:#}");
                skipped_rows += 1;
            }
        }
    }

    let categories = Categories::from_names(expenses.iter().map(|e| e.category.clone()));
    Ok(CsvImport {
        data: ExpenseData::new(expenses, categories),
        format: CsvFormat::Plain,
        skipped_rows,
    })
}

fn plain_expense(record: PlainRecord) -> anyhow::Result<Expense> {
    let amount = Amount::from_str(&record.amount)?;
    if record.category.is_empty() {
        bail!("The category is empty");
    }
    Ok(Expense {
        id: new_id(),
        description: record.description,
        amount,
        category: record.category,
        date: if record.date.is_empty() {
            today()
        } else {
            record.date
        },
        timestamp: now_iso(),
        notes: record.notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::sample_expense;

    #[test]
    fn test_parse_tracker_format() {
        let expenses = vec![
            sample_expense("1", "Coffee", "250"),
            sample_expense("2", "Lunch, with \"friends\"", "12.50"),
        ];
        let csv = codec::encode(&expenses, &Categories::default());
        let imported = parse_csv(&csv).unwrap();
        assert_eq!(imported.format, CsvFormat::Tracker);
        assert_eq!(imported.data.expenses(), expenses.as_slice());
        assert_eq!(imported.data.categories(), &Categories::default());
    }

    #[test]
    fn test_parse_plain_format() {
        let csv = "Date,Amount,Category,Description\n\
            2024-01-15,250,🍔 Food & Dining,Coffee\n\
            2024-01-16,\"1,200.50\",🏠 Bills & Utilities,\"Rent, partial\"\n";
        let imported = parse_csv(csv).unwrap();
        assert_eq!(imported.format, CsvFormat::Plain);
        assert_eq!(imported.skipped_rows, 0);
        let expenses = imported.data.expenses();
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].description(), "Coffee");
        assert_eq!(expenses[0].date(), "2024-01-15");
        assert_eq!(expenses[1].amount().to_string(), "1200.50");
        assert_eq!(expenses[1].description(), "Rent, partial");
        assert_eq!(expenses[1].notes(), "");
        assert_ne!(expenses[0].id(), expenses[1].id());
        assert_eq!(
            imported.data.categories(),
            &Categories::from_names(["🍔 Food & Dining", "🏠 Bills & Utilities"])
        );
    }

    #[test]
    fn test_parse_plain_skips_bad_rows() {
        let csv = "Date,Amount,Category,Description,Notes\n\
            2024-01-15,abc,Food,Coffee,\n\
            2024-01-15,3,,Tea,\n\
            2024-01-15,4,Food,Cake,birthday\n";
        let imported = parse_csv(csv).unwrap();
        assert_eq!(imported.skipped_rows, 2);
        assert_eq!(imported.data.expenses().len(), 1);
        assert_eq!(imported.data.expenses()[0].notes(), "birthday");
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = parse_csv("Name,Value\na,1\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ID,Description,Amount,Category,Date"), "{message}");
        assert!(message.contains("Date,Amount,Category"), "{message}");
        assert!(message.contains("found 'Name,Value'"), "{message}");
    }

    #[tokio::test]
    async fn test_read_csv_file_requires_extension() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let path = tempdir.path().join("data.txt");
        utils::write(&path, "Date,Amount,Category\n").await.unwrap();
        let err = read_csv_file(&path).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
        assert!(err.to_string().contains("Please select a CSV file"));
    }

    #[tokio::test]
    async fn test_read_csv_file() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let path = tempdir.path().join("data.CSV");
        let csv = codec::encode(&[sample_expense("1", "Coffee", "250")], &Categories::default());
        utils::write(&path, csv).await.unwrap();
        let imported = read_csv_file(&path).await.unwrap();
        assert_eq!(imported.data.expenses().len(), 1);

        let bad = tempdir.path().join("bad.csv");
        utils::write(&bad, "nothing here").await.unwrap();
        let err = read_csv_file(&bad).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Format);
    }
}
