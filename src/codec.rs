//! The CSV codec: conversion between an expense collection and the tracker's CSV document.
//!
//! A document looks like this:
//!
//! ```text
//! # EXPENSE TRACKER PRO DATA
//! # Generated on: 2024-01-15T09:30:00.000Z
//! # Categories: 🍔 Food & Dining;🚗 Transportation
//! # Total Expenses: 1
//! # Total Amount: 250.00
//!
//! # EXPENSE DATA
//! ID,Description,Amount,Category,Date,Timestamp,Notes
//! 1705311000000,"Coffee",250,"🍔 Food & Dining",2024-01-15,2024-01-15T09:30:00.000Z,""
//! ```
//!
//! Decoding is deliberately lenient. The header row is found by substring search so extra
//! metadata lines are ignored, and a malformed data row is logged and skipped rather than failing
//! the whole document. Only a document without any recognizable header row is an error.

use crate::model::{new_id, now_iso, Amount, Categories, Expense};
use anyhow::{ensure, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use std::str::FromStr;
use tracing::{debug, warn};

/// The header row written before the data rows.
pub const HEADER: &str = "ID,Description,Amount,Category,Date,Timestamp,Notes";

/// The part of the header row the decoder searches for.
pub const HEADER_MARKER: &str = "ID,Description,Amount,Category,Date";

const TITLE: &str = "# EXPENSE TRACKER PRO DATA";
const DATA_MARKER: &str = "# EXPENSE DATA";
const BACKUP_TITLE: &str = "# Expense Tracker Pro Backup";
const GENERATED_PREFIX: &str = "# Generated on:";
const CATEGORIES_PREFIX: &str = "# Categories:";
const TOTAL_EXPENSES_PREFIX: &str = "# Total Expenses:";
const TOTAL_AMOUNT_PREFIX: &str = "# Total Amount:";

/// Rows with fewer fields than this are skipped. `Notes` may be missing.
const MIN_FIELDS: usize = 6;

/// The number of columns in `HEADER`.
const HEADER_FIELDS: usize = 7;

/// Errors that make a whole document unreadable.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(
        "Invalid CSV format: expected a header row containing '{}' but none was found in {lines} \
        line(s)",
        HEADER_MARKER
    )]
    MissingHeader { lines: usize },
}

/// Which metadata block to write in front of the header row.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Preamble {
    /// The full export block used for CSV exports and the backup store.
    #[default]
    Export,
    /// The shorter block used by the standalone backup CSV file.
    Backup,
}

/// The result of decoding a document.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Decoded {
    pub expenses: Vec<Expense>,
    /// The categories listed in the metadata block. Empty when the block had none.
    pub categories: Categories,
    /// The number of data rows that could not be read.
    pub skipped_rows: usize,
}

/// Encodes `expenses` and `categories`, stamped with the current instant.
pub fn encode(expenses: &[Expense], categories: &Categories) -> String {
    encode_at(expenses, categories, Utc::now(), Preamble::Export)
}

/// Encodes `expenses` and `categories`. The output depends only on the arguments.
pub fn encode_at(
    expenses: &[Expense],
    categories: &Categories,
    generated_at: DateTime<Utc>,
    preamble: Preamble,
) -> String {
    let generated_at = generated_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let total: Amount = expenses.iter().map(|e| &e.amount).sum();
    let categories_line = format!("{CATEGORIES_PREFIX} {}", categories.join(";"));
    let count_line = format!("{TOTAL_EXPENSES_PREFIX} {}", expenses.len());
    let total_line = format!("{TOTAL_AMOUNT_PREFIX} {}", total.to_fixed2());

    let mut lines = match preamble {
        Preamble::Export => vec![
            TITLE.to_string(),
            format!("{GENERATED_PREFIX} {generated_at}"),
            categories_line,
            count_line,
            total_line,
            String::new(),
            DATA_MARKER.to_string(),
        ],
        Preamble::Backup => vec![
            format!("{BACKUP_TITLE} - {generated_at}"),
            count_line,
            total_line,
            categories_line,
            String::new(),
        ],
    };
    lines.push(HEADER.to_string());
    lines.extend(expenses.iter().map(encode_row));
    lines.join("\n")
}

fn encode_row(expense: &Expense) -> String {
    [
        bare(&expense.id),
        quoted(&expense.description),
        expense.amount.to_string(),
        quoted(&expense.category),
        bare(&expense.date),
        bare(&expense.timestamp),
        quoted(&expense.notes),
    ]
    .join(",")
}

/// Wraps `s` in double quotes, doubling any quotes inside it.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Writes `s` as-is unless the decoder would misread it.
fn bare(s: &str) -> String {
    let unsafe_char = s.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r'));
    if unsafe_char || s.starts_with('#') || s.trim() != s {
        quoted(s)
    } else {
        s.to_string()
    }
}

/// Decodes a document produced by `encode` (or a hand-edited variant of one).
pub fn decode(text: &str) -> Result<Decoded, CodecError> {
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let mut categories = Categories::empty();
    let mut seen = 0;
    let mut found_header = false;
    for line in lines.by_ref() {
        seen += 1;
        let trimmed = line.trim();
        if let Some(list) = trimmed.strip_prefix(CATEGORIES_PREFIX) {
            categories = parse_category_list(list);
        }
        if trimmed.contains(HEADER_MARKER) {
            found_header = true;
            break;
        }
    }
    if !found_header {
        return Err(CodecError::MissingHeader { lines: seen });
    }

    let mut expenses = Vec::new();
    let mut skipped_rows = 0;
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields = read_record(line, &mut lines);
        match row_to_expense(&fields) {
            Ok(expense) => expenses.push(expense),
            Err(e) => {
                warn!("Skipping invalid CSV row '{line}': {e:#}");
                skipped_rows += 1;
            }
        }
    }

    debug!(
        "Decoded {} expenses and {} categories, skipped {skipped_rows} rows",
        expenses.len(),
        categories.len()
    );
    Ok(Decoded {
        expenses,
        categories,
        skipped_rows,
    })
}

/// Parses the text after `# Categories:`. Files written by the web app have a comma
/// between the label and the list, which is dropped here.
fn parse_category_list(list: &str) -> Categories {
    let list = list.trim();
    let list = list.strip_prefix(',').unwrap_or(list);
    Categories::from_names(list.split(';'))
}

/// Splits one record into fields. A quoted span that is still open at the end of a line may
/// continue on the following lines, so a record can consume more than one line from `rest`. The
/// lines are only joined when the span closes before a line that reads as a row of its own and
/// the joined record is no wider than the header. Otherwise the first line is read on its own
/// and `rest` is left untouched, so an unbalanced quote costs only its own row.
fn read_record<'a, I>(first: &'a str, rest: &mut I) -> Vec<String>
where
    I: Iterator<Item = &'a str> + Clone,
{
    let mut record = RecordReader::default();
    record.feed(first);
    if !record.in_quotes {
        return record.finish();
    }

    let alone = record.clone();
    let mut lookahead = rest.clone();
    while let Some(next) = lookahead.next() {
        if starts_record(next) {
            break;
        }
        record.current.push(('\n', true));
        record.feed(next);
        if record.width() > HEADER_FIELDS {
            break;
        }
        if !record.in_quotes {
            *rest = lookahead;
            return record.finish();
        }
    }
    alone.finish()
}

/// True when `line` on its own is a complete, readable row.
fn starts_record(line: &str) -> bool {
    let mut record = RecordReader::default();
    record.feed(line);
    !record.in_quotes && row_to_expense(&record.finish()).is_ok()
}

/// The state of a record being split into fields.
#[derive(Debug, Default, Clone)]
struct RecordReader {
    fields: Vec<String>,
    // Each char is tagged with whether it was inside a quoted span. Only untagged whitespace is
    // trimmed from the ends of a field.
    current: Vec<(char, bool)>,
    in_quotes: bool,
}

impl RecordReader {
    fn feed(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' if self.in_quotes => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        self.current.push(('"', true));
                    } else {
                        self.in_quotes = false;
                    }
                }
                // a quote opens a span only at the start of a field, elsewhere it is literal
                '"' if self.at_field_start() => self.in_quotes = true,
                ',' if !self.in_quotes => {
                    let field = finish_field(&mut self.current);
                    self.fields.push(field);
                }
                _ => self.current.push((c, self.in_quotes)),
            }
        }
    }

    fn at_field_start(&self) -> bool {
        self.current
            .iter()
            .all(|&(c, quoted)| !quoted && c.is_whitespace())
    }

    /// The number of fields the record would have if it ended here.
    fn width(&self) -> usize {
        self.fields.len() + 1
    }

    fn finish(mut self) -> Vec<String> {
        let field = finish_field(&mut self.current);
        self.fields.push(field);
        self.fields
    }
}

fn finish_field(current: &mut Vec<(char, bool)>) -> String {
    let keep = |&(c, quoted): &(char, bool)| quoted || !c.is_whitespace();
    let start = current.iter().position(keep).unwrap_or(current.len());
    let end = current.iter().rposition(keep).map_or(start, |ix| ix + 1);
    let value = current[start..end].iter().map(|(c, _)| c).collect();
    current.clear();
    value
}

fn field(fields: &[String], ix: usize) -> &str {
    fields.get(ix).map(String::as_str).unwrap_or("")
}

fn row_to_expense(fields: &[String]) -> anyhow::Result<Expense> {
    ensure!(
        fields.len() >= MIN_FIELDS,
        "expected at least {MIN_FIELDS} fields but found {}",
        fields.len()
    );

    let id = match field(fields, 0) {
        "" => new_id(),
        id => id.to_string(),
    };
    let amount = Amount::from_str(field(fields, 2)).context("The Amount column is invalid")?;
    let timestamp = match field(fields, 5) {
        "" => now_iso(),
        ts => ts.to_string(),
    };

    Ok(Expense {
        id,
        description: field(fields, 1).to_string(),
        amount,
        category: field(fields, 3).to_string(),
        date: field(fields, 4).to_string(),
        timestamp,
        notes: field(fields, 6).to_string(),
    })
}

/// Counts the data rows of a document without converting them to expenses. Rows are split the
/// same way `decode` splits them, so a multi-line note counts once. Without a header row every
/// non-blank, non-comment line counts.
pub fn count_rows(text: &str) -> usize {
    let all = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));
    let mut lines = all.clone();
    if !lines.by_ref().any(|line| line.contains(HEADER_MARKER)) {
        lines = all;
    }

    let mut count = 0;
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        read_record(line, &mut lines);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expense(id: &str, description: &str, amount: &str, category: &str, notes: &str) -> Expense {
        Expense {
            id: id.to_string(),
            description: description.to_string(),
            amount: Amount::from_str(amount).unwrap(),
            category: category.to_string(),
            date: "2024-01-15".to_string(),
            timestamp: "2024-01-15T09:30:00.000Z".to_string(),
            notes: notes.to_string(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    fn tricky_expenses() -> Vec<Expense> {
        vec![
            expense("1", "Coffee", "250", "🍔 Food & Dining", ""),
            expense("2", "", "12.50", "🚗 Transportation", "no description"),
            expense("3", "Bread, milk, eggs", "99.99", "🛒 Shopping", "comma, separated"),
            expense("4", r#"He said "hi", then left"#, "1", "🎁 Gifts", r#""quoted""#),
            expense("5", "  padded  ", "3", "🏖️ Travel", "line one\nline two"),
            expense("6", "#hashtag", "0.01", "🔄 Other", ""),
        ]
    }

    #[test]
    fn test_round_trip() {
        let expenses = tricky_expenses();
        let categories = Categories::default();
        let text = encode(&expenses, &categories);
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.expenses, expenses);
        assert_eq!(decoded.categories, categories);
        assert_eq!(decoded.skipped_rows, 0);
    }

    #[test]
    fn test_round_trip_backup_preamble() {
        let expenses = tricky_expenses();
        let categories = Categories::from_names(vec!["🍔 Food & Dining", "custom"]);
        let text = encode_at(&expenses, &categories, fixed_time(), Preamble::Backup);
        assert!(text.starts_with("# Expense Tracker Pro Backup - 2024-01-15T09:30:00.000Z"));
        assert!(!text.contains(DATA_MARKER));
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.expenses, expenses);
        assert_eq!(decoded.categories, categories);
    }

    #[test]
    fn test_encode_layout() {
        let expenses = vec![expense("1", "Coffee", "250", "🍔 Food & Dining", "")];
        let categories = Categories::from_names(vec!["🍔 Food & Dining", "🚗 Transportation"]);
        let text = encode_at(&expenses, &categories, fixed_time(), Preamble::Export);
        let expected = "# EXPENSE TRACKER PRO DATA\n\
            # Generated on: 2024-01-15T09:30:00.000Z\n\
            # Categories: 🍔 Food & Dining;🚗 Transportation\n\
            # Total Expenses: 1\n\
            # Total Amount: 250.00\n\
            \n\
            # EXPENSE DATA\n\
            ID,Description,Amount,Category,Date,Timestamp,Notes\n\
            1,\"Coffee\",250,\"🍔 Food & Dining\",2024-01-15,2024-01-15T09:30:00.000Z,\"\"";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let expenses = tricky_expenses();
        let categories = Categories::default();
        let a = encode_at(&expenses, &categories, fixed_time(), Preamble::Export);
        let b = encode_at(&expenses, &categories, fixed_time(), Preamble::Export);
        assert_eq!(a, b);
    }

    #[test]
    fn test_quoting() {
        let description = r#"He said "hi", then left"#;
        let expenses = vec![expense("1", description, "5", "🔄 Other", "")];
        let text = encode(&expenses, &Categories::default());
        let row = text.lines().last().unwrap();
        assert!(row.contains(r#","He said ""hi"", then left","#));
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.expenses[0].description(), description);
    }

    #[test]
    fn test_total_amount_two_places() {
        let expenses = vec![
            expense("1", "a", "10.5", "x", ""),
            expense("2", "b", "0.25", "x", ""),
        ];
        let text = encode_at(&expenses, &Categories::empty(), fixed_time(), Preamble::Export);
        assert!(text.contains("# Total Amount: 10.75\n"));
        assert!(text.contains("# Total Expenses: 2\n"));
    }

    #[test]
    fn test_tolerant_decode_skips_truncated_row() {
        let text = "# Categories: a;b\n\
            ID,Description,Amount,Category,Date,Timestamp,Notes\n\
            1,\"first\",10,\"a\",2024-01-01,2024-01-01T00:00:00.000Z,\"\"\n\
            2,\"truncated\",20,\"a\"\n\
            3,\"third\",30,\"b\",2024-01-03,2024-01-03T00:00:00.000Z,\"\"";
        let decoded = decode(text).unwrap();
        let ids: Vec<&str> = decoded.expenses.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(decoded.skipped_rows, 1);
    }

    #[test]
    fn test_stray_quote_inside_field_is_literal() {
        let text = "ID,Description,Amount,Category,Date,Timestamp,Notes\n\
            1,\"ok\",10,\"a\",2024-01-01,t,\"\"\n\
            2,5\" pipe,20,\"a\",2024-01-02,t,\"\"\n\
            3,\"three\",30,\"a\",2024-01-03,t,\"\"\n\
            4,\"four\",40,\"a\",2024-01-04,t,\"\"";
        let decoded = decode(text).unwrap();
        let ids: Vec<&str> = decoded.expenses.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(decoded.expenses[1].description(), "5\" pipe");
        assert_eq!(decoded.skipped_rows, 0);
    }

    #[test]
    fn test_unclosed_quote_costs_only_its_row() {
        let text = "ID,Description,Amount,Category,Date,Timestamp,Notes\n\
            1,\"ok\",10,\"a\",2024-01-01,t,\"\"\n\
            2,\"5 pipe,20,a,2024-01-02,t,\n\
            3,\"three\",30,\"a\",2024-01-03,t,\"\"\n\
            4,\"four\",40,\"a\",2024-01-04,t,\"\"";
        let decoded = decode(text).unwrap();
        let ids: Vec<&str> = decoded.expenses.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
        assert_eq!(decoded.skipped_rows, 1);
    }

    #[test]
    fn test_bad_amount_skips_row() {
        let text = "ID,Description,Amount,Category,Date,Timestamp,Notes\n\
            1,\"ok\",10,\"a\",2024-01-01,t,\"\"\n\
            2,\"bad\",ten,\"a\",2024-01-01,t,\"\"";
        let decoded = decode(text).unwrap();
        assert_eq!(decoded.expenses.len(), 1);
        assert_eq!(decoded.skipped_rows, 1);
    }

    #[test]
    fn test_missing_header() {
        let text = "# EXPENSE TRACKER PRO DATA\nDate,Amount\n2024-01-01,5";
        let err = decode(text).unwrap_err();
        assert!(matches!(err, CodecError::MissingHeader { lines: 3 }));
        assert!(err.to_string().contains(HEADER_MARKER));
    }

    #[test]
    fn test_empty_document_is_missing_header() {
        assert!(decode("").is_err());
    }

    #[test]
    fn test_header_only_decodes_empty() {
        let decoded = decode(HEADER).unwrap();
        assert!(decoded.expenses.is_empty());
        assert!(decoded.categories.is_empty());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let text = "ID,Description,Amount,Category,Date,Timestamp,Notes\n,\"x\",,\"c\",2024-01-01,";
        let decoded = decode(text).unwrap();
        let expense = &decoded.expenses[0];
        assert!(!expense.id().is_empty());
        assert!(!expense.timestamp().is_empty());
        assert!(expense.amount().is_zero());
        assert_eq!(expense.notes(), "");
    }

    #[test]
    fn test_skips_comments_and_blank_lines_between_rows() {
        let text = "ID,Description,Amount,Category,Date,Timestamp,Notes\n\
            \n\
            # a stray comment\n\
            1,\"x\",1,\"c\",2024-01-01,t,\"\"\r\n\
            \r\n\
            2,\"y\",2,\"c\",2024-01-02,t,\"\"\r\n";
        let decoded = decode(text).unwrap();
        assert_eq!(decoded.expenses.len(), 2);
        assert_eq!(decoded.skipped_rows, 0);
    }

    #[test]
    fn test_categories_line_with_comma() {
        let text = "# Categories:,🍔 Food & Dining;🚗 Transportation;\n\
            ID,Description,Amount,Category,Date,Timestamp,Notes";
        let decoded = decode(text).unwrap();
        assert_eq!(
            decoded.categories.as_slice(),
            &["🍔 Food & Dining".to_string(), "🚗 Transportation".to_string()]
        );
    }

    #[test]
    fn test_bare_fields_quoted_when_needed() {
        let mut odd = expense("a,b", "x", "1", "c", "");
        odd.date = "#2024".to_string();
        let text = encode(&[odd.clone()], &Categories::empty());
        assert!(text.ends_with(r##""a,b","x",1,"c","#2024",2024-01-15T09:30:00.000Z,"""##));
        assert_eq!(decode(&text).unwrap().expenses, vec![odd]);
    }

    #[test]
    fn test_count_rows() {
        let expenses = tricky_expenses()[..3].to_vec();
        let text = encode(&expenses, &Categories::default());
        assert_eq!(count_rows(&text), 3);
        assert_eq!(count_rows("garbage"), 1);
        // the multi-line note counts once
        let text = encode(&tricky_expenses(), &Categories::default());
        assert_eq!(count_rows(&text), 6);
        assert_eq!(count_rows(""), 0);
    }
}
