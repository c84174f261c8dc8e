use crate::model::{Amount, Categories};
use anyhow::{bail, ensure};
use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The date format used for `Expense::date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single recorded expense.
///
/// `id` and `timestamp` are assigned once when the expense is created and never change. The
/// remaining fields may be edited. `description` and `notes` are optional in serialized forms and
/// default to the empty string.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) description: String,
    pub(crate) amount: Amount,
    pub(crate) category: String,
    pub(crate) date: String,
    pub(crate) timestamp: String,
    #[serde(default)]
    pub(crate) notes: String,
}

impl Expense {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Applies `update` to every field except `id` and `timestamp`.
    pub(crate) fn apply(&mut self, update: ExpenseUpdate) {
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
    }
}

/// The user-supplied part of an expense. `id` and `timestamp` are assigned by `into_expense`.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub description: String,
    pub amount: Amount,
    pub category: String,
    /// Defaults to today when `None`.
    pub date: Option<String>,
    pub notes: String,
}

impl NewExpense {
    pub fn new(amount: Amount, category: impl Into<String>) -> Self {
        Self {
            amount,
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Checks the invariants that producers of expenses are responsible for: a positive amount,
    /// a category from the current set and a well-formed date.
    pub fn validate(&self, categories: &Categories) -> anyhow::Result<()> {
        ensure!(
            self.amount.is_positive(),
            "The amount must be greater than zero, got {}",
            self.amount
        );
        validate_category(&self.category, categories)?;
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        Ok(())
    }

    /// Assigns a fresh id and creation timestamp.
    pub(crate) fn into_expense(self) -> Expense {
        Expense {
            id: new_id(),
            description: self.description,
            amount: self.amount,
            category: self.category,
            date: self.date.unwrap_or_else(today),
            timestamp: now_iso(),
            notes: self.notes,
        }
    }
}

/// A partial change to an existing expense. `None` leaves the field untouched.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpdate {
    pub description: Option<String>,
    pub amount: Option<Amount>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub notes: Option<String>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self, categories: &Categories) -> anyhow::Result<()> {
        if let Some(amount) = self.amount {
            ensure!(
                amount.is_positive(),
                "The amount must be greater than zero, got {amount}"
            );
        }
        if let Some(category) = &self.category {
            validate_category(category, categories)?;
        }
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        Ok(())
    }
}

fn validate_category(category: &str, categories: &Categories) -> anyhow::Result<()> {
    if !categories.contains(category) {
        bail!(
            "Unknown category '{category}'. Known categories are: {}",
            categories.join("; ")
        );
    }
    Ok(())
}

fn validate_date(date: &str) -> anyhow::Result<()> {
    if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
        bail!("Expected a date in the form YYYY-MM-DD, got '{date}'");
    }
    Ok(())
}

/// Generates a new opaque expense id.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// The current instant as an ISO-8601 string with millisecond precision, e.g.
/// `2024-01-15T09:30:00.000Z`.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Today's date in `YYYY-MM-DD` form.
pub(crate) fn today() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}
