//! Types that represent the core data model, such as `Expense` and `Categories`.
mod amount;
mod category;
mod expense;

pub use amount::{Amount, AmountError};
pub use category::{Categories, DEFAULT_CATEGORIES};
pub use expense::{Expense, ExpenseUpdate, NewExpense, DATE_FORMAT};
pub(crate) use expense::{new_id, now_iso, today};
use serde::{Deserialize, Serialize};

/// The expense collection together with the category set it is recorded against.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseData {
    pub(crate) expenses: Vec<Expense>,
    pub(crate) categories: Categories,
}

impl ExpenseData {
    pub fn new(expenses: Vec<Expense>, categories: Categories) -> Self {
        Self {
            expenses,
            categories,
        }
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn total_amount(&self) -> Amount {
        self.expenses.iter().map(|e| &e.amount).sum()
    }

    pub fn find(&self, id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id == id)
    }

    /// True for the state a fresh installation starts in: no expenses and the default categories.
    pub fn is_untouched_default(&self) -> bool {
        self.expenses.is_empty() && self.categories == Categories::default()
    }
}
