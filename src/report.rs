//! The plain-text expense report.

use crate::model::{Amount, Expense, ExpenseData};
use chrono::{Local, NaiveDateTime};
use std::fmt::Write;

const TITLE: &str = "EXPENSE TRACKER PRO - REPORT";

/// The name offered when the report is saved. Downloads add the date to it.
pub const REPORT_FILE_NAME: &str = "expenses_report.txt";

/// Renders the report stamped with the current local time. Returns `None` when there are no
/// expenses to report on.
pub fn render(data: &ExpenseData, currency: &str) -> Option<String> {
    render_at(data, currency, Local::now().naive_local())
}

/// Renders the report as of `generated_at`.
pub fn render_at(data: &ExpenseData, currency: &str, generated_at: NaiveDateTime) -> Option<String> {
    let expenses = data.expenses();
    if expenses.is_empty() {
        return None;
    }
    let total: Amount = expenses.iter().map(|e| &e.amount).sum();

    // writing to a String cannot fail
    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(
        out,
        "Generated on: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "SUMMARY:");
    let _ = writeln!(out, "Total Expenses: {currency}{}", grouped(total));
    let _ = writeln!(out, "Number of Transactions: {}", expenses.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "EXPENSE DETAILS:");
    for e in expenses {
        let _ = writeln!(
            out,
            "{} | {currency}{} | {} | {}",
            e.date, e.amount, e.category, e.description
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "CATEGORY BREAKDOWN:");
    for (category, amount) in breakdown(expenses) {
        let _ = writeln!(out, "{category}: {currency}{}", grouped(amount));
    }
    Some(out.trim_end().to_string())
}

/// Totals per category, in the order each category first appears.
pub fn breakdown(expenses: &[Expense]) -> Vec<(String, Amount)> {
    let mut totals: Vec<(String, Amount)> = Vec::new();
    for e in expenses {
        match totals.iter_mut().find(|(c, _)| *c == e.category) {
            Some((_, amount)) => *amount = *amount + e.amount,
            None => totals.push((e.category.clone(), e.amount)),
        }
    }
    totals
}

fn grouped(amount: Amount) -> String {
    format_num::format_num!(",.2", amount.to_f64())
}
