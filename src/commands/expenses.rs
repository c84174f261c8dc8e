//! Commands that add, change, remove and list expenses.

use crate::args::{AddArgs, EditArgs};
use crate::commands::{open_ledger, Out};
use crate::model::{Expense, ExpenseUpdate, NewExpense};
use crate::{Config, Error, ErrorType, Result};

pub async fn add(config: Config, args: &AddArgs) -> Result<Out<Expense>> {
    let mut ledger = open_ledger(&config, None)?;
    let mut new = NewExpense::new(args.amount(), args.category())
        .description(args.description())
        .notes(args.notes());
    if let Some(date) = args.date() {
        new = new.date(date);
    }
    let expense = ledger.add_expense(new)?;
    Ok(Out::new(
        format!("Added expense {}", expense.id()),
        expense,
    ))
}

pub async fn edit(config: Config, args: &EditArgs) -> Result<Out<Expense>> {
    let update = ExpenseUpdate {
        description: args.description().map(String::from),
        amount: args.amount(),
        category: args.category().map(String::from),
        date: args.date().map(String::from),
        notes: args.notes().map(String::from),
    };
    if update.is_empty() {
        return Err(Error::msg(
            ErrorType::Request,
            "Nothing to change, pass at least one of --amount, --category, --description, \
            --date or --notes",
        ));
    }
    let mut ledger = open_ledger(&config, None)?;
    let expense = ledger.edit_expense(args.id(), update)?;
    Ok(Out::new(
        format!("Updated expense {}", expense.id()),
        expense,
    ))
}

pub async fn delete(config: Config, id: &str) -> Result<Out<Expense>> {
    let mut ledger = open_ledger(&config, None)?;
    let expense = ledger.delete_expense(id)?;
    Ok(Out::new(format!("Deleted expense {id}"), expense))
}

/// Lists the expenses, optionally only those in `category`, one line per expense.
pub async fn list(config: Config, category: Option<&str>) -> Result<Out<Vec<Expense>>> {
    let ledger = open_ledger(&config, None)?;
    let expenses: Vec<Expense> = ledger
        .data()
        .expenses()
        .iter()
        .filter(|e| category.map_or(true, |c| e.category() == c))
        .cloned()
        .collect();
    if expenses.is_empty() {
        return Ok(Out::new("No expenses found", expenses));
    }

    let currency = config.currency();
    let mut lines = vec![format!("{} expense(s):", expenses.len())];
    lines.extend(expenses.iter().map(|e| {
        format!(
            "{} | {} | {currency}{} | {} | {}",
            e.id(),
            e.date(),
            e.amount(),
            e.category(),
            e.description()
        )
    }));
    Ok(Out::new(lines.join("\n"), expenses))
}
