//! These structs provide the CLI interface for the expense CLI.

use crate::model::Amount;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// expense: A local-first expense tracker.
///
/// Expenses are kept in a store under the expense home directory. Every change is written to the
/// store and to a CSV backup, and the collection can be saved to, loaded from and exported to
/// files of your choosing. The `watch` command keeps a JSON copy of the collection up to date
/// while it runs.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the expense home directory and its configuration file.
    ///
    /// By default the home directory is $HOME/expenses. Pass --expense-home or set EXPENSE_HOME
    /// to put it somewhere else.
    Init,
    /// Record a new expense.
    Add(AddArgs),
    /// Change an existing expense.
    Edit(EditArgs),
    /// Delete an expense by id.
    Delete(IdArgs),
    /// List the recorded expenses.
    List(ListArgs),
    /// Add, remove or list categories.
    Category(CategoryArgs),
    /// Merge the expenses from a CSV file into the collection.
    ///
    /// The file may be a CSV export written by this program or a plain spreadsheet export with
    /// a Date,Amount,Category,Description[,Notes] header. Expenses whose id already exists are
    /// replaced.
    Import(ImportArgs),
    /// Export the expenses as CSV.
    Export(FileArgs),
    /// Save the collection as a JSON snapshot.
    Save(FileArgs),
    /// Replace the collection with the contents of a JSON snapshot.
    Open(FileArgs),
    /// Save a JSON snapshot to the file chosen last, or ask for one.
    QuickSave(FileArgs),
    /// Save a backup CSV file.
    BackupCsv(FileArgs),
    /// Show or clear the CSV backup kept in the store.
    Backup(BackupArgs),
    /// Print a plain-text report of the expenses.
    Report(ReportArgs),
    /// Keep a JSON snapshot up to date until interrupted with Ctrl-C.
    Watch(WatchArgs),
    /// Delete every expense and custom category, including the CSV backup.
    Clear(ClearArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where expense data and configuration is held. Defaults to ~/expenses
    #[arg(long, env = "EXPENSE_HOME", default_value_t = default_expense_home())]
    expense_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expense_home: PathBuf) -> Self {
        Self {
            log_level,
            expense_home: expense_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expense_home(&self) -> &DisplayPath {
        &self.expense_home
    }
}

/// (Not shown): Args for the `expense add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The amount spent, e.g. 12.50
    amount: Amount,

    /// The category, which must be one of the known categories
    category: String,

    #[arg(long, short, default_value = "")]
    description: String,

    /// The date in the form YYYY-MM-DD, defaults to today
    #[arg(long)]
    date: Option<String>,

    #[arg(long, default_value = "")]
    notes: String,
}

impl AddArgs {
    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }
}

/// (Not shown): Args for the `expense edit` command. Omitted fields are left unchanged.
#[derive(Debug, Parser, Clone)]
pub struct EditArgs {
    /// The id of the expense to change
    id: String,

    #[arg(long)]
    amount: Option<Amount>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long, short)]
    description: Option<String>,

    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

impl EditArgs {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// (Not shown): Args for commands that take an expense id.
#[derive(Debug, Parser, Clone)]
pub struct IdArgs {
    id: String,
}

impl IdArgs {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// (Not shown): Args for the `expense list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// Only list expenses in this category
    #[arg(long)]
    category: Option<String>,
}

impl ListArgs {
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// (Not shown): Args for the `expense category` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    action: CategorySubcommand,
}

impl CategoryArgs {
    pub fn action(&self) -> &CategorySubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategorySubcommand {
    /// Add a category.
    Add { name: String },
    /// Remove a category. Expenses that use it keep their category text.
    Remove { name: String },
    /// List the categories.
    List,
}

/// (Not shown): Args for the `expense import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// The CSV file to import
    file: PathBuf,
}

impl ImportArgs {
    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// (Not shown): Args for commands that read or write a file.
#[derive(Debug, Parser, Clone)]
pub struct FileArgs {
    /// Use this path instead of asking for one
    #[arg(long)]
    file: Option<PathBuf>,
}

impl FileArgs {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupAction {
    #[default]
    Info,
    Clear,
}

serde_plain::derive_display_from_serialize!(BackupAction);
serde_plain::derive_fromstr_from_deserialize!(BackupAction);

/// (Not shown): Args for the `expense backup` command.
#[derive(Debug, Parser, Clone)]
pub struct BackupArgs {
    /// What to do with the backup: "info" or "clear"
    #[arg(default_value_t = BackupAction::Info)]
    action: BackupAction,
}

impl BackupArgs {
    pub fn action(&self) -> BackupAction {
        self.action
    }
}

/// (Not shown): Args for the `expense report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Also write the report into the downloads directory
    #[arg(long)]
    save: bool,
}

impl ReportArgs {
    pub fn save(&self) -> bool {
        self.save
    }
}

/// (Not shown): Args for the `expense watch` command.
#[derive(Debug, Parser, Clone)]
pub struct WatchArgs {
    /// The JSON file to keep up to date
    #[arg(long)]
    file: PathBuf,
}

impl WatchArgs {
    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// (Not shown): Args for the `expense clear` command.
#[derive(Debug, Parser, Clone)]
pub struct ClearArgs {
    /// Confirm that everything should be deleted
    #[arg(long)]
    yes: bool,
}

impl ClearArgs {
    pub fn yes(&self) -> bool {
        self.yes
    }
}

fn default_expense_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expenses"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expense-home or EXPENSE_HOME instead of relying on the \
                default expense home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("expenses")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(
            ["expense", "--expense-home", "/tmp/expenses"]
                .iter()
                .chain(args.iter()),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_add() {
        let args = parse(&["add", "12.50", "🍔 Food & Dining", "-d", "Lunch"]);
        let Command::Add(add) = args.command() else {
            panic!("expected add, got {:?}", args.command());
        };
        assert_eq!(add.amount().to_string(), "12.50");
        assert_eq!(add.category(), "🍔 Food & Dining");
        assert_eq!(add.description(), "Lunch");
        assert!(add.date().is_none());
        assert_eq!(args.common().expense_home().path(), Path::new("/tmp/expenses"));
        assert_eq!(args.common().log_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_parse_bad_amount() {
        let result = Args::try_parse_from(["expense", "add", "twelve", "Food"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_backup_action() {
        let args = parse(&["backup", "clear"]);
        let Command::Backup(backup) = args.command() else {
            panic!("expected backup");
        };
        assert_eq!(backup.action(), BackupAction::Clear);

        let args = parse(&["backup"]);
        let Command::Backup(backup) = args.command() else {
            panic!("expected backup");
        };
        assert_eq!(backup.action(), BackupAction::Info);
    }

    #[test]
    fn test_parse_category_and_file_args() {
        let args = parse(&["category", "remove", "🔄 Other"]);
        let Command::Category(category) = args.command() else {
            panic!("expected category");
        };
        assert!(matches!(
            category.action(),
            CategorySubcommand::Remove { name } if name == "🔄 Other"
        ));

        let args = parse(&["quick-save", "--file", "out.json"]);
        let Command::QuickSave(file_args) = args.command() else {
            panic!("expected quick-save");
        };
        assert_eq!(file_args.file(), Some(&PathBuf::from("out.json")));
    }
}
