use clap::Parser;
use expense_tracker::args::{Args, BackupAction, CategorySubcommand, Command};
use expense_tracker::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().expense_home().path();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Add(add_args) => commands::add(Config::load(home).await?, add_args)
            .await?
            .print(),

        Command::Edit(edit_args) => commands::edit(Config::load(home).await?, edit_args)
            .await?
            .print(),

        Command::Delete(id_args) => commands::delete(Config::load(home).await?, id_args.id())
            .await?
            .print(),

        Command::List(list_args) => {
            commands::list(Config::load(home).await?, list_args.category())
                .await?
                .print()
        }

        Command::Category(category_args) => {
            let config = Config::load(home).await?;
            match category_args.action() {
                CategorySubcommand::Add { name } => {
                    commands::category_add(config, name).await?.print()
                }
                CategorySubcommand::Remove { name } => {
                    commands::category_remove(config, name).await?.print()
                }
                CategorySubcommand::List => commands::category_list(config).await?.print(),
            }
        }

        Command::Import(import_args) => {
            commands::import(Config::load(home).await?, import_args.file())
                .await?
                .print()
        }

        Command::Export(file_args) => {
            commands::export(Config::load(home).await?, file_args.file().cloned())
                .await?
                .print()
        }

        Command::Save(file_args) => {
            commands::save(Config::load(home).await?, file_args.file().cloned())
                .await?
                .print()
        }

        Command::Open(file_args) => {
            commands::open(Config::load(home).await?, file_args.file().cloned())
                .await?
                .print()
        }

        Command::QuickSave(file_args) => {
            commands::quick_save(Config::load(home).await?, file_args.file().cloned())
                .await?
                .print()
        }

        Command::BackupCsv(file_args) => {
            commands::backup_csv(Config::load(home).await?, file_args.file().cloned())
                .await?
                .print()
        }

        Command::Backup(backup_args) => {
            let config = Config::load(home).await?;
            match backup_args.action() {
                BackupAction::Info => commands::backup_info(config).await?.print(),
                BackupAction::Clear => commands::backup_clear(config).await?.print(),
            }
        }

        Command::Report(report_args) => {
            commands::report(Config::load(home).await?, report_args.save())
                .await?
                .print()
        }

        Command::Watch(watch_args) => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Unable to listen for Ctrl-C, stopping now: {e}");
                }
            };
            commands::watch(Config::load(home).await?, watch_args.file(), shutdown)
                .await?
                .print()
        }

        Command::Clear(clear_args) => commands::clear(Config::load(home).await?, clear_args.yes())
            .await?
            .print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
