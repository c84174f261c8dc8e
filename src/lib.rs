pub mod args;
pub mod backup;
pub mod codec;
pub mod commands;
mod config;
mod error;
mod fs;
pub mod import;
pub mod kv;
pub mod ledger;
pub mod model;
pub mod report;
pub mod snapshot;
mod utils;

#[cfg(test)]
mod test;

pub use config::Config;
pub use error::{Error, ErrorType, IntoResult, Result};
pub use ledger::Ledger;
