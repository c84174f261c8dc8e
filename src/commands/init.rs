use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the expense home directory, its `store` and `downloads` subdirectories and an initial
/// `config.json` with default settings.
///
/// # Errors
/// - Returns an error if the home directory is already initialized or any file operation fails.
pub async fn init(expense_home: &Path) -> Result<Out<()>> {
    let config = Config::create(expense_home).await?;
    Ok(format!(
        "Successfully created the expense home at {}",
        config.root().display()
    )
    .into())
}
