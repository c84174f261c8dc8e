use crate::commands::{open_ledger, Out};
use crate::model::Categories;
use crate::{Config, Result};

pub async fn category_add(config: Config, name: &str) -> Result<Out<Categories>> {
    let mut ledger = open_ledger(&config, None)?;
    let added = ledger.add_category(name)?;
    let categories = ledger.data().categories().clone();
    let message = if added {
        format!("Added category '{}'", name.trim())
    } else {
        format!("The category '{}' already exists", name.trim())
    };
    Ok(Out::new(message, categories))
}

/// Removes a category. Expenses that still use it are reported but left as they are.
pub async fn category_remove(config: Config, name: &str) -> Result<Out<usize>> {
    let mut ledger = open_ledger(&config, None)?;
    let orphaned = ledger.remove_category(name)?;
    let message = match orphaned {
        0 => format!("Removed category '{name}'"),
        n => format!("Removed category '{name}', {n} expense(s) still use it"),
    };
    Ok(Out::new(message, orphaned))
}

pub async fn category_list(config: Config) -> Result<Out<Categories>> {
    let ledger = open_ledger(&config, None)?;
    let categories = ledger.data().categories().clone();
    let message = categories
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    Ok(Out::new(message, categories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add;
    use crate::args::{Args, Command};
    use crate::test::TestEnv;
    use crate::ErrorType;
    use clap::Parser;

    #[tokio::test]
    async fn test_category_commands() {
        let env = TestEnv::new().await;

        let out = category_add(env.config(), "  Pets ").await.unwrap();
        assert_eq!(out.message(), "Added category 'Pets'");
        let out = category_add(env.config(), "Pets").await.unwrap();
        assert!(out.message().contains("already exists"));

        let listed = category_list(env.config()).await.unwrap();
        assert_eq!(listed.structure().unwrap().len(), 19);
        assert!(listed.message().ends_with("Pets"));

        let parsed = Args::try_parse_from(["expense", "add", "20", "Pets"]).unwrap();
        let Command::Add(args) = parsed.command() else {
            panic!("expected add");
        };
        add(env.config(), args).await.unwrap();

        let out = category_remove(env.config(), "Pets").await.unwrap();
        assert_eq!(*out.structure().unwrap(), 1);
        assert!(out.message().contains("1 expense(s) still use it"));

        let err = category_remove(env.config(), "Pets").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_category_add_rejects_separator() {
        let env = TestEnv::new().await;
        let err = category_add(env.config(), "a;b").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
    }
}
