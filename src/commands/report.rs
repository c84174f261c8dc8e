use crate::commands::{open_ledger, Out};
use crate::error::{ErrorType, IntoResult};
use crate::{report as text, Config, Error, Result};
use anyhow::Context;

/// Renders the plain-text report. With `save` the report is also written into the downloads
/// directory.
pub async fn report(config: Config, save: bool) -> Result<Out<String>> {
    let ledger = open_ledger(&config, None)?;
    let rendered = text::render(&ledger.data(), config.currency());
    let Some(rendered) = rendered else {
        return Err(Error::msg(
            ErrorType::Request,
            "There are no expenses to report on",
        ));
    };
    if !save {
        return Ok(Out::new(rendered.clone(), rendered));
    }

    let path = config
        .picker(None)
        .download(text::REPORT_FILE_NAME, &rendered)
        .await
        .context("Unable to save the report")
        .pub_result(ErrorType::Storage)?;
    Ok(Out::new(
        format!("{rendered}\n\nSaved the report to {}", path.display()),
        rendered,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add;
    use crate::args::{Args, Command};
    use crate::test::TestEnv;
    use clap::Parser;

    #[tokio::test]
    async fn test_report() {
        let env = TestEnv::new().await;
        let err = report(env.config(), false).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);

        let parsed =
            Args::try_parse_from(["expense", "add", "1234.5", "🍔 Food & Dining", "-d", "Feast"])
                .unwrap();
        let Command::Add(args) = parsed.command() else {
            panic!("expected add");
        };
        add(env.config(), args).await.unwrap();

        let out = report(env.config(), true).await.unwrap();
        assert!(out.message().contains("Total Expenses: ₹1,234.50"), "{}", out.message());
        assert!(out.message().contains("Saved the report to"));
        let saved: Vec<_> = std::fs::read_dir(env.config().downloads_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].starts_with("expenses_report."), "{saved:?}");
    }
}
