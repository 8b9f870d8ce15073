use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use cartcalc_core::config::AppConfig;
use cartcalc_core::{ApplicationError, LineItem, LineItemInput};
use tracing::info;

use crate::commands::{CommandResult, EXIT_FAILURE, EXIT_INPUT};

/// Prices the line item document at `item_path` (`-` reads stdin) and reports
/// every derived value.
pub fn run(config: &AppConfig, item_path: &Path) -> CommandResult {
    let input = match read_input(item_path) {
        Ok(input) => input,
        Err(error) => {
            return CommandResult::failure("price", "input", format!("{error:#}"), EXIT_INPUT)
        }
    };

    let item = match LineItem::from_input(input, &config.format) {
        Ok(item) => item,
        Err(error) => return application_failure(error.into()),
    };
    let summary = match item.summary() {
        Ok(summary) => summary,
        Err(error) => return application_failure(error.into()),
    };

    info!(
        event_name = "cli.price.completed",
        item_id = %item.id(),
        conditions = summary.condition_count,
        "line item priced"
    );

    match serde_json::to_value(&summary) {
        Ok(data) => CommandResult::success("price", "line item priced", Some(data)),
        Err(error) => {
            CommandResult::failure("price", "serialization", error.to_string(), EXIT_FAILURE)
        }
    }
}

fn read_input(path: &Path) -> Result<LineItemInput> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("could not read line item from stdin")?;
        buffer
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("could not read line item file `{}`", path.display()))?
    };

    serde_json::from_str(&raw)
        .with_context(|| format!("could not parse line item `{}`", path.display()))
}

fn application_failure(error: ApplicationError) -> CommandResult {
    CommandResult::from_application_error("price", &error)
}
