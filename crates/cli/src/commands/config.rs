use cartcalc_core::config::AppConfig;
use serde_json::json;

use crate::commands::CommandResult;

/// Reports the effective configuration after file, env and flag overrides.
pub fn run(config: &AppConfig) -> CommandResult {
    let data = json!({
        "format": config.format,
        "logging": {
            "level": config.logging.level,
            "format": config.logging.format,
        },
    });

    CommandResult::success(
        "config",
        "effective config (source precedence: flags > env > file > default)",
        Some(data),
    )
}
