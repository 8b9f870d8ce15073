pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use cartcalc_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use cartcalc_core::ApplicationError;
use clap::{Parser, Subcommand};

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "cartcalc",
    about = "Cart line item pricing calculator",
    long_about = "Compute totals, tax-adjusted prices, weight and condition-adjusted prices for a single cart line item.",
    after_help = "Examples:\n  cartcalc price --item line.json\n  cat line.json | cartcalc price --item -\n  cartcalc --format-numbers config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a cartcalc.toml file (must exist when given)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Render monetary values with the configured number format")]
    format_numbers: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price one line item document and print every derived value as JSON")]
    Price {
        #[arg(long, help = "Line item JSON document, or `-` to read stdin")]
        item: PathBuf,
    },
    #[command(about = "Print the effective configuration")]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Price { .. } => "price",
            Self::Config => "config",
        }
    }
}

pub fn run() -> ExitCode {
    let result = execute(Cli::parse());

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

pub fn execute(cli: Cli) -> CommandResult {
    let command_name = cli.command.name();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        overrides: ConfigOverrides {
            format_numbers: cli.format_numbers.then_some(true),
            ..ConfigOverrides::default()
        },
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::from_application_error(
                command_name,
                &ApplicationError::from(error),
            )
        }
    };
    logging::init(&config.logging);

    match cli.command {
        Command::Price { item } => commands::price::run(&config, &item),
        Command::Config => commands::config::run(&config),
    }
}
