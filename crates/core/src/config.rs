use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FormatConfig;

const MAX_FORMAT_DECIMALS: u32 = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub format: FormatConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub format_numbers: Option<bool>,
    pub decimals: Option<u32>,
    pub dec_point: Option<String>,
    pub thousands_sep: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Resolves configuration with precedence overrides > env > file > defaults.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cartcalc.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(format) = patch.format {
            if let Some(format_numbers) = format.format_numbers {
                self.format.format_numbers = format_numbers;
            }
            if let Some(decimals) = format.decimals {
                self.format.decimals = decimals;
            }
            if let Some(dec_point) = format.dec_point {
                self.format.dec_point = dec_point;
            }
            if let Some(thousands_sep) = format.thousands_sep {
                self.format.thousands_sep = thousands_sep;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARTCALC_FORMAT_NUMBERS") {
            self.format.format_numbers = parse_bool("CARTCALC_FORMAT_NUMBERS", &value)?;
        }
        if let Some(value) = read_env("CARTCALC_FORMAT_DECIMALS") {
            self.format.decimals = parse_u32("CARTCALC_FORMAT_DECIMALS", &value)?;
        }
        // Read untrimmed: a lone space is a valid separator.
        if let Ok(value) = env::var("CARTCALC_FORMAT_DEC_POINT") {
            self.format.dec_point = value;
        }
        if let Ok(value) = env::var("CARTCALC_FORMAT_THOUSANDS_SEP") {
            self.format.thousands_sep = value;
        }

        let log_level =
            read_env("CARTCALC_LOGGING_LEVEL").or_else(|| read_env("CARTCALC_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTCALC_LOGGING_FORMAT").or_else(|| read_env("CARTCALC_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(format_numbers) = overrides.format_numbers {
            self.format.format_numbers = format_numbers;
        }
        if let Some(decimals) = overrides.decimals {
            self.format.decimals = decimals;
        }
        if let Some(dec_point) = overrides.dec_point {
            self.format.dec_point = dec_point;
        }
        if let Some(thousands_sep) = overrides.thousands_sep {
            self.format.thousands_sep = thousands_sep;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_format(&self.format)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cartcalc.toml"), PathBuf::from("config/cartcalc.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_format(format: &FormatConfig) -> Result<(), ConfigError> {
    if format.decimals > MAX_FORMAT_DECIMALS {
        return Err(ConfigError::Validation(format!(
            "format.decimals must be in range 0..={MAX_FORMAT_DECIMALS}"
        )));
    }

    if format.dec_point.is_empty() {
        return Err(ConfigError::Validation("format.dec_point must not be empty".to_string()));
    }

    if format.dec_point == format.thousands_sep {
        return Err(ConfigError::Validation(
            "format.dec_point and format.thousands_sep must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    format: Option<FormatPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct FormatPatch {
    format_numbers: Option<bool>,
    decimals: Option<u32>,
    dec_point: Option<String>,
    thousands_sep: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ENV_KEYS: [&str; 8] = [
        "CARTCALC_FORMAT_NUMBERS",
        "CARTCALC_FORMAT_DECIMALS",
        "CARTCALC_FORMAT_DEC_POINT",
        "CARTCALC_FORMAT_THOUSANDS_SEP",
        "CARTCALC_LOGGING_LEVEL",
        "CARTCALC_LOGGING_FORMAT",
        "CARTCALC_LOG_LEVEL",
        "CARTCALC_LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_leave_numbers_unformatted() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.format.format_numbers, "numbers should be raw by default")?;
        ensure(config.format.decimals == 0, "default decimals should be zero")?;
        ensure(config.format.dec_point == ".", "default decimal point should be a dot")?;
        ensure(config.format.thousands_sep == ",", "default thousands separator is a comma")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        env::set_var("TEST_CARTCALC_DEC_POINT", ",");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cartcalc.toml");
            fs::write(
                &path,
                r#"
[format]
format_numbers = true
decimals = 2
dec_point = "${TEST_CARTCALC_DEC_POINT}"
thousands_sep = "."
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.format.format_numbers, "formatting should be enabled from file")?;
            ensure(config.format.decimals == 2, "decimals should be loaded from file")?;
            ensure(config.format.dec_point == ",", "decimal point should come from env")?;
            ensure(config.format.thousands_sep == ".", "thousands separator from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_CARTCALC_DEC_POINT"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("cartcalc.toml");
        fs::write(&path, "[logging]\nlevel = \"${TEST_CARTCALC_UNSET_LEVEL}\"\n")
            .map_err(|err| err.to_string())?;

        let options = LoadOptions { config_path: Some(path), ..LoadOptions::default() };
        let error = match AppConfig::load(options) {
            Ok(_) => return Err("expected interpolation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(
                error,
                ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_CARTCALC_UNSET_LEVEL"
            ),
            "interpolation failure should name the variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        env::set_var("CARTCALC_LOG_LEVEL", "warn");
        env::set_var("CARTCALC_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CARTCALC_LOG_LEVEL", "CARTCALC_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        env::set_var("CARTCALC_FORMAT_DECIMALS", "3");
        env::set_var("CARTCALC_FORMAT_NUMBERS", "true");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cartcalc.toml");
            fs::write(
                &path,
                r#"
[format]
format_numbers = false
decimals = 2
thousands_sep = " "

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    dec_point: Some(",".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.format.decimals == 3, "env decimals should win over file")?;
            ensure(config.format.format_numbers, "env flag should win over file")?;
            ensure(config.format.thousands_sep == " ", "file separator should win over default")?;
            ensure(config.format.dec_point == ",", "override decimal point should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(&["CARTCALC_FORMAT_DECIMALS", "CARTCALC_FORMAT_NUMBERS"]);
        result
    }

    #[test]
    fn invalid_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        env::set_var("CARTCALC_FORMAT_NUMBERS", "sometimes");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["CARTCALC_FORMAT_NUMBERS"]);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "CARTCALC_FORMAT_NUMBERS"
            ),
            "invalid boolean should be reported with its key",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        let too_precise = ConfigOverrides { decimals: Some(11), ..ConfigOverrides::default() };
        let clashing_separators =
            ConfigOverrides { thousands_sep: Some(".".to_string()), ..ConfigOverrides::default() };
        let unknown_level =
            ConfigOverrides { log_level: Some("loud".to_string()), ..ConfigOverrides::default() };
        let cases = [
            (too_precise, "format.decimals"),
            (clashing_separators, "must differ"),
            (unknown_level, "logging.level"),
        ];

        for (overrides, fragment) in cases {
            let error = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains(fragment)
            );
            ensure(has_message, "validation failure should name the offending field")?;
        }
        Ok(())
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&ENV_KEYS);

        let missing = PathBuf::from("does-not-exist/cartcalc.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(ref path)) if *path == missing),
            "missing required file should be reported",
        )
    }
}
