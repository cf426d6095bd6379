mod settings;

use std::path::PathBuf;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    HubSettings, LogFormat, LogLevel, LoggingSettings, RelaySettings, Settings,
};

/// Environment variable that overrides the command-line log level.
pub const LOG_LEVEL_ENV: &str = "EDGE_MODULE_LOG_LEVEL";

/// Environment variable selecting the log line format.
pub const VERBOSITY_ENV: &str = "VERBOSITY";

/// Loads the configuration from `config/default` and `EDGE_RELAY__*`
/// environment variables, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit base file name (extension optional).
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("EDGE_RELAY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    let partial: PartialSettings = config.try_deserialize()?;

    let default = Settings::default();

    Ok(Settings {
        hub: HubSettings {
            url: partial
                .hub
                .as_ref()
                .and_then(|h| h.url.clone())
                .or(default.hub.url),
            port: partial
                .hub
                .as_ref()
                .and_then(|h| h.port)
                .unwrap_or(default.hub.port),
            send_timeout_ms: partial
                .hub
                .as_ref()
                .and_then(|h| h.send_timeout_ms)
                .unwrap_or(default.hub.send_timeout_ms),
        },
        relay: RelaySettings {
            drain_on_shutdown: partial
                .relay
                .as_ref()
                .and_then(|r| r.drain_on_shutdown)
                .unwrap_or(default.relay.drain_on_shutdown),
        },
    })
}

/// Applies the environment override on top of the command-line level.
///
/// An unsupported override is not fatal: a warning is printed and the level
/// falls back to `Info`.
pub fn resolve_log_level(cli: LogLevel, env_override: Option<&str>) -> LogLevel {
    let Some(raw) = env_override else {
        return cli;
    };

    match raw.parse::<LogLevel>() {
        Ok(level) => level,
        Err(bad) => {
            println!(
                "Loglevel cannot be set to {bad}. Choices are 'DEBUG', 'INFO', 'WARNING', 'ERROR'. Setting to default 'INFO' level."
            );
            LogLevel::Info
        }
    }
}

/// Resolves the logging settings from the command line and the process
/// environment (`EDGE_MODULE_LOG_LEVEL`, `VERBOSITY`).
pub fn logging_settings(cli_level: LogLevel, log_file: Option<PathBuf>) -> LoggingSettings {
    let env_level = std::env::var(LOG_LEVEL_ENV).ok();
    let verbosity = std::env::var(VERBOSITY_ENV).ok();

    LoggingSettings {
        level: resolve_log_level(cli_level, env_level.as_deref()),
        file: log_file,
        format: LogFormat::from_verbosity(verbosity.as_deref()),
    }
}
