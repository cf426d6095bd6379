use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// Top-level configuration settings for the module.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub hub: HubSettings,
    pub relay: RelaySettings,
}

/// Connection settings for the edge hub transport.
///
/// `url` overrides the address derived from the edge runtime environment.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HubSettings {
    pub url: Option<String>,
    pub port: u16,
    pub send_timeout_ms: u64,
}

/// Behaviour of the outbound relay loop.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct RelaySettings {
    /// Send everything still queued before stopping on cancellation.
    pub drain_on_shutdown: bool,
}

#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub hub: Option<PartialHubSettings>,
    pub relay: Option<PartialRelaySettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHubSettings {
    pub url: Option<String>,
    pub port: Option<u16>,
    pub send_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRelaySettings {
    pub drain_on_shutdown: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hub: HubSettings {
                url: None,
                port: 8084,
                send_timeout_ms: 30_000,
            },
            relay: RelaySettings::default(),
        }
    }
}

/// Log levels selectable from the command line or `EDGE_MODULE_LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" | "CRITICAL" | "FATAL" => Ok(LogLevel::Error),
            other => Err(other.to_string()),
        }
    }
}

/// The four fixed log line layouts, selected by `VERBOSITY=0..3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// `<thread> [LEVEL] - message`
    Minimal,
    /// `<thread> time [LEVEL] target - message`
    Target,
    /// `<thread> time [LEVEL] file:line - message`
    #[default]
    Location,
    /// `time.ms LEVEL [thread] [file::target@line] message`
    Full,
}

impl LogFormat {
    /// Unknown or missing selectors fall back to `Location`.
    pub fn from_verbosity(verbosity: Option<&str>) -> Self {
        match verbosity.map(str::trim) {
            Some("0") => LogFormat::Minimal,
            Some("1") => LogFormat::Target,
            Some("3") => LogFormat::Full,
            _ => LogFormat::Location,
        }
    }
}

/// Fully resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}
