//! Tracing subscriber setup.
//!
//! One fmt layer is built for the selected `LogFormat`. Output always goes to
//! stdout and is teed into the log file when one is configured.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::config::{LogFormat, LoggingSettings};
use crate::utils::error::LoggingError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber.
///
/// Returns `AlreadyInstalled` when a subscriber exists, so tests and
/// libraries can call this more than once.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let writer = make_writer(settings)?;
    let ansi = settings.file.is_none();

    Registry::default()
        .with(format_layer(settings.format, writer, ansi))
        .with(LevelFilter::from_level(settings.level.as_tracing_level()))
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}

fn make_writer(settings: &LoggingSettings) -> Result<BoxMakeWriter, LoggingError> {
    let Some(path) = &settings.file else {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::LogFile {
            path: path.display().to_string(),
            source,
        })?;

    Ok(BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))))
}

fn format_layer(format: LogFormat, writer: BoxMakeWriter, ansi: bool) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_thread_ids(true);

    match format {
        LogFormat::Minimal => layer.without_time().with_target(false).boxed(),
        LogFormat::Target => layer.with_target(true).boxed(),
        LogFormat::Location => layer
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Full => layer
            .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
            .with_thread_names(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    }
}
