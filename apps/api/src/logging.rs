//! Log sink construction.
//!
//! [`LoggingContext`] is a self-contained subscriber built from
//! [`LoggingSettings`]; nothing global is touched until the binary installs
//! it. The sink stack sits behind a reload layer, so reconfiguring swaps the
//! sinks instead of stacking new ones on top.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, Dispatch};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

use crate::config::{LogLevel, LogRotation, LoggingSettings};

/// Field that marks an `error!` event as CRITICAL, e.g.
/// `error!(critical = true, "...")`. At the CRITICAL level only marked events
/// are written.
pub const CRITICAL_FIELD: &str = "critical";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Error)]
pub enum LoggingSetupError {
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log file {path} for append: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialise rolling log file: {0}")]
    Appender(#[from] rolling::InitError),

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),

    #[error("Failed to reconfigure log sinks: {0}")]
    Reload(#[from] reload::Error),
}

/// The filter and writer layers for one configuration, plus the guards that
/// keep their background writers alive.
struct LogSinks {
    layer: BoxedLayer,
    guards: Vec<WorkerGuard>,
}

impl LogSinks {
    fn build(settings: &LoggingSettings) -> Result<Self, LoggingSetupError> {
        let mut writers: Vec<BoxedLayer> = Vec::new();
        let mut guards = Vec::new();

        if settings.console {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            writers.push(format_layer(settings.json, writer, true));
        }

        if let Some(path) = &settings.file {
            let appender = open_file_appender(path, settings)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            writers.push(format_layer(settings.json, writer, false));
        }

        let critical_only = settings.level == LogLevel::Critical;
        let critical_gate = filter_fn(move |meta| {
            !critical_only || !meta.is_event() || meta.fields().field(CRITICAL_FIELD).is_some()
        });

        let layer = level_filter(settings)
            .and_then(critical_gate)
            .and_then(writers)
            .boxed();
        Ok(LogSinks { layer, guards })
    }
}

fn level_filter(settings: &LoggingSettings) -> EnvFilter {
    let level = LevelFilter::from_level(settings.level.as_tracing());
    let mut filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy("");
    // Keep connection-level chatter out of the application log.
    if level >= LevelFilter::INFO {
        for directive in ["hyper=warn", "h2=warn"] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

fn format_layer<W>(json: bool, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer().with_ansi(ansi).with_writer(writer).boxed()
    }
}

fn open_file_appender(
    path: &Path,
    settings: &LoggingSettings,
) -> Result<RollingFileAppender, LoggingSetupError> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| LoggingSetupError::OpenFile {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })?;

    fs::create_dir_all(&directory).map_err(|source| LoggingSetupError::CreateDirectory {
        path: directory.clone(),
        source,
    })?;

    // The appender opens lazily; check now so a bad path fails at startup.
    // Rotating appenders never write to the bare path, so only the directory
    // is checked for them.
    if settings.rotation == LogRotation::Never {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LoggingSetupError::OpenFile {
                path: path.to_path_buf(),
                source,
            })?;
    } else {
        let scratch = directory.join(format!(".{file_name}.write-check"));
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&scratch)
            .and_then(|_| fs::remove_file(&scratch))
            .map_err(|source| LoggingSetupError::OpenFile {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let rotation = match settings.rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name);
    if settings.retention_count > 0 && settings.rotation != LogRotation::Never {
        builder = builder.max_log_files(settings.retention_count);
    }
    Ok(builder.build(directory)?)
}

/// An explicitly constructed logger. Scope it with
/// `tracing::dispatcher::set_default(&ctx.dispatch())`, or make it the process
/// default with [`LoggingContext::install_global`]. Dropping it flushes the
/// sinks.
pub struct LoggingContext {
    dispatch: Dispatch,
    handle: reload::Handle<BoxedLayer, Registry>,
    guards: Vec<WorkerGuard>,
}

impl LoggingContext {
    pub fn new(settings: &LoggingSettings) -> Result<Self, LoggingSetupError> {
        let LogSinks { layer, guards } = LogSinks::build(settings)?;
        let (reloadable, handle) = reload::Layer::<BoxedLayer, Registry>::new(layer);

        let ctx = LoggingContext {
            dispatch: Dispatch::new(Registry::default().with(reloadable)),
            handle,
            guards,
        };
        ctx.announce(settings);
        Ok(ctx)
    }

    /// Replaces every sink with the ones `settings` asks for.
    pub fn reconfigure(&mut self, settings: &LoggingSettings) -> Result<(), LoggingSetupError> {
        let LogSinks { layer, guards } = LogSinks::build(settings)?;
        self.handle.reload(layer)?;
        // Dropping the previous guards flushes and closes the old writers.
        self.guards = guards;
        self.announce(settings);
        Ok(())
    }

    /// Fails if some subscriber, this one included, is already global.
    pub fn install_global(&self) -> Result<(), LoggingSetupError> {
        tracing::dispatcher::set_global_default(self.dispatch())?;
        Ok(())
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    fn announce(&self, settings: &LoggingSettings) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            info!(
                level = %settings.level,
                file = ?settings.file,
                console = settings.console,
                json = settings.json,
                "logging configured"
            );
        });
    }
}
