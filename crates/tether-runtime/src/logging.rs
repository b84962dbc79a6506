//! Installs the global `tracing` subscriber from [`LoggingConfig`].
//!
//! The runtime calls [`init_from_config`] while building unless told not to.
//! `RUST_LOG`, when set, replaces the configured level; per-target
//! `logging.filters` are layered on top of either.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// Span events written alongside regular log lines.
///
/// Registration runs inside the `pre_register` and `register` spans, so
/// [`SpanEvents::LIFECYCLE`] shows how long each pass took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    fn fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the subscriber described by `config`.
///
/// A subscriber installed earlier, by a test harness or the host, is kept.
pub fn init_from_config(config: &LoggingConfig) {
    if let Err(err) = LoggingBuilder::from_config(config).try_init() {
        debug!(error = %err, "Logging already initialized, keeping the existing subscriber");
    }
}

/// The resolved subscriber settings.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    thread_ids: bool,
    file_location: bool,
    file_path: Option<PathBuf>,
    max_files: usize,
}

impl LoggingBuilder {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.to_tracing_level(),
            directives: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            file_path: config.file_path.clone(),
            max_files: config.max_files as usize,
        }
    }

    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()));
        self.directives
            .iter()
            .fold(base, |filter, directive| match directive.parse() {
                Ok(d) => filter.add_directive(d),
                Err(_) => {
                    eprintln!("ignoring invalid log directive: {directive}");
                    filter
                }
            })
    }

    /// Daily-rotated file at `path`, keeping at most `max_files` of them.
    fn rolling_file(&self, path: &Path) -> Option<RollingFileAppender> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .unwrap_or_else(|| OsStr::new("tether.log"))
            .to_string_lossy()
            .into_owned();
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .max_log_files(self.max_files.max(1))
            .build(dir)
            .map_err(|e| eprintln!("failed to open log file {}: {e}", path.display()))
            .ok()
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.filter();
        let spans = self.span_events.fmt_span();

        macro_rules! styled {
            ($layer:expr) => {
                $layer
                    .with_span_events(spans.clone())
                    .with_target(true)
                    .with_thread_ids(self.thread_ids)
                    .with_file(self.file_location)
                    .with_line_number(self.file_location)
            };
        }

        macro_rules! install {
            ($writer:expr) => {{
                let registry = tracing_subscriber::registry().with(filter);
                match self.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => registry
                        .with(fmt::layer().json().with_span_events(spans).with_writer($writer))
                        .try_init(),
                    #[cfg(not(feature = "json-log"))]
                    LogFormat::Json => {
                        let result = registry
                            .with(styled!(fmt::layer().with_writer($writer)))
                            .try_init();
                        warn!("JSON logging needs the `json-log` feature, writing full lines");
                        result
                    }
                    LogFormat::Compact => registry
                        .with(styled!(fmt::layer().compact().with_writer($writer)))
                        .try_init(),
                    LogFormat::Full => registry
                        .with(styled!(fmt::layer().with_writer($writer)))
                        .try_init(),
                    LogFormat::Pretty => registry
                        .with(styled!(fmt::layer().pretty().with_writer($writer)))
                        .try_init(),
                }
            }};
        }

        match self.output {
            LogOutput::Stdout => install!(std::io::stdout),
            LogOutput::Stderr => install!(std::io::stderr),
            LogOutput::File => match self.file_path.as_deref().and_then(|p| self.rolling_file(p)) {
                Some(appender) => install!(appender),
                None => {
                    let result = install!(std::io::stdout);
                    warn!("No usable log file configured, writing to stdout");
                    result
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events_from_config() {
        assert_eq!(SpanEvents::default(), SpanEvents::NONE);
        assert_eq!(SpanEvents::NONE.fmt_span(), FmtSpan::NONE);
        let config = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        let events = SpanEvents::from(&config);
        assert_eq!(events, SpanEvents::LIFECYCLE);
        assert_eq!(events.fmt_span(), FmtSpan::NEW | FmtSpan::CLOSE);
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            file_location: true,
            max_files: 3,
            ..Default::default()
        };
        config.filters.insert("tether_framework".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert!(builder.file_location);
        assert_eq!(builder.max_files, 3);
        assert_eq!(builder.directives, vec!["tether_framework=trace".to_string()]);
    }
}
