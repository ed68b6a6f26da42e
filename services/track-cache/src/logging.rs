//!
//! src/logging.rs
//!
//! Initializes logger so the pipeline gives informative,
//! structured output while running
//!
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};

/// Flushes buffered log lines when dropped, hold it until exit
pub struct LoggingGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

fn filter_for(cfg: &LoggingConfig) -> Result<EnvFilter, crate::errors::PipelineError> {
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| cfg.filter_directives.clone());

    EnvFilter::try_new(&directives)
        .map_err(|e| crate::errors::PipelineError::Config(
            format!("log filter {directives:?} invalid: {e}")
        ))
}

pub fn init_logging(cfg: &LoggingConfig) ->
    Result<LoggingGuard, crate::errors::PipelineError> {

    let (writer, guard) = non_blocking(std::io::stdout());
    let filter = filter_for(cfg)?;

    let time = tracing_subscriber::fmt::time::UtcTime::rfc_3339();
    let base = fmt::layer()
        .with_writer(writer)
        .with_timer(time)
        .with_target(cfg.include_target)
        .with_file(cfg.include_file_line)
        .with_line_number(cfg.include_file_line);

    let fmt_layer = match cfg.format {
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => base
            .with_ansi(cfg.with_ansi)
            .pretty()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| crate::errors::PipelineError::Config(
            format!("logger already set: {e}")
        ))?;

    Ok( LoggingGuard(guard) )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        let cfg = LoggingConfig::default();
        assert!(filter_for(&cfg).is_ok());
    }
}
