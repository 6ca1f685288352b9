use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, fmt::time::OffsetTime, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Install the subscriber for `format`, which must already be resolved.
pub(crate) fn install(cfg: &LoggerConfig, format: LoggerFormat) -> Result<(), LoggerError> {
    let filter = parse_filter(&cfg.level)?;
    let output = output_layer(cfg, format)?;

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("global default") {
                LoggerError::AlreadyInitialized
            } else {
                LoggerError::Setup(s)
            }
        })
}

fn output_layer<S>(cfg: &LoggerConfig, format: LoggerFormat) -> Result<BoxedLayer<S>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(cfg.with_targets)
        .with_timer(local_rfc3339());

    match format {
        LoggerFormat::Text | LoggerFormat::Auto => Ok(stderr.with_ansi(cfg.use_color).boxed()),
        LoggerFormat::Json => Ok(stderr.json().with_ansi(false).boxed()),
        LoggerFormat::Journald => journald_layer(cfg),
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(directive).map_err(|e| LoggerError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer<S>(cfg: &LoggerConfig) -> Result<BoxedLayer<S>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::Setup(format!("journald: {e}")))?
        .with_syslog_identifier(cfg.syslog_identifier.clone());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer<S>(_cfg: &LoggerConfig) -> Result<BoxedLayer<S>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    Err(LoggerError::JournaldNotSupported)
}
