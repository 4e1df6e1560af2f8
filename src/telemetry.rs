use std::str::FromStr;

use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    config::{LogFormat, LoggingSettings},
    error::EmailError,
};

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), EmailError> {
    let level = tracing::level_filters::LevelFilter::from_str(&logging.level).map_err(|_| {
        EmailError::configuration(format!("invalid log level `{}`", logging.level))
    })?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            EmailError::configuration(format!("failed to install tracing subscriber: {err}"))
        })
}
