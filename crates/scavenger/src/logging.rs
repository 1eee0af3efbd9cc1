//! Logging initialisation

use crate::error::AppError;
use crate::settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
pub fn init_logging(settings: &LoggingSettings) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let result = match settings.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    result.map_err(|e| AppError::Logging(e.to_string()))
}
