//! Error types for the CLI

use switchover_common::telemetry::TelemetryError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration or cluster error from the switchover engine
    #[error(transparent)]
    Switchover(#[from] switchover_common::Error),

    /// The tracing subscriber or log file could not be set up
    #[error("logging setup failed: {0}")]
    Telemetry(#[from] TelemetryError),
}
