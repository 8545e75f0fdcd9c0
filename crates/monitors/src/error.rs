use std::time::Duration;

/// Failure inside a probe.
///
/// Never escapes a probe: [`Probe::check`](statusboard_core::Probe::check)
/// converts it into an error-severity check result. Kept typed so messages
/// stay consistent across probes.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Parse(String),
}
