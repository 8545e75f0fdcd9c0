//! Severity levels for individual checks and aggregated systems.

use serde::{Deserialize, Serialize};

/// Outcome severity of a single probe.
///
/// Ordered `Ok < Warning < Error`, so the worst of several findings is
/// simply their maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Error,
}

impl Severity {
    /// Lowercase wire name (`"ok"`, `"warning"`, `"error"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Raise `self` to `other` if `other` is worse.
    pub fn escalate(&mut self, other: Severity) {
        if other > *self {
            *self = other;
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated status of a monitored system.
///
/// Identical to [`Severity`] plus `Unknown`, which is only reachable when a
/// system has no check results at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Ok,
    Warning,
    Error,
    Unknown,
}

impl SystemStatus {
    /// Aggregate a sequence of check severities.
    ///
    /// `Error` if any is an error, else `Warning` if any is a warning, else
    /// `Ok` if there is at least one, else `Unknown`.
    pub fn aggregate<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        severities
            .into_iter()
            .max()
            .map(SystemStatus::from)
            .unwrap_or(SystemStatus::Unknown)
    }
}

impl From<Severity> for SystemStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Ok => SystemStatus::Ok,
            Severity::Warning => SystemStatus::Warning,
            Severity::Error => SystemStatus::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
