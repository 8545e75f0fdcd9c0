//! TLS certificate expiry evaluation.

use chrono::Utc;
use statusboard_core::Severity;
use x509_parser::prelude::*;

use crate::evaluate::whole_days;

/// Outcome of inspecting a server certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsFinding {
    pub severity: Severity,
    pub message: String,
    pub days_remaining: i64,
}

/// Evaluate the DER-encoded leaf certificate presented by a server.
///
/// `None` means the connection did not use TLS at all.
pub fn evaluate_peer_certificate(der: Option<&[u8]>, warning_days: i64) -> TlsFinding {
    let Some(der) = der else {
        return TlsFinding {
            severity: Severity::Warning,
            message: "Connection does not use TLS".into(),
            days_remaining: 0,
        };
    };

    match X509Certificate::from_der(der) {
        Ok((_, cert)) => {
            let not_after = cert.validity().not_after.timestamp();
            evaluate_expiry(not_after, Utc::now().timestamp(), warning_days)
        }
        Err(e) => TlsFinding {
            severity: Severity::Error,
            message: format!("Could not parse TLS certificate: {e}"),
            days_remaining: 0,
        },
    }
}

/// Classify a certificate by its `notAfter` (unix seconds) relative to `now`.
pub fn evaluate_expiry(not_after: i64, now: i64, warning_days: i64) -> TlsFinding {
    if now > not_after {
        return TlsFinding {
            severity: Severity::Error,
            message: "TLS certificate expired".into(),
            days_remaining: 0,
        };
    }

    let days_remaining = whole_days(not_after - now);
    if days_remaining <= warning_days {
        TlsFinding {
            severity: Severity::Warning,
            message: format!("TLS certificate expires soon (in {days_remaining} days)"),
            days_remaining,
        }
    } else {
        TlsFinding {
            severity: Severity::Ok,
            message: "TLS certificate valid".into(),
            days_remaining,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
