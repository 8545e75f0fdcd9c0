//! Domain registration expiry via RDAP.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use statusboard_core::{CheckResult, Probe, Severity};

use crate::error::ProbeError;
use crate::evaluate::{elapsed_ms, whole_days};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for one [`RdapDomainProbe`].
#[derive(Debug, Clone)]
pub struct RdapCheckConfig {
    /// RDAP service root, e.g. `https://rdap.nic.ar`.
    pub base_url: String,
    pub domain: String,
    pub warning_days: i64,
    pub error_days: i64,
}

#[derive(Debug, Deserialize)]
struct RdapResponse {
    #[serde(default)]
    events: Vec<RdapEvent>,
    #[serde(default)]
    status: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapEvent {
    event_action: String,
    event_date: String,
}

pub struct RdapDomainProbe {
    id: String,
    name: String,
    config: RdapCheckConfig,
    client: reqwest::Client,
}

impl RdapDomainProbe {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: RdapCheckConfig,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            config,
            client,
        })
    }

    fn lookup_url(&self) -> String {
        format!(
            "{}/domain/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.domain
        )
    }

    async fn fetch(&self) -> Result<RdapResponse, String> {
        let response = self
            .client
            .get(self.lookup_url())
            .send()
            .await
            .map_err(|e| format!("Could not query RDAP: {e}"))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(format!(
                "RDAP responded with HTTP {}",
                response.status().as_u16()
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("Could not read RDAP response: {e}"))?;
        serde_json::from_slice(&body).map_err(|e| format!("Invalid RDAP JSON: {e}"))
    }
}

#[async_trait]
impl Probe for RdapDomainProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "rdap"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckResult {
        let started = Instant::now();
        let fetched = self.fetch().await;
        let elapsed = elapsed_ms(started);

        let data = match fetched {
            Ok(data) => data,
            Err(message) => return self.failure(message).with_latency(elapsed),
        };

        let expiration = match expiration_date(&data.events) {
            Ok(date) => date,
            Err(message) => return self.failure(message).with_latency(elapsed),
        };

        let (severity, message, days_remaining) = evaluate_expiration(
            expiration,
            Utc::now(),
            self.config.warning_days,
            self.config.error_days,
        );

        CheckResult::new(&self.id, "rdap", &self.name, severity, message)
            .with_latency(elapsed)
            .with_meta("expiration_date", expiration.format("%Y-%m-%d").to_string())
            .with_meta("days_remaining", days_remaining)
            .with_meta("domain_status", data.status.join(", "))
    }
}

/// Find and parse the `expiration` event.
fn expiration_date(events: &[RdapEvent]) -> Result<DateTime<Utc>, String> {
    let event = events
        .iter()
        .find(|e| e.event_action == "expiration")
        .ok_or_else(|| "No expiration date in RDAP response".to_string())?;

    DateTime::parse_from_rfc3339(&event.event_date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("Could not parse expiration date: {e}"))
}

/// Grade a domain by days until `expiration`.
pub fn evaluate_expiration(
    expiration: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_days: i64,
    error_days: i64,
) -> (Severity, String, i64) {
    let days = whole_days((expiration - now).num_seconds());
    let date = expiration.format("%d/%m/%Y");

    if days < 0 {
        (
            Severity::Error,
            format!("Domain expired {} days ago", -days),
            days,
        )
    } else if days <= error_days {
        (
            Severity::Error,
            format!("Domain expires very soon: {days} days left (expires {date})"),
            days,
        )
    } else if days <= warning_days {
        (
            Severity::Warning,
            format!("Domain should be renewed: {days} days left (expires {date})"),
            days,
        )
    } else {
        (
            Severity::Ok,
            format!("Domain valid, expires in {days} days ({date})"),
            days,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
