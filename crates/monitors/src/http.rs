//! HTTP reachability probe with latency, content and TLS expiry checks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use statusboard_core::{CheckResult, Probe, Severity};

use crate::error::ProbeError;
use crate::evaluate::{elapsed_ms, missing_content, response_time_severity};
use crate::tls::evaluate_peer_certificate;

/// Maximum number of body bytes inspected for expected content.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Request timeout used when the configured value is zero.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for one [`HttpProbe`].
#[derive(Debug, Clone)]
pub struct HttpCheckConfig {
    pub url: String,
    /// Snippets that must all appear in a 2xx body.
    pub expected_content: Vec<String>,
    pub validate_tls: bool,
    /// Accept self-signed or otherwise invalid certificates.
    pub skip_tls_verification: bool,
    pub tls_warning_days: i64,
    pub warning_ms: i64,
    pub error_ms: i64,
    pub timeout_secs: u64,
}

/// Probe that fetches a URL once and grades the response.
pub struct HttpProbe {
    id: String,
    name: String,
    config: HttpCheckConfig,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: HttpCheckConfig,
    ) -> Result<Self, ProbeError> {
        let timeout = match config.timeout_secs {
            0 => DEFAULT_TIMEOUT_SECS,
            secs => secs,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .danger_accept_invalid_certs(config.skip_tls_verification)
            .tls_info(true)
            .build()?;

        Ok(Self {
            id: id.into(),
            name: name.into(),
            config,
            client,
        })
    }

    async fn read_capped(mut response: reqwest::Response) -> Result<String, ProbeError> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = MAX_BODY_BYTES - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= MAX_BODY_BYTES {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckResult {
        let started = Instant::now();
        let sent = self.client.get(&self.config.url).send().await;
        let elapsed = elapsed_ms(started);

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(probe = %self.id, error = %e, "HTTP probe could not connect");
                return self
                    .failure(format!("Could not connect: {e}"))
                    .with_latency(elapsed);
            }
        };

        let status = response.status();
        let peer_cert = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(<[u8]>::to_vec);

        let mut findings = Findings::default();
        let mut result = CheckResult::new(&self.id, "http", &self.name, Severity::Ok, "")
            .with_latency(elapsed);

        if status.is_server_error() {
            findings.note(Severity::Error, format!("Server error (HTTP {})", status.as_u16()));
        } else if !status.is_success() {
            findings.note(
                Severity::Warning,
                format!("Unexpected HTTP status: {}", status.as_u16()),
            );
        }

        let timing = response_time_severity(elapsed, self.config.warning_ms, self.config.error_ms);
        result = result.with_meta("response_time_status", timing.as_str());
        match timing {
            Severity::Error => findings.note(timing, format!("Response time very high: {elapsed}ms")),
            Severity::Warning => findings.note(timing, format!("Response time elevated: {elapsed}ms")),
            Severity::Ok => {}
        }

        if !self.config.expected_content.is_empty() && status.is_success() {
            match Self::read_capped(response).await {
                Ok(body) => {
                    let missing = missing_content(&body, &self.config.expected_content);
                    result = result.with_meta("content_validated", missing.is_none());
                    if let Some(snippet) = missing {
                        findings.note(
                            Severity::Error,
                            format!("Expected content not found: {snippet}"),
                        );
                    }
                }
                Err(e) => findings.note(Severity::Error, format!("Could not read body: {e}")),
            }
        }

        if self.config.skip_tls_verification {
            result = result
                .with_meta("ssl_status", "skipped")
                .with_meta("ssl_verification_skipped", true);
        } else if self.config.validate_tls {
            let tls = evaluate_peer_certificate(peer_cert.as_deref(), self.config.tls_warning_days);
            result = result
                .with_meta("ssl_status", tls.severity.as_str())
                .with_meta("ssl_days_remaining", tls.days_remaining);
            if tls.severity != Severity::Ok {
                findings.note(tls.severity, tls.message);
            }
        }

        let status_line = status.to_string();
        result.severity = findings.worst;
        result.message = findings.into_message(&status_line, elapsed);
        result
    }
}

/// Accumulates issues found while grading one response.
#[derive(Debug, Default)]
struct Findings {
    worst: Severity,
    issues: Vec<String>,
}

impl Findings {
    fn note(&mut self, severity: Severity, issue: String) {
        self.worst.escalate(severity);
        self.issues.push(issue);
    }

    fn into_message(self, status_line: &str, elapsed_ms: i64) -> String {
        if self.issues.is_empty() {
            format!("Site reachable and healthy (HTTP {status_line}, {elapsed_ms}ms)")
        } else {
            format!("HTTP {status_line} - Issues: {}", self.issues.join("; "))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> HttpCheckConfig {
        HttpCheckConfig {
            url: url.into(),
            expected_content: Vec::new(),
            validate_tls: false,
            skip_tls_verification: false,
            tls_warning_days: 30,
            warning_ms: 2000,
            error_ms: 5000,
            timeout_secs: 1,
        }
    }

    #[test]
    fn findings_keep_worst_severity() {
        let mut findings = Findings::default();
        findings.note(Severity::Warning, "slow".into());
        findings.note(Severity::Error, "missing".into());
        findings.note(Severity::Warning, "cert".into());

        assert_eq!(findings.worst, Severity::Error);
        assert_eq!(
            findings.into_message("200 OK", 10),
            "HTTP 200 OK - Issues: slow; missing; cert"
        );
    }

    #[test]
    fn healthy_message_includes_latency() {
        let findings = Findings::default();
        assert_eq!(findings.worst, Severity::Ok);
        assert_eq!(
            findings.into_message("200 OK", 42),
            "Site reachable and healthy (HTTP 200 OK, 42ms)"
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let probe = HttpProbe::new("http-check", "Website", config("http://127.0.0.1:9/")).unwrap();
        let result = probe.check().await;

        assert_eq!(result.severity, Severity::Error);
        assert!(result.message.starts_with("Could not connect"));
        assert_eq!(result.kind, "http");
    }
}
