//! PostgreSQL health probe behind a private-network reachability gate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use statusboard_core::{CheckResult, Probe, Severity};
use tokio::net::TcpStream;

use crate::error::ProbeError;
use crate::evaluate::elapsed_ms;
use crate::target::DatabaseTarget;

/// Deadline shared by connect and both queries.
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_VPN_TIMEOUT_MS: u64 = 2000;

/// Settings for one [`PostgresProbe`].
#[derive(Debug, Clone)]
pub struct PostgresCheckConfig {
    pub target: DatabaseTarget,
    /// Query returning a single `bigint`, e.g. `SELECT COUNT(*) FROM users`.
    pub count_query: String,
    /// Host used for the reachability check. Defaults to the database host.
    pub vpn_check_host: Option<String>,
    pub vpn_timeout_ms: u64,
}

pub struct PostgresProbe {
    id: String,
    name: String,
    config: PostgresCheckConfig,
    timeout: Duration,
}

impl PostgresProbe {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: PostgresCheckConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config,
            timeout: CHECK_TIMEOUT,
        }
    }

    /// Override the deadline for connecting and querying.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn vpn_host(&self) -> &str {
        self.config
            .vpn_check_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&self.config.target.host)
    }

    fn vpn_timeout(&self) -> Duration {
        match self.config.vpn_timeout_ms {
            0 => Duration::from_millis(DEFAULT_VPN_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    async fn connect(&self, deadline: tokio::time::Instant) -> Result<PgConnection, ProbeError> {
        let target = &self.config.target;
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .password(&target.password)
            .database(&target.database);

        tokio::time::timeout_at(deadline, PgConnection::connect_with(&options))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(ProbeError::from)
    }

    async fn count_rows(
        &self,
        conn: &mut PgConnection,
        deadline: tokio::time::Instant,
    ) -> Result<i64, ProbeError> {
        let query = sqlx::query_scalar::<_, i64>(&self.config.count_query).fetch_one(conn);
        tokio::time::timeout_at(deadline, query)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(ProbeError::from)
    }

    /// Server version, or an empty string if it cannot be read in time.
    async fn server_version(
        &self,
        conn: &mut PgConnection,
        deadline: tokio::time::Instant,
    ) -> String {
        let query = sqlx::query_scalar::<_, String>("SHOW server_version").fetch_one(conn);
        match tokio::time::timeout_at(deadline, query).await {
            Ok(Ok(version)) => version,
            Ok(Err(e)) => {
                tracing::debug!(probe = %self.id, error = %e, "PostgreSQL version query failed");
                String::new()
            }
            Err(_) => {
                tracing::debug!(probe = %self.id, "PostgreSQL version query timed out");
                String::new()
            }
        }
    }

    async fn close(&self, conn: PgConnection) {
        match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(probe = %self.id, error = %e, "PostgreSQL close failed"),
            Err(_) => tracing::debug!(probe = %self.id, "PostgreSQL close timed out"),
        }
    }
}

/// Whether a TCP connection to `host:port` can be opened within `timeout`.
pub async fn tcp_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[async_trait]
impl Probe for PostgresProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "database"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckResult {
        let port = self.config.target.port;
        let vpn_host = self.vpn_host().to_string();
        let reachable = tcp_reachable(&vpn_host, port, self.vpn_timeout()).await;

        if !reachable {
            tracing::debug!(probe = %self.id, host = %vpn_host, port, "Private network unreachable");
            return self
                .failure(format!(
                    "Private network (VPN) unreachable, cannot access {vpn_host}:{port}"
                ))
                .with_meta("vpn_check_host", vpn_host)
                .with_meta("vpn_available", false)
                .with_meta("error_type", "vpn_unavailable");
        }

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut conn = match self.connect(deadline).await {
            Ok(conn) => conn,
            Err(e) => {
                return self
                    .failure(format!("Could not connect to PostgreSQL: {e}"))
                    .with_latency(elapsed_ms(started))
                    .with_meta("vpn_check_host", vpn_host)
                    .with_meta("vpn_available", true)
                    .with_meta("error_type", "connection_failed");
            }
        };

        let counted = self.count_rows(&mut conn, deadline).await;
        let elapsed = elapsed_ms(started);

        let row_count = match counted {
            Ok(count) => count,
            Err(e) => {
                self.close(conn).await;
                return self
                    .failure(format!("Count query failed: {e}"))
                    .with_latency(elapsed)
                    .with_meta("vpn_check_host", vpn_host)
                    .with_meta("vpn_available", true)
                    .with_meta("error_type", "query_failed");
            }
        };

        let server_version = self.server_version(&mut conn, deadline).await;
        self.close(conn).await;

        CheckResult::new(
            &self.id,
            "database",
            &self.name,
            Severity::Ok,
            format!("PostgreSQL connection healthy, {row_count} rows counted ({elapsed}ms)"),
        )
        .with_latency(elapsed)
        .with_meta("vpn_check_host", vpn_host)
        .with_meta("vpn_available", true)
        .with_meta("database", self.config.target.database.as_str())
        .with_meta("server_version", server_version)
        .with_meta("row_count", row_count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use statusboard_core::MetadataValue;
    use tokio::net::TcpListener;

    use super::*;

    fn config(port: u16) -> PostgresCheckConfig {
        PostgresCheckConfig {
            target: DatabaseTarget {
                host: "127.0.0.1".into(),
                port,
                user: "monitor".into(),
                password: "secret".into(),
                database: "app".into(),
            },
            count_query: "SELECT COUNT(*) FROM users".into(),
            vpn_check_host: None,
            vpn_timeout_ms: 500,
        }
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn reachability_detects_open_and_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        assert!(tcp_reachable("127.0.0.1", open, Duration::from_millis(500)).await);

        let closed = closed_port().await;
        assert!(!tcp_reachable("127.0.0.1", closed, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn unreachable_network_is_reported_as_vpn_unavailable() {
        let probe = PostgresProbe::new("postgres-check", "Database", config(closed_port().await));
        let result = probe.check().await;

        assert_eq!(result.severity, Severity::Error);
        assert_eq!(result.kind, "database");
        assert_eq!(
            result.metadata.get("error_type"),
            Some(&MetadataValue::Text("vpn_unavailable".into()))
        );
        assert_eq!(
            result.metadata.get("vpn_available"),
            Some(&MetadataValue::Bool(false))
        );
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        port
    }

    #[tokio::test]
    async fn silent_server_fails_within_the_deadline() {
        let port = silent_server().await;
        let probe = PostgresProbe::new("postgres-check", "Database", config(port))
            .with_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), probe.check())
            .await
            .expect("check must respect its own deadline");

        assert_eq!(result.severity, Severity::Error);
        assert!(result.message.contains("timed out after 200ms"), "{}", result.message);
        assert_eq!(
            result.metadata.get("vpn_available"),
            Some(&MetadataValue::Bool(true))
        );
    }

    #[test]
    fn vpn_host_falls_back_to_database_host() {
        let mut cfg = config(5432);
        assert_eq!(PostgresProbe::new("p", "P", cfg.clone()).vpn_host(), "127.0.0.1");

        cfg.vpn_check_host = Some("10.0.0.1".into());
        assert_eq!(PostgresProbe::new("p", "P", cfg.clone()).vpn_host(), "10.0.0.1");

        cfg.vpn_check_host = Some(String::new());
        cfg.vpn_timeout_ms = 0;
        let probe = PostgresProbe::new("p", "P", cfg);
        assert_eq!(probe.vpn_host(), "127.0.0.1");
        assert_eq!(probe.vpn_timeout(), Duration::from_millis(DEFAULT_VPN_TIMEOUT_MS));
    }
}
