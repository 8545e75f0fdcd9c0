//! SQL Server Database Mail queue health.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use statusboard_core::{CheckResult, Probe, Severity};
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::ProbeError;
use crate::evaluate::elapsed_ms;
use crate::target::DatabaseTarget;

/// Deadline shared by connect and the queue query.
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

type SqlClient = Client<Compat<TcpStream>>;

const RECENT_MAIL_QUERY: &str = "
    SELECT TOP 10
        mailitem_id,
        CASE sent_status
            WHEN 0 THEN 'unsent'
            WHEN 1 THEN 'sent'
            WHEN 3 THEN 'retrying'
            ELSE 'failed'
        END AS sent_status,
        sent_date
    FROM msdb.dbo.sysmail_mailitems
    ORDER BY mailitem_id DESC";

/// Settings for one [`MailQueueProbe`].
#[derive(Debug, Clone)]
pub struct MailCheckConfig {
    pub target: DatabaseTarget,
    pub max_minutes_without_sent: i64,
    pub max_failed_count: usize,
    pub max_unsent_count: usize,
}

/// One row of the recent mail window.
#[derive(Debug, Clone, PartialEq)]
pub struct MailItem {
    pub status: String,
    pub sent_date: Option<NaiveDateTime>,
}

/// Status counts over the recent mail window.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MailSummary {
    pub sent: usize,
    pub unsent: usize,
    pub retrying: usize,
    pub failed: usize,
    /// Most recent `sent_date` among sent items.
    pub last_sent: Option<NaiveDateTime>,
}

impl MailSummary {
    pub fn from_items(items: &[MailItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            match item.status.as_str() {
                "sent" => summary.sent += 1,
                "unsent" => summary.unsent += 1,
                "retrying" => summary.retrying += 1,
                _ => summary.failed += 1,
            }
            if item.status == "sent" {
                summary.last_sent = summary.last_sent.max(item.sent_date);
            }
        }
        summary
    }

    fn counts(&self) -> String {
        format!(
            "sent: {}, unsent: {}, failed: {}",
            self.sent, self.unsent, self.failed
        )
    }
}

/// Grade the mail window. `minutes_since_sent` is `None` when nothing has
/// been sent in the window.
pub fn evaluate(
    summary: &MailSummary,
    minutes_since_sent: Option<i64>,
    config: &MailCheckConfig,
) -> (Severity, String) {
    let minutes = minutes_since_sent.unwrap_or(0);

    if summary.failed > config.max_failed_count {
        (
            Severity::Error,
            format!(
                "Too many failed mails: {} of the last 10 ({})",
                summary.failed,
                summary.counts()
            ),
        )
    } else if summary.unsent > config.max_unsent_count {
        (
            Severity::Warning,
            format!(
                "Mail queue stuck: {} of the last 10 unsent ({})",
                summary.unsent,
                summary.counts()
            ),
        )
    } else if minutes > config.max_minutes_without_sent {
        (
            Severity::Warning,
            format!("Last mail sent {minutes} minutes ago"),
        )
    } else {
        (
            Severity::Ok,
            format!(
                "Mail service healthy, last mail {minutes} minutes ago ({})",
                summary.counts()
            ),
        )
    }
}

pub struct MailQueueProbe {
    id: String,
    name: String,
    config: MailCheckConfig,
    timeout: Duration,
}

impl MailQueueProbe {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: MailCheckConfig) -> Self {
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

    async fn connect(&self, deadline: tokio::time::Instant) -> Result<SqlClient, ProbeError> {
        let target = &self.config.target;
        let mut config = Config::new();
        config.host(&target.host);
        config.port(target.port);
        config.database(&target.database);
        config.authentication(AuthMethod::sql_server(&target.user, &target.password));
        config.trust_cert();

        let connect = async {
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Ok::<_, ProbeError>(Client::connect(config, tcp.compat_write()).await?)
        };

        tokio::time::timeout_at(deadline, connect)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }

    async fn recent_items(
        client: &mut SqlClient,
    ) -> Result<Vec<MailItem>, ProbeError> {
        let rows = client
            .simple_query(RECENT_MAIL_QUERY)
            .await?
            .into_first_result()
            .await?;

        rows.iter()
            .map(|row| {
                let status = row
                    .try_get::<&str, _>("sent_status")?
                    .unwrap_or("failed")
                    .to_string();
                let sent_date = row.try_get::<NaiveDateTime, _>("sent_date")?;
                Ok::<_, ProbeError>(MailItem { status, sent_date })
            })
            .collect()
    }
}

#[async_trait]
impl Probe for MailQueueProbe {
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
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut client = match self.connect(deadline).await {
            Ok(client) => client,
            Err(e) => {
                return self
                    .failure(format!("Could not connect to the mail database: {e}"))
                    .with_latency(elapsed_ms(started));
            }
        };
        let elapsed = elapsed_ms(started);

        let items = tokio::time::timeout_at(deadline, Self::recent_items(&mut client))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))
            .and_then(|items| items);
        let items = match items {
            Ok(items) => items,
            Err(e) => {
                return self
                    .failure(format!("Could not query sysmail_mailitems: {e}"))
                    .with_latency(elapsed);
            }
        };
        if let Err(e) = client.close().await {
            tracing::debug!(probe = %self.id, error = %e, "SQL Server close failed");
        }

        let summary = MailSummary::from_items(&items);
        let minutes_since_sent = summary
            .last_sent
            .map(|sent| (Utc::now().naive_utc() - sent).num_minutes());
        let (severity, message) = evaluate(&summary, minutes_since_sent, &self.config);

        let mut result = CheckResult::new(&self.id, "database", &self.name, severity, message)
            .with_latency(elapsed)
            .with_meta("sent_count", summary.sent)
            .with_meta("unsent_count", summary.unsent)
            .with_meta("retrying_count", summary.retrying)
            .with_meta("failed_count", summary.failed);
        if let (Some(sent), Some(minutes)) = (summary.last_sent, minutes_since_sent) {
            result = result
                .with_meta("last_email_sent", sent.and_utc().to_rfc3339())
                .with_meta("minutes_since_last_email", minutes);
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
