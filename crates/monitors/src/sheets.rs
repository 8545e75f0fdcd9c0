//! Freshness of the daily export logged to a Google spreadsheet.
//!
//! A scheduled script appends one row per export to a sheet, with a
//! `YYYY-MM-DD` timestamp column and a `bd_YYYYMMDD.zip` filename column.
//! The probe reads the sheet and grades the last row.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use statusboard_core::{CheckResult, Metadata, MetadataValue, Probe, Severity};

use crate::error::ProbeError;
use crate::evaluate::elapsed_ms;
use crate::google_auth::{ServiceAccountKey, ServiceAccountTokenSource, SHEETS_READONLY_SCOPE};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bd_(\d{8})\.zip").expect("valid regex"));

/// How the probe authenticates against the Sheets API.
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    ApiKey(String),
    /// Path to a service-account JSON key file.
    ServiceAccount(PathBuf),
}

/// Settings for one [`SheetsFreshnessProbe`].
#[derive(Debug, Clone)]
pub struct SheetsCheckConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub auth: SheetsAuth,
    /// Zero-based column holding the `YYYY-MM-DD` timestamp.
    pub timestamp_column: usize,
    /// Zero-based column holding the export filename.
    pub filename_column: usize,
    /// Rows this many days old or fewer are a warning; older is an error.
    pub warning_days: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

pub struct SheetsFreshnessProbe {
    id: String,
    name: String,
    config: SheetsCheckConfig,
    client: reqwest::Client,
    /// Built on first use so a missing key file surfaces as a check error.
    token_source: tokio::sync::OnceCell<ServiceAccountTokenSource>,
}

impl SheetsFreshnessProbe {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: SheetsCheckConfig,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            config,
            client,
            token_source: tokio::sync::OnceCell::new(),
        })
    }

    fn values_url(&self) -> Result<reqwest::Url, ProbeError> {
        let mut url = reqwest::Url::parse(SHEETS_API_BASE)
            .map_err(|e| ProbeError::Parse(format!("invalid Sheets API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProbeError::Parse("Sheets API URL cannot be a base".into()))?
            .push(&self.config.spreadsheet_id)
            .push("values")
            .push(&format!("{}!A:J", self.config.sheet_name));
        Ok(url)
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, ProbeError> {
        let mut request = self.client.get(self.values_url()?);
        request = match &self.config.auth {
            SheetsAuth::ApiKey(key) => request.query(&[("key", key)]),
            SheetsAuth::ServiceAccount(path) => {
                let source = self
                    .token_source
                    .get_or_try_init(|| async move {
                        let key = ServiceAccountKey::from_file(path).await?;
                        ServiceAccountTokenSource::new(key, SHEETS_READONLY_SCOPE, REQUEST_TIMEOUT)
                    })
                    .await?;
                request.bearer_auth(source.access_token().await?)
            }
        };

        let response = request.send().await?.error_for_status()?;
        let range: ValueRange = response.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Date encoded in a `bd_YYYYMMDD.zip` filename.
pub fn filename_date(filename: &str) -> Option<NaiveDate> {
    let caps = FILENAME_RE.captures(filename)?;
    NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()
}

/// Grade the sheet's rows (header included) as of `today`.
pub fn evaluate(
    rows: &[Vec<String>],
    today: NaiveDate,
    config: &SheetsCheckConfig,
) -> (Severity, String, Metadata) {
    let mut meta = Metadata::new();

    let Some(last) = rows.last() else {
        return (Severity::Error, "The sheet contains no data".into(), meta);
    };
    if last.len() <= config.filename_column || last.len() <= config.timestamp_column {
        return (
            Severity::Error,
            "The last row is missing expected columns".into(),
            meta,
        );
    }

    let timestamp = last[config.timestamp_column].as_str();
    let filename = last[config.filename_column].as_str();
    meta.insert("last_timestamp".into(), timestamp.into());
    meta.insert("last_filename".into(), filename.into());
    meta.insert("total_rows".into(), rows.len().saturating_sub(1).into());

    let Ok(stamp) = NaiveDate::parse_from_str(timestamp, "%Y-%m-%d") else {
        return (
            Severity::Error,
            format!("Invalid date in timestamp column: {timestamp}"),
            meta,
        );
    };

    let expected = format!("bd_{}.zip", stamp.format("%Y%m%d"));
    meta.insert("expected_filename".into(), MetadataValue::Text(expected.clone()));

    let Some(file_date) = filename_date(filename) else {
        return (
            Severity::Warning,
            format!("Unrecognized filename: {filename} (expected {expected})"),
            meta,
        );
    };
    meta.insert(
        "filename_date".into(),
        file_date.format("%Y-%m-%d").to_string().into(),
    );

    let days_old = (today - stamp).num_days();
    meta.insert("days_old".into(), days_old.into());

    if stamp != file_date {
        return (
            Severity::Error,
            format!(
                "Mismatch: timestamp ({stamp}) does not match filename date ({file_date})"
            ),
            meta,
        );
    }

    if days_old == 0 {
        (
            Severity::Ok,
            format!("Today's update completed with {filename}"),
            meta,
        )
    } else if days_old <= config.warning_days {
        (
            Severity::Warning,
            format!("Last update is {days_old} day(s) old: {timestamp} with {filename}"),
            meta,
        )
    } else {
        (
            Severity::Error,
            format!("Update outdated: {days_old} days old ({timestamp} with {filename})"),
            meta,
        )
    }
}

#[async_trait]
impl Probe for SheetsFreshnessProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "google-sheets"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckResult {
        let started = Instant::now();
        let fetched = self.fetch_rows().await;
        let elapsed = elapsed_ms(started);

        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                tracing::debug!(probe = %self.id, error = %e, "Sheets read failed");
                return self
                    .failure(format!("Could not read the sheet: {e}"))
                    .with_latency(elapsed);
            }
        };

        let (severity, message, metadata) =
            evaluate(&rows, Utc::now().date_naive(), &self.config);
        CheckResult::new(&self.id, "google-sheets", &self.name, severity, message)
            .with_latency(elapsed)
            .with_metadata(metadata)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SheetsCheckConfig {
        SheetsCheckConfig {
            spreadsheet_id: "sheet-id".into(),
            sheet_name: "Log Diario".into(),
            auth: SheetsAuth::ApiKey("key".into()),
            timestamp_column: 0,
            filename_column: 1,
            warning_days: 1,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rows(last: &[&str]) -> Vec<Vec<String>> {
        vec![
            vec!["TimeStamp".into(), "Archivo".into()],
            last.iter().map(|s| s.to_string()).collect(),
        ]
    }

    #[test]
    fn today_is_ok() {
        let (severity, _, meta) =
            evaluate(&rows(&["2025-03-10", "bd_20250310.zip"]), date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Ok);
        assert_eq!(meta["days_old"], MetadataValue::Int(0));
        assert_eq!(meta["total_rows"], MetadataValue::Int(1));
        assert_eq!(meta["filename_date"], MetadataValue::Text("2025-03-10".into()));
    }

    #[test]
    fn yesterday_is_warning_and_older_is_error() {
        let data = rows(&["2025-03-09", "bd_20250309.zip"]);
        let (severity, _, _) = evaluate(&data, date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Warning);

        let (severity, message, _) = evaluate(&data, date(2025, 3, 14), &config());
        assert_eq!(severity, Severity::Error);
        assert!(message.contains("5 days old"), "{message}");
    }

    #[test]
    fn mismatched_filename_date_is_error() {
        let (severity, message, _) =
            evaluate(&rows(&["2025-03-10", "bd_20250309.zip"]), date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Error);
        assert!(message.starts_with("Mismatch"));
    }

    #[test]
    fn unrecognized_filename_is_warning() {
        let (severity, _, meta) =
            evaluate(&rows(&["2025-03-10", "export.zip"]), date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Warning);
        assert_eq!(
            meta["expected_filename"],
            MetadataValue::Text("bd_20250310.zip".into())
        );
    }

    #[test]
    fn bad_timestamp_is_error() {
        let (severity, message, _) =
            evaluate(&rows(&["10/03/2025", "bd_20250310.zip"]), date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Error);
        assert!(message.contains("10/03/2025"));
    }

    #[test]
    fn empty_sheet_and_short_row_are_errors() {
        let (severity, _, _) = evaluate(&[], date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Error);

        let (severity, message, _) = evaluate(&rows(&["2025-03-10"]), date(2025, 3, 10), &config());
        assert_eq!(severity, Severity::Error);
        assert!(message.contains("missing expected columns"));
    }

    #[test]
    fn filename_date_extraction() {
        assert_eq!(filename_date("bd_20240229.zip"), Some(date(2024, 2, 29)));
        assert_eq!(filename_date("bd_20230230.zip"), None);
        assert_eq!(filename_date("backup.zip"), None);
    }

    #[test]
    fn values_url_encodes_range() {
        let probe = SheetsFreshnessProbe::new("sheets", "Sheets", config()).unwrap();
        let url = probe.values_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/Log%20Diario!A:J"
        );
    }

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_text(&serde_json::json!("a")), "a");
        assert_eq!(cell_text(&serde_json::json!(12)), "12");
        assert_eq!(cell_text(&serde_json::Value::Null), "");
    }
}
