//! Environment-driven configuration.
//!
//! Everything is read once at startup. Variables with a default are
//! optional; the rest are required and every missing one is reported in a
//! single [`ConfigError::Missing`].

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use statusboard_monitors::sheets::SheetsAuth;
use statusboard_monitors::DatabaseTarget;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
    pub sse: SseConfig,
    pub monitors: MonitorsConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Timeout for non-streaming requests, in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks after the server stops (default: `30`).
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries older than this are reported as stale.
    pub max_age: Duration,
}

#[derive(Debug, Clone)]
pub struct SseConfig {
    pub queue_capacity: usize,
    pub heartbeat_interval: Duration,
}

/// One monitored website.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub url: String,
    pub expected_content: Vec<String>,
    pub skip_tls_verification: bool,
}

/// Thresholds shared by every HTTP probe.
#[derive(Debug, Clone)]
pub struct HttpThresholds {
    pub warning_ms: i64,
    pub error_ms: i64,
    pub timeout_secs: u64,
    pub tls_warning_days: i64,
}

#[derive(Debug, Clone)]
pub struct MailThresholds {
    pub max_minutes_without_sent: i64,
    pub max_failed_count: usize,
    pub max_unsent_count: usize,
}

#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub domain: String,
    pub rdap_base_url: String,
    pub warning_days: i64,
    pub error_days: i64,
}

#[derive(Debug, Clone)]
pub struct AppDatabaseConfig {
    pub target: DatabaseTarget,
    pub count_query: String,
    pub vpn_check_host: Option<String>,
    pub vpn_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub auth: SheetsAuth,
    pub timestamp_column: usize,
    pub filename_column: usize,
    pub warning_days: i64,
}

/// Targets and thresholds for every probe.
#[derive(Debug, Clone)]
pub struct MonitorsConfig {
    pub portal_prod: SiteConfig,
    pub portal_preprod: SiteConfig,
    pub portal_app: SiteConfig,
    pub mail_db_prod: DatabaseTarget,
    pub mail_db_preprod: DatabaseTarget,
    pub app_db: AppDatabaseConfig,
    pub domain: DomainConfig,
    pub sheets: SheetsConfig,
    pub http: HttpThresholds,
    pub mail: MailThresholds,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// | Env Var                              | Default                 |
    /// |--------------------------------------|-------------------------|
    /// | `HOST`                               | `0.0.0.0`               |
    /// | `PORT`                               | `8080`                  |
    /// | `CORS_ORIGINS`                       | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`               | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`              | `30`                    |
    /// | `BACKGROUND_CHECK_INTERVAL_MINUTES`  | `5`                     |
    /// | `WORKER_IDLE_TIMEOUT_MINUTES`        | `15`                    |
    /// | `CACHE_MAX_AGE_MINUTES`              | `10`                    |
    /// | `SSE_QUEUE_CAPACITY`                 | `10`                    |
    /// | `SSE_HEARTBEAT_SECS`                 | `30`                    |
    /// | `HTTP_TIMEOUT_WARNING_MS`            | `3000`                  |
    /// | `HTTP_TIMEOUT_ERROR_MS`              | `10000`                 |
    /// | `HTTP_TIMEOUT_SECONDS`               | `30`                    |
    /// | `SSL_WARNING_DAYS`                   | `30`                    |
    /// | `MAIL_MAX_MINUTES_WITHOUT_SENT`      | `60`                    |
    /// | `MAIL_MAX_FAILED_COUNT`              | `0`                     |
    /// | `MAIL_MAX_UNSENT_COUNT`              | `0`                     |
    /// | `DOMAIN_WARNING_DAYS`                | `30`                    |
    /// | `DOMAIN_ERROR_DAYS`                  | `7`                     |
    /// | `VPN_CHECK_HOST`                     | database host           |
    /// | `VPN_CHECK_TIMEOUT_MS`               | `2000`                  |
    /// | `GSHEETS_AUTH_METHOD`                | `service_account`       |
    /// | `GSHEETS_TIMESTAMP_COLUMN`           | `0`                     |
    /// | `GSHEETS_FILENAME_COLUMN`            | `2`                     |
    /// | `GSHEETS_WARNING_DAYS`               | `1`                     |
    ///
    /// Required: `PORTAL_{PROD,PREPROD,APP}_URL`, the `DB_PROD_*`,
    /// `DB_PREPROD_*` and `DB_APP_*` connection settings (`HOST`, `USER`,
    /// `PASSWORD`, `NAME`; `PORT` defaults to 1433 / 5432),
    /// `INFRASTRUCTURE_DOMAIN`, `RDAP_BASE_URL`, `GSHEETS_SPREADSHEET_ID`,
    /// `GSHEETS_SHEET_NAME`, plus `GSHEETS_CREDENTIALS_FILE` or
    /// `GSHEETS_API_KEY` depending on the auth method.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(&lookup);

        let server = ServerConfig {
            host: env.or("HOST", "0.0.0.0"),
            port: env.parse_or("PORT", 8080)?,
            cors_origins: split_list(&env.or("CORS_ORIGINS", "http://localhost:5173")),
            request_timeout_secs: env.parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: env.parse_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
        };

        let scheduler = SchedulerConfig {
            interval: minutes(env.non_zero_or("BACKGROUND_CHECK_INTERVAL_MINUTES", 5)?),
            idle_timeout: minutes(env.parse_or("WORKER_IDLE_TIMEOUT_MINUTES", 15)?),
        };
        let cache = CacheConfig {
            max_age: minutes(env.parse_or("CACHE_MAX_AGE_MINUTES", 10)?),
        };
        let sse = SseConfig {
            queue_capacity: env.parse_or("SSE_QUEUE_CAPACITY", 10)?,
            heartbeat_interval: Duration::from_secs(env.non_zero_or("SSE_HEARTBEAT_SECS", 30)?),
        };

        let monitors = MonitorsConfig::read(&mut env)?;
        env.finish()?;

        Ok(Self {
            server,
            scheduler,
            cache,
            sse,
            monitors,
        })
    }
}

impl MonitorsConfig {
    fn read(env: &mut EnvReader<'_>) -> Result<Self, ConfigError> {
        let portal_prod = SiteConfig::read(env, "PORTAL_PROD")?;
        let portal_preprod = SiteConfig::read(env, "PORTAL_PREPROD")?;
        let portal_app = SiteConfig::read(env, "PORTAL_APP")?;

        let mail_db_prod = read_target(env, "DB_PROD", 1433)?;
        let mail_db_preprod = read_target(env, "DB_PREPROD", 1433)?;
        let app_db = AppDatabaseConfig {
            target: read_target(env, "DB_APP", 5432)?,
            count_query: env.or("DB_APP_COUNT_QUERY", "SELECT COUNT(*) FROM users"),
            vpn_check_host: env.optional("VPN_CHECK_HOST"),
            vpn_timeout_ms: env.parse_or("VPN_CHECK_TIMEOUT_MS", 2000)?,
        };

        let domain = DomainConfig {
            domain: env.required("INFRASTRUCTURE_DOMAIN"),
            rdap_base_url: env.required("RDAP_BASE_URL"),
            warning_days: env.parse_or("DOMAIN_WARNING_DAYS", 30)?,
            error_days: env.parse_or("DOMAIN_ERROR_DAYS", 7)?,
        };

        let auth = match env.or("GSHEETS_AUTH_METHOD", "service_account").as_str() {
            "service_account" => {
                SheetsAuth::ServiceAccount(PathBuf::from(env.required("GSHEETS_CREDENTIALS_FILE")))
            }
            "api_key" => SheetsAuth::ApiKey(env.required("GSHEETS_API_KEY")),
            other => {
                return Err(ConfigError::Invalid {
                    key: "GSHEETS_AUTH_METHOD".into(),
                    value: other.into(),
                    reason: "expected service_account or api_key".into(),
                })
            }
        };
        let sheets = SheetsConfig {
            spreadsheet_id: env.required("GSHEETS_SPREADSHEET_ID"),
            sheet_name: env.required("GSHEETS_SHEET_NAME"),
            auth,
            timestamp_column: env.parse_or("GSHEETS_TIMESTAMP_COLUMN", 0)?,
            filename_column: env.parse_or("GSHEETS_FILENAME_COLUMN", 2)?,
            warning_days: env.parse_or("GSHEETS_WARNING_DAYS", 1)?,
        };

        let http = HttpThresholds {
            warning_ms: env.parse_or("HTTP_TIMEOUT_WARNING_MS", 3000)?,
            error_ms: env.parse_or("HTTP_TIMEOUT_ERROR_MS", 10_000)?,
            timeout_secs: env.parse_or("HTTP_TIMEOUT_SECONDS", 30)?,
            tls_warning_days: env.parse_or("SSL_WARNING_DAYS", 30)?,
        };
        let mail = MailThresholds {
            max_minutes_without_sent: env.parse_or("MAIL_MAX_MINUTES_WITHOUT_SENT", 60)?,
            max_failed_count: env.parse_or("MAIL_MAX_FAILED_COUNT", 0)?,
            max_unsent_count: env.parse_or("MAIL_MAX_UNSENT_COUNT", 0)?,
        };

        Ok(Self {
            portal_prod,
            portal_preprod,
            portal_app,
            mail_db_prod,
            mail_db_preprod,
            app_db,
            domain,
            sheets,
            http,
            mail,
        })
    }
}

impl SiteConfig {
    fn read(env: &mut EnvReader<'_>, prefix: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: env.required(&format!("{prefix}_URL")),
            expected_content: split_list(
                &env.optional(&format!("{prefix}_EXPECTED_CONTENT"))
                    .unwrap_or_default(),
            ),
            skip_tls_verification: env.flag_or(&format!("{prefix}_SKIP_TLS_VERIFICATION"), false)?,
        })
    }
}

fn read_target(
    env: &mut EnvReader<'_>,
    prefix: &str,
    default_port: u16,
) -> Result<DatabaseTarget, ConfigError> {
    Ok(DatabaseTarget {
        host: env.required(&format!("{prefix}_HOST")),
        port: env.parse_or(&format!("{prefix}_PORT"), default_port)?,
        user: env.required(&format!("{prefix}_USER")),
        password: env.required(&format!("{prefix}_PASSWORD")),
        database: env.required(&format!("{prefix}_NAME")),
    })
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads variables through a lookup function, collecting missing
/// required keys until [`EnvReader::finish`].
struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    missing: Vec<String>,
}

impl<'a> EnvReader<'a> {
    fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    /// Trimmed value, treating blank as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&mut self, key: &str) -> String {
        self.optional(key).unwrap_or_else(|| {
            self.missing.push(key.to_string());
            String::new()
        })
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Like [`parse_or`](Self::parse_or) for timer periods, which must be
    /// at least one unit long.
    fn non_zero_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        let value = self.parse_or(key, default)?;
        if value == 0 {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(value)
    }

    fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw,
                    reason: "expected true or false".into(),
                }),
            },
        }
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(self.missing))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
