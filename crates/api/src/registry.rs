//! The fixed set of monitored systems.
//!
//! ```text
//! portal-prod           web / prod            HTTP + mail queue
//! portal-preprod        web / preprod         HTTP + mail queue
//! infrastructure        infrastructure/shared domain expiry (RDAP)
//! sheets-daily-update   google-script / prod  spreadsheet freshness
//! portal-app            web / prod            HTTP + PostgreSQL
//! ```

use statusboard_core::{CoreError, ProbeRegistry, SystemDefinition};
use statusboard_monitors::http::{HttpCheckConfig, HttpProbe};
use statusboard_monitors::mail::{MailCheckConfig, MailQueueProbe};
use statusboard_monitors::postgres::{PostgresCheckConfig, PostgresProbe};
use statusboard_monitors::rdap::{RdapCheckConfig, RdapDomainProbe};
use statusboard_monitors::sheets::{SheetsCheckConfig, SheetsFreshnessProbe};
use statusboard_monitors::{DatabaseTarget, ProbeError};

use crate::config::{MonitorsConfig, SiteConfig};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to build probe: {0}")]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Build the registry of monitored systems, in display order.
pub fn build_registry(config: &MonitorsConfig) -> Result<ProbeRegistry, RegistryError> {
    let mut registry = ProbeRegistry::new();

    registry.register(
        SystemDefinition::new("portal-prod", "Portal (production)", "web", "prod")
            .with_probe(website_probe(&config.portal_prod, config)?)
            .with_probe(mail_probe(&config.mail_db_prod, config)),
    )?;

    registry.register(
        SystemDefinition::new("portal-preprod", "Portal (pre-production)", "web", "preprod")
            .with_probe(website_probe(&config.portal_preprod, config)?)
            .with_probe(mail_probe(&config.mail_db_preprod, config)),
    )?;

    registry.register(
        SystemDefinition::new("infrastructure", "Shared infrastructure", "infrastructure", "shared")
            .with_probe(RdapDomainProbe::new(
                "domain-expiry",
                "Domain expiry",
                RdapCheckConfig {
                    base_url: config.domain.rdap_base_url.clone(),
                    domain: config.domain.domain.clone(),
                    warning_days: config.domain.warning_days,
                    error_days: config.domain.error_days,
                },
            )?),
    )?;

    let sheets = &config.sheets;
    registry.register(
        SystemDefinition::new(
            "sheets-daily-update",
            "Daily export log",
            "google-script",
            "prod",
        )
        .with_probe(SheetsFreshnessProbe::new(
            "daily-update",
            "Daily update",
            SheetsCheckConfig {
                spreadsheet_id: sheets.spreadsheet_id.clone(),
                sheet_name: sheets.sheet_name.clone(),
                auth: sheets.auth.clone(),
                timestamp_column: sheets.timestamp_column,
                filename_column: sheets.filename_column,
                warning_days: sheets.warning_days,
            },
        )?),
    )?;

    let app_db = &config.app_db;
    registry.register(
        SystemDefinition::new("portal-app", "Portal app", "web", "prod")
            .with_probe(website_probe(&config.portal_app, config)?)
            .with_probe(PostgresProbe::new(
                "postgresql-check",
                "PostgreSQL database",
                PostgresCheckConfig {
                    target: app_db.target.clone(),
                    count_query: app_db.count_query.clone(),
                    vpn_check_host: app_db.vpn_check_host.clone(),
                    vpn_timeout_ms: app_db.vpn_timeout_ms,
                },
            )),
    )?;

    tracing::info!(systems = registry.len(), "Probe registry built");
    Ok(registry)
}

fn website_probe(site: &SiteConfig, config: &MonitorsConfig) -> Result<HttpProbe, ProbeError> {
    HttpProbe::new(
        "http-check",
        "Website reachable",
        HttpCheckConfig {
            url: site.url.clone(),
            expected_content: site.expected_content.clone(),
            validate_tls: true,
            skip_tls_verification: site.skip_tls_verification,
            tls_warning_days: config.http.tls_warning_days,
            warning_ms: config.http.warning_ms,
            error_ms: config.http.error_ms,
            timeout_secs: config.http.timeout_secs,
        },
    )
}

fn mail_probe(target: &DatabaseTarget, config: &MonitorsConfig) -> MailQueueProbe {
    MailQueueProbe::new(
        "mail-service",
        "Mail service",
        MailCheckConfig {
            target: target.clone(),
            max_minutes_without_sent: config.mail.max_minutes_without_sent,
            max_failed_count: config.mail.max_failed_count,
            max_unsent_count: config.mail.max_unsent_count,
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::AppConfig;

    fn monitors_config() -> MonitorsConfig {
        let mut vars: HashMap<String, String> = HashMap::new();
        for prefix in ["PORTAL_PROD", "PORTAL_PREPROD", "PORTAL_APP"] {
            vars.insert(format!("{prefix}_URL"), "https://portal.test".into());
        }
        for prefix in ["DB_PROD", "DB_PREPROD", "DB_APP"] {
            for field in ["HOST", "USER", "PASSWORD", "NAME"] {
                vars.insert(format!("{prefix}_{field}"), "x".into());
            }
        }
        vars.insert("INFRASTRUCTURE_DOMAIN".into(), "portal.test".into());
        vars.insert("RDAP_BASE_URL".into(), "https://rdap.test".into());
        vars.insert("GSHEETS_SPREADSHEET_ID".into(), "sheet".into());
        vars.insert("GSHEETS_SHEET_NAME".into(), "Log".into());
        vars.insert("GSHEETS_AUTH_METHOD".into(), "api_key".into());
        vars.insert("GSHEETS_API_KEY".into(), "key".into());

        AppConfig::from_lookup(|key| vars.get(key).cloned())
            .unwrap()
            .monitors
    }

    #[test]
    fn registers_five_systems_in_order() {
        let registry = build_registry(&monitors_config()).unwrap();

        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(
            ids,
            vec![
                "portal-prod",
                "portal-preprod",
                "infrastructure",
                "sheets-daily-update",
                "portal-app",
            ]
        );
    }

    #[test]
    fn probes_follow_system_layout() {
        let registry = build_registry(&monitors_config()).unwrap();

        let probe_ids = |id: &str| -> Vec<String> {
            registry.get(id).unwrap().probes.iter().map(|p| p.id().to_string()).collect()
        };

        assert_eq!(probe_ids("portal-prod"), vec!["http-check", "mail-service"]);
        assert_eq!(probe_ids("infrastructure"), vec!["domain-expiry"]);
        assert_eq!(probe_ids("sheets-daily-update"), vec!["daily-update"]);
        assert_eq!(probe_ids("portal-app"), vec!["http-check", "postgresql-check"]);

        let prod = registry.get("portal-prod").unwrap();
        assert_eq!(prod.category, "web");
        assert_eq!(prod.environment, "prod");
    }
}
