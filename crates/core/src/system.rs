use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::check::CheckResult;
use crate::probe::SystemDefinition;
use crate::severity::SystemStatus;
use crate::types::{SystemId, Timestamp};

/// Latest known state of one monitored system.
///
/// Always built from one complete probe pass via
/// [`SystemState::from_checks`]; the aggregated `status` is derived from the
/// checks and never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub id: SystemId,
    pub name: String,
    /// Category such as `"web"`, `"infrastructure"` or `"google-script"`.
    #[serde(rename = "type")]
    pub category: String,
    /// Environment tag such as `"prod"`, `"preprod"` or `"shared"`.
    pub environment: String,
    pub status: SystemStatus,
    pub last_check: Timestamp,
    /// Results in probe registration order.
    pub checks: Vec<CheckResult>,
}

impl SystemState {
    /// Build the state for `definition` from one completed probe pass.
    ///
    /// `last_check` is the timestamp of the first check, or now if there are
    /// none.
    pub fn from_checks(definition: &SystemDefinition, checks: Vec<CheckResult>) -> Self {
        let status = SystemStatus::aggregate(checks.iter().map(|c| c.severity));
        let last_check = checks.first().map(|c| c.timestamp).unwrap_or_else(Utc::now);

        Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            category: definition.category.clone(),
            environment: definition.environment.clone(),
            status,
            last_check,
            checks,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    fn definition() -> SystemDefinition {
        SystemDefinition::new("portal-prod", "Portal", "web", "prod")
    }

    #[test]
    fn status_is_derived_from_checks() {
        let checks = vec![
            CheckResult::new("a", "http", "A", Severity::Ok, ""),
            CheckResult::new("b", "database", "B", Severity::Warning, ""),
        ];
        let state = SystemState::from_checks(&definition(), checks);

        assert_eq!(state.status, SystemStatus::Warning);
        assert_eq!(state.checks.len(), 2);
        assert_eq!(state.checks[0].id, "a");
        assert_eq!(state.last_check, state.checks[0].timestamp);
    }

    #[test]
    fn no_checks_is_unknown() {
        let state = SystemState::from_checks(&definition(), Vec::new());
        assert_eq!(state.status, SystemStatus::Unknown);
        assert!(state.checks.is_empty());
    }

    #[test]
    fn serializes_category_as_type() {
        let state = SystemState::from_checks(&definition(), Vec::new());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["id"], "portal-prod");
        assert_eq!(json["type"], "web");
        assert_eq!(json["environment"], "prod");
        assert_eq!(json["status"], "unknown");
        assert!(json["checks"].as_array().unwrap().is_empty());
    }
}
