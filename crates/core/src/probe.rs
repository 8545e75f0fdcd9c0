//! Probe abstraction and the fixed registry of monitored systems.

use std::sync::Arc;

use async_trait::async_trait;

use crate::check::CheckResult;
use crate::error::CoreError;
use crate::severity::Severity;

/// A single external check against one subsystem.
///
/// Implementations hold their own configuration and no shared mutable
/// state. `check` never fails: every failure mode (network, database,
/// parse, timeout) is reported as a [`CheckResult`] with
/// [`Severity::Error`].
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe identifier, unique within its system.
    fn id(&self) -> &str;

    /// Probe kind (`"http"`, `"database"`, ...).
    fn kind(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Run the probe once.
    async fn check(&self) -> CheckResult;

    /// Build an error result attributed to this probe.
    fn failure(&self, message: String) -> CheckResult {
        CheckResult::new(self.id(), self.kind(), self.name(), Severity::Error, message)
    }
}

/// A monitored system: identity plus its ordered probe set.
#[derive(Clone)]
pub struct SystemDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    pub environment: String,
    pub probes: Vec<Arc<dyn Probe>>,
}

impl SystemDefinition {
    /// Create a definition with no probes.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            environment: environment.into(),
            probes: Vec::new(),
        }
    }

    /// Append a probe. Results keep the order probes were added in.
    pub fn with_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }
}

impl std::fmt::Debug for SystemDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("probes", &self.probes.iter().map(|p| p.id()).collect::<Vec<_>>())
            .finish()
    }
}

/// Ordered, fixed set of monitored systems.
#[derive(Debug, Default)]
pub struct ProbeRegistry {
    systems: Vec<Arc<SystemDefinition>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system. Identifiers must be non-empty and unique since they
    /// key the status cache.
    pub fn register(&mut self, definition: SystemDefinition) -> Result<(), CoreError> {
        if definition.id.trim().is_empty() {
            return Err(CoreError::Validation("system id must not be empty".into()));
        }
        if self.get(&definition.id).is_some() {
            return Err(CoreError::Conflict(format!(
                "system '{}' is already registered",
                definition.id
            )));
        }
        self.systems.push(Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SystemDefinition>> {
        self.systems.iter().find(|s| s.id == id)
    }

    /// All systems in registration order.
    pub fn systems(&self) -> &[Arc<SystemDefinition>] {
        &self.systems
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
