//! Statusboard domain types.
//!
//! Pure logic only (no I/O): check results, system state aggregation, the
//! probe abstraction and the registry of monitored systems. Everything that
//! talks to the network lives in `statusboard-monitors`; everything that
//! owns shared state lives in `statusboard-api`.

pub mod check;
pub mod error;
pub mod probe;
pub mod severity;
pub mod system;
pub mod types;

pub use check::{CheckResult, Metadata, MetadataValue};
pub use error::CoreError;
pub use probe::{Probe, ProbeRegistry, SystemDefinition};
pub use severity::{Severity, SystemStatus};
pub use system::SystemState;
