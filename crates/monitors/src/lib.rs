//! Probe implementations for the monitored systems.
//!
//! Every probe implements [`statusboard_core::Probe`] and is a pure
//! function of its configuration: it performs exactly one attempt per call
//! and reduces whatever happens (including transport errors and timeouts)
//! to a [`statusboard_core::CheckResult`].
//!
//! - [`http::HttpProbe`]: reachability, latency, expected content, TLS expiry.
//! - [`rdap::RdapDomainProbe`]: domain registration expiry via RDAP.
//! - [`postgres::PostgresProbe`]: private-network reachability + query.
//! - [`mail::MailQueueProbe`]: SQL Server Database Mail queue health.
//! - [`sheets::SheetsFreshnessProbe`]: daily spreadsheet update freshness.

pub mod error;
pub mod evaluate;
pub mod google_auth;
pub mod http;
pub mod mail;
pub mod postgres;
pub mod rdap;
pub mod sheets;
pub mod target;
pub mod tls;

pub use error::ProbeError;
pub use target::DatabaseTarget;
