//! Batched, rate-limited sync of email campaign metadata and performance
//! reports from a marketing provider's REST API into a document store.
//!
//! One provider account serves multiple configured sites, each mapped to a
//! provider audience. [`campaigns::CampaignImporter`] pulls campaign
//! listings and content, decodes the tracking key embedded in each
//! campaign's analytics field, and upserts the results;
//! [`reports::ReportImporter`] reads the stored campaigns back and pulls
//! their reports, expanding variate campaigns into parent and child
//! records. All provider traffic runs through [`batch::BatchFetcher`],
//! which keeps in-flight requests under the provider's connection limit.

pub mod batch;
pub mod campaigns;
pub mod client;
pub mod config;
pub mod errors;
pub mod normalize;
pub mod reports;
pub mod store;
pub mod tracking_key;
pub mod types;

#[cfg(test)]
mod testutils;

pub use campaigns::{CampaignImport, CampaignImporter};
pub use config::SyncConfig;
pub use errors::{Result, SyncError};
pub use reports::ReportImporter;
pub use store::{DocumentStore, MemoryStore};
pub use types::{Campaign, InvalidCampaign, Report};
