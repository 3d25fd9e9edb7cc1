use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{Result, SyncError};

pub const DEFAULT_API_BASE_URL: &str = "https://us2.api.mailchimp.com/3.0/";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Logical collection names in the document store.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Collections {
    pub campaigns: String,
    pub reports: String,
}

impl Default for Collections {
    fn default() -> Self {
        Collections {
            campaigns: "campaigns".into(),
            reports: "reports".into(),
        }
    }
}

/// Constructor-time configuration for the sync pipeline. Everything is
/// explicit; nothing is read from process-wide state.
#[derive(Clone, Deserialize, Debug)]
pub struct SyncConfig {
    /// Site name -> provider audience (list) id.
    pub sites: HashMap<String, String>,
    pub api_username: String,
    pub api_key: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub collections: Collections,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl SyncConfig {
    pub fn new(sites: HashMap<String, String>, api_username: &str, api_key: &str) -> Self {
        SyncConfig {
            sites,
            api_username: api_username.to_string(),
            api_key: api_key.to_string(),
            api_base_url: default_api_base_url(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            collections: Collections::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api_base_url = base_url.to_string();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Audience id for a configured site.
    pub fn list_id(&self, site: &str) -> Result<&str> {
        self.sites
            .get(site)
            .map(String::as_str)
            .ok_or_else(|| SyncError::UnknownSite(site.to_string()))
    }
}
