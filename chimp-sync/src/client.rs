//! Authenticated REST client for the marketing provider's API.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use tokio::time::{Duration, sleep};
use url::Url;

use crate::config::SyncConfig;
use crate::errors::{Result, SyncError};
use crate::types::{CampaignListPage, RawContent, RawReport};

const BASE_DELAY_MILLIS: u64 = 500;

pub struct ProviderClient {
    client: reqwest::Client,
    base_url: Url,
    username: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        // A trailing slash matters to Url::join
        let base = format!("{}/", config.api_base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;

        Ok(ProviderClient {
            client,
            base_url,
            username: config.api_username.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await?;
        Ok(response)
    }

    /// One page of campaign listings, filtered and sorted provider-side.
    ///
    /// Retries transient provider errors with exponential backoff. This is
    /// the single entry call of an import run; the windowed fetches that
    /// follow it never retry.
    pub async fn list_campaigns(
        &self,
        list_id: &str,
        since_send_time: Option<DateTime<Utc>>,
        count: u32,
        sort_field: &str,
    ) -> Result<CampaignListPage> {
        const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
            StatusCode::TOO_MANY_REQUESTS,     // 429
            StatusCode::INTERNAL_SERVER_ERROR, // 500
            StatusCode::BAD_GATEWAY,           // 502
            StatusCode::SERVICE_UNAVAILABLE,   // 503
            StatusCode::GATEWAY_TIMEOUT,       // 504
        ];

        let mut url = self.endpoint("campaigns")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("list_id", list_id);
            pairs.append_pair("count", &count.to_string());
            pairs.append_pair("sort_field", sort_field);
            if let Some(since) = since_send_time {
                pairs.append_pair(
                    "since_send_time",
                    &since.to_rfc3339_opts(SecondsFormat::Secs, true),
                );
            }
        }

        let mut retries = 0;

        loop {
            let response = self.get(url.clone()).await?;
            let status = response.status();

            if !status.is_success() {
                if RETRIABLE_STATUS_CODES.contains(&status) && retries < 3 {
                    // Backoff between retries
                    let retry_millis = BASE_DELAY_MILLIS * 2_u64.pow(retries);
                    tracing::warn!(
                        status = status.as_u16(),
                        retry_millis,
                        "campaign listing failed, retrying"
                    );
                    sleep(Duration::from_millis(retry_millis)).await;
                    retries += 1;
                    continue;
                }
                return Err(SyncError::Provider {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let page = response.json::<CampaignListPage>().await?;
            tracing::debug!(campaigns = page.campaigns.len(), "fetched campaign page");
            return Ok(page);
        }
    }

    /// HTML content of a single campaign (`html` for regular campaigns,
    /// `variate_contents` for split tests).
    pub async fn campaign_content(&self, campaign_id: &str) -> Result<RawContent> {
        let url = self.endpoint(&format!("campaigns/{campaign_id}/content"))?;
        let response = self.get(url.clone()).await?;

        if !response.status().is_success() {
            return Err(SyncError::Provider {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<RawContent>().await?)
    }

    /// Raw performance report for one campaign id.
    pub async fn report(&self, campaign_id: &str) -> Result<RawReport> {
        let url = self.endpoint(&format!("reports/{campaign_id}"))?;
        let response = self.get(url.clone()).await?;

        if !response.status().is_success() {
            return Err(SyncError::Provider {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<RawReport>().await?)
    }
}
