//! Retrieval and normalization of performance reports for stored campaigns.

use chrono::{DateTime, Datelike, Utc};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::batch::{BatchFetcher, MAX_CONCURRENT_REQUESTS, REPORT_WINDOW_COOLDOWN};
use crate::client::ProviderClient;
use crate::config::SyncConfig;
use crate::errors::{Result, SyncError};
use crate::normalize::{VariantRole, normalize};
use crate::store::{DocumentStore, Filter, FindOptions};
use crate::types::{Campaign, CampaignType, Report};

pub struct ReportImporter {
    client: Arc<ProviderClient>,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
}

impl ReportImporter {
    pub fn new(config: SyncConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let client = Arc::new(ProviderClient::new(&config)?);
        Ok(ReportImporter {
            client,
            store,
            config,
        })
    }

    /// Fetches and normalizes reports for stored campaigns of a site.
    ///
    /// Source selection, in order of precedence: a single campaign when
    /// `campaign_id` is given; campaigns whose (year, month) is on or after
    /// `start_time`'s when that is given; otherwise every stored campaign of
    /// the site. Each regular campaign yields one report; each variate
    /// campaign yields a variate-parent plus one variate-child per
    /// combination, children in combination order.
    pub async fn fetch_report_data(
        &self,
        site: &str,
        start_time: Option<DateTime<Utc>>,
        campaign_id: Option<&str>,
    ) -> Result<Vec<Report>> {
        let campaigns = self.select_campaigns(site, start_time, campaign_id).await?;
        tracing::debug!(site, campaigns = campaigns.len(), "selected campaigns for reports");

        // Main report fetches run in throttled windows; the provider's rate
        // limiter needs breathing room between consecutive report bursts.
        let fetcher = BatchFetcher::new(MAX_CONCURRENT_REQUESTS, Some(REPORT_WINDOW_COOLDOWN));
        let tasks: Vec<_> = campaigns
            .iter()
            .map(|campaign| {
                let client = self.client.clone();
                let id = campaign.id.clone();
                move || async move { client.report(&id).await }
            })
            .collect();
        let raw_reports = fetcher.run(tasks).await?;

        let mut reports = Vec::new();
        for (campaign, raw) in campaigns.iter().zip(&raw_reports) {
            match campaign.campaign_type {
                CampaignType::Regular => {
                    reports.push(normalize(site, campaign, raw, None));
                }
                CampaignType::Variate => {
                    let child_ids: Vec<String> = campaign
                        .variate_settings
                        .as_ref()
                        .map(|settings| {
                            settings
                                .combinations
                                .iter()
                                .map(|combo| combo.id.clone())
                                .collect()
                        })
                        .unwrap_or_default();

                    reports.push(normalize(
                        site,
                        campaign,
                        raw,
                        Some(VariantRole::Parent {
                            child_ids: child_ids.clone(),
                        }),
                    ));

                    // Child reports come one at a time, after the batched
                    // parents have fully drained their windows.
                    for child_id in child_ids {
                        let child_raw = self.client.report(&child_id).await?;
                        reports.push(normalize(
                            site,
                            campaign,
                            &child_raw,
                            Some(VariantRole::Child {
                                parent_id: campaign.id.clone(),
                            }),
                        ));
                    }
                }
            }
        }

        Ok(reports)
    }

    async fn select_campaigns(
        &self,
        site: &str,
        start_time: Option<DateTime<Utc>>,
        campaign_id: Option<&str>,
    ) -> Result<Vec<Campaign>> {
        let collection = &self.config.collections.campaigns;
        let list_id = self.config.list_id(site)?;

        if let Some(id) = campaign_id {
            let doc = self
                .store
                .find_by_id(collection, id)
                .await?
                .ok_or_else(|| SyncError::CampaignNotFound(id.to_string()))?;
            return Ok(vec![serde_json::from_value(Value::Object(doc))?]);
        }

        let site_clause = Filter::Eq("list_id".into(), json!(list_id));
        let filter = match start_time {
            Some(start) => Filter::And(vec![
                site_clause,
                // year > start OR (year == start AND month >= start's month)
                Filter::Or(vec![
                    Filter::Gt("year".into(), json!(start.year())),
                    Filter::And(vec![
                        Filter::Eq("year".into(), json!(start.year())),
                        Filter::Gte("month".into(), json!(start.month())),
                    ]),
                ]),
            ]),
            None => site_clause,
        };

        let docs = self
            .store
            .query_by_filter(collection, &filter, FindOptions::default())
            .await?;

        docs.into_iter()
            .map(|doc| Ok(serde_json::from_value(Value::Object(doc))?))
            .collect()
    }
}
