//! End-to-end retrieval of campaign metadata and content.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::batch::{BatchFetcher, MAX_CONCURRENT_REQUESTS};
use crate::client::ProviderClient;
use crate::config::SyncConfig;
use crate::errors::{Result, SyncError};
use crate::store::{BulkOutcome, Document, DocumentStore};
use crate::tracking_key;
use crate::types::{Campaign, CampaignType, InvalidCampaign, RawCampaign};

pub const DEFAULT_PAGE_SIZE: u32 = 300;
pub const DEFAULT_SORT_FIELD: &str = "send_time";

/// Outcome of one campaign fetch: records ready to persist, plus the
/// campaigns whose type the pipeline does not handle. The latter are a
/// partial-success channel, not an error.
#[derive(Debug)]
pub struct CampaignImport {
    pub campaign_data: Vec<Campaign>,
    pub invalid_campaigns: Vec<InvalidCampaign>,
}

pub struct CampaignImporter {
    client: Arc<ProviderClient>,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
}

impl CampaignImporter {
    pub fn new(config: SyncConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let client = Arc::new(ProviderClient::new(&config)?);
        Ok(CampaignImporter {
            client,
            store,
            config,
        })
    }

    /// Fetches one listing page for a site and resolves each valid
    /// campaign's content, with the default page size and sort order.
    pub async fn fetch_campaign_data(
        &self,
        site: &str,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<CampaignImport> {
        self.fetch_campaign_data_with(site, start_time, DEFAULT_PAGE_SIZE, DEFAULT_SORT_FIELD)
            .await
    }

    /// Like [`fetch_campaign_data`](Self::fetch_campaign_data) with explicit
    /// paging parameters, passed through to the provider untouched.
    ///
    /// Regular and variate campaigns get their tracking key decoded and a
    /// campaign record built; any other type lands in `invalid_campaigns`
    /// undecoded. A decode failure aborts the whole call, since a malformed
    /// key means the upstream data is broken.
    pub async fn fetch_campaign_data_with(
        &self,
        site: &str,
        start_time: Option<DateTime<Utc>>,
        count: u32,
        sort_field: &str,
    ) -> Result<CampaignImport> {
        let list_id = self.config.list_id(site)?;
        let page = self
            .client
            .list_campaigns(list_id, start_time, count, sort_field)
            .await?;

        let mut campaign_data: Vec<Campaign> = Vec::new();
        let mut invalid_campaigns = Vec::new();

        for raw in page.campaigns {
            match raw.campaign_type.as_str() {
                "regular" => campaign_data.push(build_campaign(raw, CampaignType::Regular)?),
                "variate" => campaign_data.push(build_campaign(raw, CampaignType::Variate)?),
                other => invalid_campaigns.push(InvalidCampaign {
                    campaign_type: other.to_string(),
                    id: raw.id,
                }),
            }
        }

        tracing::debug!(
            site,
            valid = campaign_data.len(),
            invalid = invalid_campaigns.len(),
            "campaign page classified"
        );

        // Content fetches share the provider's connection limit but tolerate
        // back-to-back windows, so no cooldown here.
        let fetcher = BatchFetcher::new(MAX_CONCURRENT_REQUESTS, None);
        let tasks: Vec<_> = campaign_data
            .iter()
            .map(|campaign| {
                let client = self.client.clone();
                let id = campaign.id.clone();
                move || async move { client.campaign_content(&id).await }
            })
            .collect();
        let contents = fetcher.run(tasks).await?;

        for (campaign, content) in campaign_data.iter_mut().zip(contents) {
            match campaign.campaign_type {
                CampaignType::Regular => campaign.content = content.html,
                CampaignType::Variate => {
                    campaign.variate_contents = content
                        .variate_contents
                        .map(|entries| entries.into_iter().map(|entry| entry.html).collect());
                }
            }
        }

        Ok(CampaignImport {
            campaign_data,
            invalid_campaigns,
        })
    }

    /// Persists records into the collection named by `kind` as one
    /// unordered bulk upsert. The only recognized kinds are `campaignData`
    /// and `campaignReport`; anything else is rejected before any write.
    pub async fn import_data<T: Serialize>(
        &self,
        kind: &str,
        records: &[T],
    ) -> Result<BulkOutcome> {
        let collection = match kind {
            "campaignData" => &self.config.collections.campaigns,
            "campaignReport" => &self.config.collections.reports,
            other => return Err(SyncError::InvalidImportKind(other.to_string())),
        };

        let docs = records
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;

        let outcome = self.store.upsert_bulk(collection, docs).await?;
        tracing::debug!(
            collection,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            failed = outcome.failed.len(),
            "bulk upsert complete"
        );
        Ok(outcome)
    }
}

fn to_document<T: Serialize>(record: &T) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => Err(SyncError::Store(format!(
            "record serialized to a non-object value: {other}"
        ))),
    }
}

fn build_campaign(raw: RawCampaign, campaign_type: CampaignType) -> Result<Campaign> {
    let ga_key = raw
        .tracking
        .google_analytics
        .as_deref()
        .ok_or_else(|| SyncError::MalformedKey(format!("campaign {} has no tracking key", raw.id)))?;
    let key = tracking_key::decode(ga_key)?;

    let mut campaign = Campaign {
        list_id: raw.recipients.list_id.unwrap_or_default(),
        title: raw.settings.title.clone().unwrap_or_default(),
        campaign_type,
        year: key.year,
        quarter: key.quarter,
        month: key.month,
        promo_num: key.promo_num,
        segment: key.segment,
        google_analytics: ga_key.to_string(),
        send_time: None,
        subject_line: None,
        preview_text: None,
        content: None,
        variate_settings: None,
        variate_contents: None,
        id: raw.id.clone(),
    };

    match campaign_type {
        CampaignType::Regular => {
            // The stored key is prefixed with the campaign id so analytics
            // lookups can tie a pageview back to the exact send.
            campaign.google_analytics = format!("{}-{}", raw.id, ga_key);
            campaign.subject_line = raw.settings.subject_line;
            campaign.preview_text = raw.settings.preview_text;
            campaign.send_time = raw.send_time;
        }
        CampaignType::Variate => {
            campaign.variate_settings = raw.variate_settings;
        }
    }

    Ok(campaign)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutils::MockProvider;
    use serde_json::json;
    use std::collections::HashMap;

    fn config_for(base_url: &str) -> SyncConfig {
        SyncConfig::new(
            HashMap::from([("site-a".to_string(), "list-a".to_string())]),
            "user",
            "key",
        )
        .with_base_url(base_url)
    }

    fn importer_for(provider: &MockProvider) -> (CampaignImporter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let importer =
            CampaignImporter::new(config_for(&provider.base_url()), store.clone()).unwrap();
        (importer, store)
    }

    fn regular_campaign(id: &str, ga_key: &str) -> Value {
        json!({
            "id": id,
            "type": "regular",
            "settings": {
                "title": format!("{id} title"),
                "subject_line": "subject",
                "preview_text": "preview",
            },
            "tracking": {"google_analytics": ga_key},
            "recipients": {"list_id": "list-a"},
            "send_time": "2021-04-05T10:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_regular_campaign_is_decoded_and_content_attached() {
        let provider = MockProvider::builder()
            .campaign(regular_campaign("c1", "2021_apr1_sku_most"))
            .content("c1", json!({"html": "<p>hello</p>"}))
            .spawn()
            .await;
        let (importer, _) = importer_for(&provider);

        let import = importer.fetch_campaign_data("site-a", None).await.unwrap();

        assert!(import.invalid_campaigns.is_empty());
        assert_eq!(import.campaign_data.len(), 1);

        let campaign = &import.campaign_data[0];
        assert_eq!(campaign.campaign_type, CampaignType::Regular);
        assert_eq!(campaign.google_analytics, "c1-2021_apr1_sku_most");
        assert_eq!(
            (campaign.year, campaign.quarter, campaign.month, campaign.promo_num),
            (2021, 2, 4, 1)
        );
        assert_eq!(campaign.segment, "sku_most");
        assert_eq!(campaign.subject_line.as_deref(), Some("subject"));
        assert_eq!(campaign.preview_text.as_deref(), Some("preview"));
        assert!(campaign.send_time.is_some());
        assert_eq!(campaign.content.as_deref(), Some("<p>hello</p>"));
        assert!(campaign.variate_settings.is_none());
    }

    #[tokio::test]
    async fn test_variate_campaign_keeps_raw_key_and_ordered_contents() {
        let provider = MockProvider::builder()
            .campaign(json!({
                "id": "v1",
                "type": "variate",
                "settings": {"title": "split test"},
                "tracking": {"google_analytics": "2021_jun3_loyal"},
                "recipients": {"list_id": "list-a"},
                "variate_settings": {
                    "combinations": [{"id": "v1-a"}, {"id": "v1-b"}],
                },
            }))
            .content(
                "v1",
                json!({"variate_contents": [{"html": "<p>A</p>"}, {"html": "<p>B</p>"}]}),
            )
            .spawn()
            .await;
        let (importer, _) = importer_for(&provider);

        let import = importer.fetch_campaign_data("site-a", None).await.unwrap();
        let campaign = &import.campaign_data[0];

        assert_eq!(campaign.campaign_type, CampaignType::Variate);
        // Raw key kept verbatim, no id prefix
        assert_eq!(campaign.google_analytics, "2021_jun3_loyal");
        assert_eq!(campaign.subject_line, None);
        assert_eq!(
            campaign.variate_contents,
            Some(vec!["<p>A</p>".to_string(), "<p>B</p>".to_string()])
        );
        let combos = &campaign.variate_settings.as_ref().unwrap().combinations;
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0].id, "v1-a");
        assert_eq!(combos[1].id, "v1-b");
    }

    #[tokio::test]
    async fn test_unhandled_campaign_type_is_reported_not_decoded() {
        let provider = MockProvider::builder()
            .campaign(regular_campaign("c1", "2021_apr1_seg"))
            .campaign(json!({
                "id": "rss1",
                "type": "rss",
                // A key that would fail decoding; it must never be touched
                "tracking": {"google_analytics": "not-a-key"},
            }))
            .content("c1", json!({"html": "<p>x</p>"}))
            .spawn()
            .await;
        let (importer, _) = importer_for(&provider);

        let import = importer.fetch_campaign_data("site-a", None).await.unwrap();

        assert_eq!(import.campaign_data.len(), 1);
        assert_eq!(
            import.invalid_campaigns,
            vec![InvalidCampaign {
                id: "rss1".into(),
                campaign_type: "rss".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_malformed_tracking_key_aborts_the_call() {
        let provider = MockProvider::builder()
            .campaign(regular_campaign("good", "2021_apr1_seg"))
            .campaign(regular_campaign("bad", "broken-key"))
            .spawn()
            .await;
        let (importer, _) = importer_for(&provider);

        let err = importer
            .fetch_campaign_data("site-a", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedKey(_)));
    }

    #[tokio::test]
    async fn test_unknown_site_is_rejected_before_any_fetch() {
        let provider = MockProvider::builder().spawn().await;
        let (importer, _) = importer_for(&provider);

        let err = importer
            .fetch_campaign_data("nope", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownSite(_)));
    }

    #[tokio::test]
    async fn test_import_data_rejects_unknown_kind_without_writing() {
        let provider = MockProvider::builder().spawn().await;
        let (importer, store) = importer_for(&provider);

        let records = vec![json!({"id": "a"})];
        let err = importer.import_data("foo", &records).await.unwrap_err();

        assert!(matches!(err, SyncError::InvalidImportKind(kind) if kind == "foo"));
        assert!(store.is_empty("campaigns").await);
        assert!(store.is_empty("reports").await);
    }

    #[tokio::test]
    async fn test_import_data_upserts_by_id() {
        let provider = MockProvider::builder()
            .campaign(regular_campaign("c1", "2021_apr1_seg"))
            .content("c1", json!({"html": "<p>x</p>"}))
            .spawn()
            .await;
        let (importer, store) = importer_for(&provider);

        let import = importer.fetch_campaign_data("site-a", None).await.unwrap();

        let outcome = importer
            .import_data("campaignData", &import.campaign_data)
            .await
            .unwrap();
        assert_eq!((outcome.inserted, outcome.replaced), (1, 0));

        // Re-importing the same records replaces rather than duplicates
        let outcome = importer
            .import_data("campaignData", &import.campaign_data)
            .await
            .unwrap();
        assert_eq!((outcome.inserted, outcome.replaced), (0, 1));
        assert_eq!(store.len("campaigns").await, 1);
    }
}
