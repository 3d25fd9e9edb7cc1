//! Record shapes stored by the pipeline and the raw provider payloads they
//! are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Campaign flavors this pipeline understands. Anything else the provider
/// returns is reported through [`InvalidCampaign`] and skipped.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignType {
    Regular,
    Variate,
}

/// Stored campaign record, keyed by the provider's campaign id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: String,
    pub list_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub campaign_type: CampaignType,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub promo_num: u32,
    pub segment: String,
    pub google_analytics: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variate_settings: Option<VariateSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variate_contents: Option<Vec<String>>,
}

/// Split-test configuration attached to variate campaigns. Only the
/// combination ids matter to this pipeline; everything else is carried
/// through untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VariateSettings {
    #[serde(default)]
    pub combinations: Vec<Combination>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Combination {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Campaign of a type the pipeline does not handle. Reported back to the
/// caller, never persisted.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InvalidCampaign {
    pub id: String,
    #[serde(rename = "type")]
    pub campaign_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    #[serde(rename = "regular")]
    Regular,
    #[serde(rename = "variate")]
    Variate,
    #[serde(rename = "variate-parent")]
    VariateParent,
    #[serde(rename = "variate-child")]
    VariateChild,
}

impl From<CampaignType> for ReportType {
    fn from(campaign_type: CampaignType) -> Self {
        match campaign_type {
            CampaignType::Regular => ReportType::Regular,
            CampaignType::Variate => ReportType::Variate,
        }
    }
}

/// Stored performance report, keyed by the provider's report id. Exactly one
/// of `child_ids` / `parent_id` is set, and only for variate-derived records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub id: String,
    pub site: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub promo_num: u32,
    pub segment: String,
    pub emails_sent: u64,
    pub abuse_reports: u64,
    pub unsubscribed: u64,
    pub bounces: Map<String, Value>,
    pub opens: Map<String, Value>,
    pub clicks: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

// --- raw provider payloads -------------------------------------------------

/// One page of `GET /campaigns`.
#[derive(Deserialize, Debug)]
pub struct CampaignListPage {
    #[serde(default)]
    pub campaigns: Vec<RawCampaign>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawCampaign {
    pub id: String,
    #[serde(rename = "type")]
    pub campaign_type: String,
    #[serde(default)]
    pub settings: RawCampaignSettings,
    #[serde(default)]
    pub tracking: RawTracking,
    #[serde(default)]
    pub recipients: RawRecipients,
    pub send_time: Option<DateTime<Utc>>,
    pub variate_settings: Option<VariateSettings>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawCampaignSettings {
    pub title: Option<String>,
    pub subject_line: Option<String>,
    pub preview_text: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawTracking {
    pub google_analytics: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawRecipients {
    pub list_id: Option<String>,
}

/// `GET /campaigns/{id}/content`. Regular campaigns carry `html`, variate
/// campaigns carry one entry per combination in `variate_contents`.
#[derive(Deserialize, Debug, Clone)]
pub struct RawContent {
    pub html: Option<String>,
    pub variate_contents: Option<Vec<RawVariateContent>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawVariateContent {
    pub html: String,
}

/// `GET /reports/{id}` payload, with the open-ended sub-objects kept as raw
/// maps so the normalizer can trim them field-by-field.
#[derive(Deserialize, Debug, Clone)]
pub struct RawReport {
    pub id: String,
    #[serde(default)]
    pub emails_sent: u64,
    #[serde(default)]
    pub abuse_reports: u64,
    #[serde(default)]
    pub unsubscribed: u64,
    #[serde(default)]
    pub bounces: Map<String, Value>,
    #[serde(default)]
    pub opens: Map<String, Value>,
    #[serde(default)]
    pub clicks: Map<String, Value>,
}
