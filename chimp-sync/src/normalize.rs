//! Reshapes raw provider reports into the canonical stored record.

use serde_json::{Map, Value};

use crate::types::{Campaign, RawReport, Report, ReportType};

// Sub-fields that are redundant with top-level counters or derivable from
// other fields. Trimmed from every stored report.
const BOUNCE_AGGREGATES: &[&str] = &["syntax_errors"];
const OPEN_AGGREGATES: &[&str] = &["opens_total", "last_open"];
const CLICK_AGGREGATES: &[&str] = &["clicks_total", "unique_clicks", "last_click"];

/// Where a report sits in a variate campaign's parent/child fan-out. Absent
/// for plain single reports.
#[derive(Debug, Clone)]
pub enum VariantRole {
    Parent { child_ids: Vec<String> },
    Child { parent_id: String },
}

/// Builds a stored [`Report`] from a raw payload plus the campaign metadata
/// it belongs to.
///
/// The raw input is left untouched: the open-ended sub-objects are cloned
/// and the aggregate fields removed on the clones, so a raw report can be
/// normalized more than once. Removing a field that is already absent is a
/// no-op.
pub fn normalize(
    site: &str,
    campaign: &Campaign,
    raw: &RawReport,
    role: Option<VariantRole>,
) -> Report {
    let report_type = match role {
        Some(VariantRole::Parent { .. }) => ReportType::VariateParent,
        Some(VariantRole::Child { .. }) => ReportType::VariateChild,
        None => campaign.campaign_type.into(),
    };

    let (child_ids, parent_id) = match role {
        Some(VariantRole::Parent { child_ids }) => (Some(child_ids), None),
        Some(VariantRole::Child { parent_id }) => (None, Some(parent_id)),
        None => (None, None),
    };

    Report {
        id: raw.id.clone(),
        site: site.to_string(),
        report_type,
        year: campaign.year,
        quarter: campaign.quarter,
        month: campaign.month,
        promo_num: campaign.promo_num,
        segment: campaign.segment.clone(),
        emails_sent: raw.emails_sent,
        abuse_reports: raw.abuse_reports,
        unsubscribed: raw.unsubscribed,
        bounces: strip(&raw.bounces, BOUNCE_AGGREGATES),
        opens: strip(&raw.opens, OPEN_AGGREGATES),
        clicks: strip(&raw.clicks, CLICK_AGGREGATES),
        child_ids,
        parent_id,
    }
}

fn strip(source: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut trimmed = source.clone();
    for field in fields {
        trimmed.remove(*field);
    }
    trimmed
}
