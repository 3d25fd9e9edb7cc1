//! Decoder for the tracking key embedded in a campaign's analytics field.
//!
//! Keys look like `2020_jan2_sku_most`: a 4-digit year, a lowercase 3-letter
//! month token with a single promo digit, and a free-form segment that may
//! itself contain underscores.

use crate::errors::{Result, SyncError};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Metadata decoded out of a tracking key. Ephemeral; folded into the
/// campaign record by the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingKey {
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub promo_num: u32,
    pub segment: String,
}

/// Parses a tracking key into its parts.
///
/// Fails with [`SyncError::MalformedKey`] when the key does not match the
/// expected shape, and [`SyncError::UnknownMonth`] when the month token is
/// not one of the 12 standard abbreviations. A bad month never produces a
/// partial result.
pub fn decode(ga_key: &str) -> Result<TrackingKey> {
    let malformed = || SyncError::MalformedKey(ga_key.to_string());

    let (year_token, rest) = ga_key.split_once('_').ok_or_else(malformed)?;
    let (promo_token, segment) = rest.split_once('_').ok_or_else(malformed)?;

    // Exactly 4 digits; parse alone would also accept signed tokens
    if year_token.len() != 4 || !year_token.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }
    let year: i32 = year_token.parse().map_err(|_| malformed())?;

    // <3-letter month><1-digit promo>
    if promo_token.len() != 4 || !promo_token.is_ascii() {
        return Err(malformed());
    }
    let month_token = &promo_token[..3];
    let promo_num: u32 = promo_token[3..].parse().map_err(|_| malformed())?;

    let month = MONTHS
        .iter()
        .position(|m| *m == month_token)
        .map(|i| i as u32 + 1)
        .ok_or_else(|| SyncError::UnknownMonth(ga_key.to_string()))?;

    if segment.is_empty() {
        return Err(malformed());
    }

    Ok(TrackingKey {
        year,
        month,
        quarter: (month - 1) / 3 + 1,
        promo_num,
        segment: segment.to_string(),
    })
}
