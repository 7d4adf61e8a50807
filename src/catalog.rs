//! Image-source collaborator records and their sort contract.
//!
//! The core does not fetch anything; it consumes the collaborator's listing
//! metadata and decoded image bytes. Only the record shape and the
//! `updated`-keyed ordering live here.

use chrono::NaiveDateTime;

use crate::error::{InklayError, InklayResult};

/// One listing entry from the image source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ImageRecord {
    pub url: String,
    pub created: String,
    pub updated: String,
}

/// Fixed short date/time format of `created`/`updated`, e.g. `5/2/22, 3:04 PM`.
pub const SHORT_DATE_FORMAT: &str = "%-m/%-d/%y, %-I:%M %p";

/// Parse the JSON listing body into records.
pub fn parse_records(json: &[u8]) -> InklayResult<Vec<ImageRecord>> {
    serde_json::from_slice(json)
        .map_err(|e| InklayError::decode(format!("invalid image listing: {e}")))
}

fn parse_short_date(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, SHORT_DATE_FORMAT).ok()
}

/// Sort records ascending by their `updated` timestamp. Records whose date
/// does not parse sort as `now`.
pub fn sort_by_updated(records: &mut [ImageRecord], now: NaiveDateTime) {
    records.sort_by_key(|r| parse_short_date(&r.updated).unwrap_or(now));
}

/// Upload filename convention: `<prefix>_image_<short date>`.
pub fn default_file_name(prefix: &str, now: NaiveDateTime) -> String {
    format!("{prefix}_image_{}", now.format(SHORT_DATE_FORMAT))
}
