use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::fetcher::{FetchError, ProviderClient};
use crate::history::CodeforcesContest;

pub const DEFAULT_API_BASE: &str = "https://codeforces.com/api";
pub const PLACEHOLDER_PHOTO: &str = "https://userpic.codeforces.org/no-title.jpg";
pub const UNRANKED: &str = "N/A";

/// Rating snapshot with every provider field already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRating {
    pub rating: u32,
    pub max_rating: u32,
    pub rank: String,
    pub max_rank: String,
    pub title_photo: String,
}

impl Default for ProviderRating {
    fn default() -> Self {
        Self {
            rating: 0,
            max_rating: 0,
            rank: UNRANKED.to_string(),
            max_rank: UNRANKED.to_string(),
            title_photo: PLACEHOLDER_PHOTO.to_string(),
        }
    }
}

/// `user.info` record as the provider sends it; any field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUserInfo {
    pub handle: Option<String>,
    pub rating: Option<i64>,
    pub max_rating: Option<i64>,
    pub rank: Option<String>,
    pub max_rank: Option<String>,
    pub title_photo: Option<String>,
}

impl From<RawUserInfo> for ProviderRating {
    fn from(raw: RawUserInfo) -> Self {
        Self {
            rating: clamp_rating(raw.rating),
            max_rating: clamp_rating(raw.max_rating),
            rank: non_empty(raw.rank).unwrap_or_else(|| UNRANKED.to_string()),
            max_rank: non_empty(raw.max_rank).unwrap_or_else(|| UNRANKED.to_string()),
            title_photo: non_empty(raw.title_photo)
                .unwrap_or_else(|| PLACEHOLDER_PHOTO.to_string()),
        }
    }
}

fn clamp_rating(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn user_cache_key(handle: &str) -> String {
    format!("codeforces:user:{handle}")
}

pub fn rating_history_cache_key(handle: &str) -> String {
    format!("codeforces:rating:{handle}")
}

pub struct CodeforcesApi {
    provider: Arc<ProviderClient>,
    base_url: String,
}

impl CodeforcesApi {
    pub fn new(provider: Arc<ProviderClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { provider, base_url }
    }

    /// Current rating for `handle`, or `None` when the provider could not
    /// deliver one. Failures are logged, never returned.
    pub fn fetch_rating(&self, handle: &str) -> Option<ProviderRating> {
        match self.try_fetch_rating(handle) {
            Ok(rating) => Some(rating),
            Err(err) => {
                error!(handle, %err, "error fetching rating");
                None
            }
        }
    }

    pub fn try_fetch_rating(&self, handle: &str) -> Result<ProviderRating, FetchError> {
        let url = format!("{}/user.info", self.base_url);
        self.provider.fetch_cached(
            &user_cache_key(handle),
            |client| client.get(&url).query(&[("handles", handle)]),
            unwrap_first_result,
            parse_user_record_json,
        )
    }

    pub fn fetch_history(&self, handle: &str) -> Vec<CodeforcesContest> {
        match self.try_fetch_history(handle) {
            Ok(contests) => contests,
            Err(err) => {
                error!(handle, %err, "error fetching codeforces contest history");
                Vec::new()
            }
        }
    }

    pub fn try_fetch_history(&self, handle: &str) -> Result<Vec<CodeforcesContest>, FetchError> {
        let url = format!("{}/user.rating", self.base_url);
        self.provider.fetch_cached(
            &rating_history_cache_key(handle),
            |client| client.get(&url).query(&[("handle", handle)]),
            unwrap_result,
            parse_rating_changes_json,
        )
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

fn open_envelope(raw: &str) -> Result<Value, FetchError> {
    let envelope: Envelope = serde_json::from_str(raw.trim())?;
    if let Some(status) = envelope.status.as_deref() {
        if !status.eq_ignore_ascii_case("OK") {
            let comment = envelope.comment.unwrap_or_else(|| status.to_string());
            return Err(FetchError::Provider(comment));
        }
    }
    envelope.result.ok_or(FetchError::EmptyResult)
}

/// Extracts `result[0]` from a `user.info` response as a JSON string.
pub fn unwrap_first_result(raw: &str) -> Result<String, FetchError> {
    let result = open_envelope(raw)?;
    let first = result
        .as_array()
        .and_then(|items| items.first())
        .ok_or(FetchError::EmptyResult)?;
    Ok(serde_json::to_string(first)?)
}

/// Extracts the whole `result` array from a response as a JSON string.
pub fn unwrap_result(raw: &str) -> Result<String, FetchError> {
    let result = open_envelope(raw)?;
    if result.is_null() {
        return Ok("[]".to_string());
    }
    Ok(serde_json::to_string(&result)?)
}

pub fn parse_user_record_json(raw: &str) -> Result<ProviderRating, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FetchError::EmptyResult);
    }
    let record: RawUserInfo = serde_json::from_str(trimmed)?;
    Ok(record.into())
}

pub fn parse_rating_changes_json(raw: &str) -> Result<Vec<CodeforcesContest>, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}
