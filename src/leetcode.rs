use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use crate::fetcher::{FetchError, ProviderClient};
use crate::history::LeetCodeContest;

pub const DEFAULT_GRAPHQL_URL: &str = "https://leetcode.com/graphql";

const CONTEST_HISTORY_QUERY: &str = r#"
query userContestRankingHistory($username: String!) {
  userContestRankingHistory(username: $username) {
    attended
    rating
    contest {
      title
      startTime
    }
  }
}
"#;

pub fn contests_cache_key(handle: &str) -> String {
    format!("leetcode:contests:{handle}")
}

pub struct LeetCodeApi {
    provider: Arc<ProviderClient>,
    graphql_url: String,
}

impl LeetCodeApi {
    pub fn new(provider: Arc<ProviderClient>, graphql_url: impl Into<String>) -> Self {
        Self {
            provider,
            graphql_url: graphql_url.into(),
        }
    }

    pub fn fetch_history(&self, handle: &str) -> Vec<LeetCodeContest> {
        match self.try_fetch_history(handle) {
            Ok(contests) => contests,
            Err(err) => {
                error!(handle, %err, "error fetching leetcode contest history");
                Vec::new()
            }
        }
    }

    pub fn try_fetch_history(&self, handle: &str) -> Result<Vec<LeetCodeContest>, FetchError> {
        let body = json!({
            "query": CONTEST_HISTORY_QUERY,
            "variables": { "username": handle },
        });
        self.provider.fetch_cached(
            &contests_cache_key(handle),
            |client| client.post(&self.graphql_url).json(&body),
            unwrap_contest_history,
            parse_contest_history_json,
        )
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
}

/// Pulls `data.userContestRankingHistory` out of a GraphQL response. A user
/// without contests comes back as `null` and is stored as `[]`.
pub fn unwrap_contest_history(raw: &str) -> Result<String, FetchError> {
    let resp: GraphqlResponse = serde_json::from_str(raw.trim())?;
    if let Some(err) = resp.errors.first() {
        return Err(FetchError::Provider(err.message.clone()));
    }
    let history = resp
        .data
        .as_ref()
        .and_then(|d| d.get("userContestRankingHistory"))
        .cloned()
        .unwrap_or(Value::Null);
    if history.is_null() {
        return Ok("[]".to_string());
    }
    Ok(serde_json::to_string(&history)?)
}

pub fn parse_contest_history_json(raw: &str) -> Result<Vec<LeetCodeContest>, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_errors_surface_as_provider_errors() {
        let err = unwrap_contest_history(
            r#"{"data":{"userContestRankingHistory":null},"errors":[{"message":"That user does not exist."}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Provider(ref m) if m.contains("does not exist")));
    }

    #[test]
    fn null_history_is_empty() {
        let payload = unwrap_contest_history(r#"{"data":{"userContestRankingHistory":null}}"#)
            .expect("null history is fine");
        assert!(parse_contest_history_json(&payload).unwrap().is_empty());
    }

    #[test]
    fn contest_records_parse() {
        let payload = unwrap_contest_history(
            r#"{"data":{"userContestRankingHistory":[
                {"attended":true,"rating":1523.7,"contest":{"title":"Weekly Contest 300","startTime":1656815400}},
                {"attended":false,"rating":1500,"contest":{"title":"Weekly Contest 299","startTime":1656210600}}
            ]}}"#,
        )
        .unwrap();
        let contests = parse_contest_history_json(&payload).unwrap();
        assert_eq!(contests.len(), 2);
        assert!(!contests[1].attended);
        assert_eq!(contests[0].contest.start_time, 1656815400);
    }
}
