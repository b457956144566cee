use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache_store::{CacheEntry, CachePolicy, CacheStore, now_secs};

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum FetchError {
    /// The only failure that is worth retrying.
    #[error("provider temporarily unavailable (http {status})")]
    Unavailable { status: u16 },

    #[error("http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider reported failure: {0}")]
    Provider(String),

    #[error("provider returned an empty result")]
    EmptyResult,

    #[error("invalid provider json: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Unavailable { .. })
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::SERVICE_UNAVAILABLE {
            FetchError::Unavailable {
                status: status.as_u16(),
            }
        } else {
            FetchError::Status {
                status: status.as_u16(),
                body: truncate(body, 200),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Cache-first HTTP access with bounded, fixed-delay retry.
///
/// Every provider endpoint goes through [`ProviderClient::fetch_cached`]:
/// the store is consulted first, and on a miss the request is sent until it
/// succeeds, fails for a non-retryable reason, or the retry budget runs out.
/// Only the provider payload (after `unwrap`) is stored.
pub struct ProviderClient {
    client: Client,
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
    retry: RetryPolicy,
}

impl ProviderClient {
    pub fn new(
        client: Client,
        store: Arc<dyn CacheStore>,
        policy: CachePolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            store,
            policy,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn fetch_cached<T>(
        &self,
        key: &str,
        request: impl Fn(&Client) -> RequestBuilder,
        unwrap: impl Fn(&str) -> Result<String, FetchError>,
        parse: impl Fn(&str) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        if let Some(entry) = self.store.get(key) {
            if self.policy.is_fresh(&entry, now_secs()) {
                match parse(&entry.body) {
                    Ok(value) => {
                        debug!(key, "cache hit");
                        return Ok(value);
                    }
                    Err(err) => debug!(key, %err, "ignoring unreadable cache entry"),
                }
            } else {
                debug!(key, "cache entry expired");
            }
        }

        let mut retries_left = self.retry.retries;
        loop {
            match self.fetch_once(&request, &unwrap, &parse) {
                Ok((payload, value)) => {
                    if let Err(err) = self.store.set(key, CacheEntry::new(payload)) {
                        warn!(key, %err, "failed to write cache entry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && retries_left > 0 => {
                    warn!(key, retries_left, %err, "retrying request");
                    thread::sleep(self.retry.delay);
                    retries_left -= 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fetch_once<T>(
        &self,
        request: &impl Fn(&Client) -> RequestBuilder,
        unwrap: &impl Fn(&str) -> Result<String, FetchError>,
        parse: &impl Fn(&str) -> Result<T, FetchError>,
    ) -> Result<(String, T), FetchError> {
        let resp = request(&self.client).send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(FetchError::from_status(status, body));
        }
        let payload = unwrap(&body)?;
        let value = parse(&payload)?;
        Ok((payload, value))
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
