use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("cp_leaderboard/", env!("CARGO_PKG_VERSION"));

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client; the timeout of the first caller wins.
pub fn http_client(timeout: Option<Duration>) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        build_http_client(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
    })
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build http client")
}
