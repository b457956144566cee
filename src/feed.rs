use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use anyhow::Result;
use tracing::info;

use crate::cache_store::{CacheStore, open_store};
use crate::codeforces::{CodeforcesApi, ProviderRating, UNRANKED};
use crate::config::AppConfig;
use crate::fake_feed::FakeProvider;
use crate::fetcher::ProviderClient;
use crate::history::{HistorySource, RawContestHistory, normalize};
use crate::http_client::http_client;
use crate::leaderboard::{LeaderboardRow, RatingSource, assemble};
use crate::leetcode::LeetCodeApi;
use crate::roster::{Roster, RosterEntry};
use crate::state::{Delta, ProviderCommand};

/// Both halves of what the UI needs from the outside world.
pub trait StatsProvider: RatingSource + HistorySource + Send {}

impl<T> StatsProvider for T where T: RatingSource + HistorySource + Send {}

pub struct LiveProvider {
    codeforces: CodeforcesApi,
    leetcode: LeetCodeApi,
}

impl LiveProvider {
    pub fn new(provider: Arc<ProviderClient>, cfg: &AppConfig) -> Self {
        Self {
            codeforces: CodeforcesApi::new(provider.clone(), cfg.cf_api_base.clone()),
            leetcode: LeetCodeApi::new(provider, cfg.leetcode_graphql_url.clone()),
        }
    }
}

impl RatingSource for LiveProvider {
    fn fetch_rating(&self, handle: &str) -> Option<ProviderRating> {
        self.codeforces.fetch_rating(handle)
    }
}

impl HistorySource for LiveProvider {
    fn fetch_history(&self, member: &RosterEntry) -> RawContestHistory {
        let codeforces = if member.cf_username.is_empty() {
            Vec::new()
        } else {
            self.codeforces.fetch_history(&member.cf_username)
        };
        let leetcode = if member.lc_username.is_empty() {
            Vec::new()
        } else {
            self.leetcode.fetch_history(&member.lc_username)
        };
        RawContestHistory {
            leetcode,
            codeforces,
        }
    }
}

/// Builds the configured provider: the fake one when offline, otherwise the
/// live APIs over a shared client and cache store.
pub fn build_provider(cfg: &AppConfig) -> Result<Box<dyn StatsProvider>> {
    if cfg.offline {
        info!("offline mode, using fake provider");
        return Ok(Box::new(FakeProvider::default()));
    }
    let store: Arc<dyn CacheStore> = Arc::from(open_store(cfg.cache_backend)?);
    let client = http_client(Some(cfg.request_timeout))?.clone();
    let provider = Arc::new(ProviderClient::new(
        client,
        store,
        cfg.cache_policy,
        cfg.retry,
    ));
    Ok(Box::new(LiveProvider::new(provider, cfg)))
}

/// Runs one assembly and reports how many members came back without data.
pub fn refresh_leaderboard(
    roster: &Roster,
    provider: &dyn StatsProvider,
    parallelism: usize,
    tx: &Sender<Delta>,
) -> Vec<LeaderboardRow> {
    let rows = assemble(roster, provider, parallelism);
    let missing = rows
        .iter()
        .filter(|r| r.rating == 0 && r.rank == UNRANKED)
        .count();
    if missing > 0 {
        let _ = tx.send(Delta::Log(format!(
            "[WARN] {missing}/{} members have no rating data",
            rows.len()
        )));
    } else {
        let _ = tx.send(Delta::Log(format!("[INFO] Loaded {} members", rows.len())));
    }
    rows
}

pub fn spawn_provider(
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
    roster: Roster,
    provider: Box<dyn StatsProvider>,
    cfg: AppConfig,
) {
    thread::spawn(move || {
        let rows = refresh_leaderboard(&roster, provider.as_ref(), cfg.fetch_parallelism, &tx);
        if tx.send(Delta::SetLeaderboard(rows)).is_err() {
            return;
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::Refresh => {
                    let rows =
                        refresh_leaderboard(&roster, provider.as_ref(), cfg.fetch_parallelism, &tx);
                    let _ = tx.send(Delta::SetLeaderboard(rows));
                }
                ProviderCommand::FetchHistory { member_id } => {
                    let Some(member) = roster.get(&member_id) else {
                        let _ = tx.send(Delta::Log(format!(
                            "[WARN] Unknown member {member_id}"
                        )));
                        continue;
                    };
                    let raw = provider.fetch_history(&member.entry);
                    let history = normalize(raw, &cfg.date_format);
                    if history.is_empty() {
                        let _ = tx.send(Delta::Log(format!(
                            "[INFO] No contest data for {}",
                            member.entry.name
                        )));
                    }
                    let _ = tx.send(Delta::SetHistory { member_id, history });
                }
            }
        }
    });
}
