pub mod cache_store;
pub mod codeforces;
pub mod config;
pub mod fake_feed;
pub mod feed;
pub mod fetcher;
pub mod history;
pub mod http_client;
pub mod leaderboard;
pub mod leetcode;
pub mod logging;
pub mod roster;
pub mod state;
