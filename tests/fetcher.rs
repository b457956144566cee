use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;

use cp_leaderboard::cache_store::{CacheEntry, CachePolicy, CacheStore, MemoryStore};
use cp_leaderboard::codeforces::{CodeforcesApi, UNRANKED, user_cache_key};
use cp_leaderboard::fetcher::{ProviderClient, RetryPolicy};
use cp_leaderboard::http_client::build_http_client;
use cp_leaderboard::leetcode::LeetCodeApi;

const TOURIST_JSON: &str = r#"{
    "status": "OK",
    "result": [{
        "handle": "tourist",
        "rating": 3757,
        "maxRating": 4009,
        "rank": "legendary grandmaster",
        "maxRank": "tourist",
        "titlePhoto": "https://userpic.codeforces.org/422/title/50a270ed4a722867.jpg"
    }]
}"#;

fn provider_with(store: Arc<dyn CacheStore>, policy: CachePolicy, retries: u32) -> Arc<ProviderClient> {
    let client = build_http_client(Duration::from_secs(5)).expect("client should build");
    Arc::new(ProviderClient::new(
        client,
        store,
        policy,
        RetryPolicy {
            retries,
            delay: Duration::from_millis(10),
        },
    ))
}

#[test]
fn cached_handle_skips_network_on_second_fetch() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/user.info")
            .query_param("handles", "tourist");
        then.status(200)
            .header("content-type", "application/json")
            .body(TOURIST_JSON);
    });

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
    let api = CodeforcesApi::new(
        provider_with(store.clone(), CachePolicy::Forever, 3),
        server.url("/api"),
    );

    let first = api.fetch_rating("tourist").expect("first fetch should succeed");
    let second = api.fetch_rating("tourist").expect("cached fetch should succeed");
    assert_eq!(first, second);
    assert_eq!(first.rating, 3757);
    assert_eq!(first.max_rank, "tourist");
    mock.assert_hits(1);

    let cached = store
        .get(&user_cache_key("tourist"))
        .expect("record should be cached");
    let cached: serde_json::Value = serde_json::from_str(&cached.body).unwrap();
    assert_eq!(cached["handle"], "tourist");
}

#[test]
fn always_unavailable_is_attempted_retries_plus_one_times() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/user.info");
        then.status(503).body("Service Temporarily Unavailable");
    });

    let api = CodeforcesApi::new(
        provider_with(Arc::new(MemoryStore::default()), CachePolicy::Forever, 3),
        server.url("/api"),
    );

    assert!(api.fetch_rating("busy").is_none());
    mock.assert_hits(4);
}

#[test]
fn non_retryable_failure_is_attempted_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/user.info");
        then.status(400)
            .header("content-type", "application/json")
            .body(r#"{"status":"FAILED","comment":"handles: User with handle ghost not found"}"#);
    });

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
    let api = CodeforcesApi::new(
        provider_with(store.clone(), CachePolicy::Forever, 3),
        server.url("/api"),
    );

    assert!(api.fetch_rating("ghost").is_none());
    mock.assert_hits(1);
    assert!(store.get(&user_cache_key("ghost")).is_none());
}

#[test]
fn failed_status_inside_ok_response_is_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/user.info");
        then.status(200).body(r#"{"status":"FAILED","comment":"Call limit exceeded"}"#);
    });

    let api = CodeforcesApi::new(
        provider_with(Arc::new(MemoryStore::default()), CachePolicy::Forever, 2),
        server.url("/api"),
    );

    assert!(api.fetch_rating("anyone").is_none());
    mock.assert_hits(1);
}

#[test]
fn sparse_record_gets_defaults() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/user.info");
        then.status(200).body(r#"{"status":"OK","result":[{"handle":"fresh"}]}"#);
    });

    let api = CodeforcesApi::new(
        provider_with(Arc::new(MemoryStore::default()), CachePolicy::Forever, 0),
        server.url("/api"),
    );

    let rating = api.fetch_rating("fresh").expect("sparse record is still a record");
    assert_eq!(rating.rating, 0);
    assert_eq!(rating.rank, UNRANKED);
    assert_eq!(rating.max_rank, UNRANKED);
}

#[test]
fn expired_entry_is_refetched() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/user.info");
        then.status(200).body(TOURIST_JSON);
    });

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
    store
        .set(
            &user_cache_key("tourist"),
            CacheEntry {
                body: r#"{"handle":"tourist","rating":1000}"#.to_string(),
                fetched_at: 0,
            },
        )
        .unwrap();

    let api = CodeforcesApi::new(
        provider_with(store, CachePolicy::Ttl(Duration::from_secs(60)), 0),
        server.url("/api"),
    );

    let rating = api.fetch_rating("tourist").unwrap();
    assert_eq!(rating.rating, 3757);
    mock.assert_hits(1);
}

#[test]
fn forever_policy_serves_old_entries() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/user.info");
        then.status(200).body(TOURIST_JSON);
    });

    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
    store
        .set(
            &user_cache_key("tourist"),
            CacheEntry {
                body: r#"{"handle":"tourist","rating":1000}"#.to_string(),
                fetched_at: 0,
            },
        )
        .unwrap();

    let api = CodeforcesApi::new(provider_with(store, CachePolicy::Forever, 0), server.url("/api"));

    assert_eq!(api.fetch_rating("tourist").unwrap().rating, 1000);
    mock.assert_hits(0);
}

#[test]
fn codeforces_history_is_fetched_and_cached() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/user.rating")
            .query_param("handle", "tourist");
        then.status(200).body(
            r#"{"status":"OK","result":[
                {"contestId":2,"contestName":"Round 2","rank":1,"ratingUpdateTimeSeconds":1700100000,"oldRating":1600,"newRating":1700},
                {"contestId":1,"contestName":"Round 1","rank":5,"ratingUpdateTimeSeconds":1700000000,"oldRating":1500,"newRating":1600}
            ]}"#,
        );
    });

    let api = CodeforcesApi::new(
        provider_with(Arc::new(MemoryStore::default()), CachePolicy::Forever, 0),
        server.url("/api"),
    );

    let first = api.fetch_history("tourist");
    let second = api.fetch_history("tourist");
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    mock.assert_hits(1);
}

#[test]
fn leetcode_history_posts_graphql() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("userContestRankingHistory")
            .body_includes("lc_user");
        then.status(200).body(
            r#"{"data":{"userContestRankingHistory":[
                {"attended":true,"rating":1550.4,"contest":{"title":"Weekly Contest 1","startTime":1700000000}}
            ]}}"#,
        );
    });

    let api = LeetCodeApi::new(
        provider_with(Arc::new(MemoryStore::default()), CachePolicy::Forever, 0),
        server.url("/graphql"),
    );

    let contests = api.fetch_history("lc_user");
    assert_eq!(contests.len(), 1);
    assert_eq!(contests[0].contest.title, "Weekly Contest 1");
    mock.assert_hits(1);
}
