use std::sync::mpsc;
use std::time::Duration;

use cp_leaderboard::config::AppConfig;
use cp_leaderboard::fake_feed::FakeProvider;
use cp_leaderboard::feed::{build_provider, refresh_leaderboard, spawn_provider};
use cp_leaderboard::history::HistorySource;
use cp_leaderboard::roster::load_roster;
use cp_leaderboard::state::{Delta, ProviderCommand};

const WAIT: Duration = Duration::from_secs(10);

fn offline_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "OFFLINE" => Some("1".to_string()),
        _ => None,
    })
}

#[test]
fn refresh_reports_missing_members() {
    let roster = load_roster(None).unwrap();
    let (tx, rx) = mpsc::channel();

    let rows = refresh_leaderboard(&roster, &FakeProvider { failure_rate: 1.0 }, 2, &tx);
    assert_eq!(rows.len(), roster.len());
    match rx.try_recv() {
        Ok(Delta::Log(msg)) => {
            assert!(msg.starts_with("[WARN]"));
            assert!(msg.contains(&format!("{}/{}", roster.len(), roster.len())));
        }
        other => panic!("expected warning log, got {other:?}"),
    }

    let _ = refresh_leaderboard(&roster, &FakeProvider { failure_rate: 0.0 }, 2, &tx);
    match rx.try_recv() {
        Ok(Delta::Log(msg)) => assert!(msg.starts_with("[INFO]")),
        other => panic!("expected info log, got {other:?}"),
    }
}

#[test]
fn offline_config_builds_fake_provider() {
    let cfg = offline_config();
    assert!(cfg.offline);
    let provider = build_provider(&cfg).unwrap();
    let roster = load_roster(None).unwrap();
    let history = provider.fetch_history(&roster.members()[0].entry);
    assert!(!history.codeforces.is_empty());
}

#[test]
fn worker_answers_initial_load_refresh_and_history() {
    let cfg = offline_config();
    let roster = load_roster(None).unwrap();
    let first_id = roster.members()[0].id.clone();
    let provider = build_provider(&cfg).unwrap();

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(tx, cmd_rx, roster.clone(), provider, cfg);

    let next_board = |rx: &mpsc::Receiver<Delta>| loop {
        match rx.recv_timeout(WAIT).expect("worker should answer") {
            Delta::SetLeaderboard(rows) => return rows,
            Delta::Log(_) => continue,
            other => panic!("unexpected delta {other:?}"),
        }
    };

    let initial = next_board(&rx);
    assert_eq!(initial.len(), roster.len());

    cmd_tx.send(ProviderCommand::Refresh).unwrap();
    let refreshed = next_board(&rx);
    assert_eq!(refreshed, initial);

    cmd_tx
        .send(ProviderCommand::FetchHistory {
            member_id: first_id.clone(),
        })
        .unwrap();
    loop {
        match rx.recv_timeout(WAIT).expect("worker should answer") {
            Delta::SetHistory { member_id, history } => {
                assert_eq!(member_id, first_id);
                assert!(!history.is_empty());
                break;
            }
            Delta::Log(_) => continue,
            other => panic!("unexpected delta {other:?}"),
        }
    }

    cmd_tx
        .send(ProviderCommand::FetchHistory {
            member_id: "nobody".to_string(),
        })
        .unwrap();
    match rx.recv_timeout(WAIT).expect("worker should answer") {
        Delta::Log(msg) => assert!(msg.contains("nobody")),
        other => panic!("unexpected delta {other:?}"),
    }
}

#[test]
fn refresh_then_history_arrive_in_request_order() {
    let cfg = offline_config();
    let roster = load_roster(None).unwrap();
    let member_id = roster.members()[1].id.clone();
    let provider = build_provider(&cfg).unwrap();

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(tx, cmd_rx, roster, provider, cfg);

    cmd_tx
        .send(ProviderCommand::FetchHistory {
            member_id: member_id.clone(),
        })
        .unwrap();
    cmd_tx.send(ProviderCommand::Refresh).unwrap();
    cmd_tx
        .send(ProviderCommand::FetchHistory {
            member_id: member_id.clone(),
        })
        .unwrap();

    let mut kinds = Vec::new();
    while kinds.len() < 4 {
        match rx.recv_timeout(WAIT).expect("worker should answer") {
            Delta::SetLeaderboard(_) => kinds.push("board"),
            Delta::SetHistory { member_id: id, history } => {
                assert_eq!(id, member_id);
                assert!(!history.is_empty());
                kinds.push("history");
            }
            Delta::Log(_) => {}
        }
    }
    assert_eq!(kinds, vec!["board", "history", "board", "history"]);
}
