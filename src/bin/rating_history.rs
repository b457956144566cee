use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use cp_leaderboard::config::AppConfig;
use cp_leaderboard::feed::build_provider;
use cp_leaderboard::history::{HistorySource, RatingSeries, chart_range, normalize};
use cp_leaderboard::logging;
use cp_leaderboard::roster::load_roster;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_stderr();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let query = positional_arg(&args)
        .context("usage: rating_history <member id or handle> [--roster <path>]")?;

    let mut cfg = AppConfig::from_env();
    if let Some(path) = parse_roster_arg(&args) {
        cfg.roster_path = Some(path);
    }

    let roster = load_roster(cfg.roster_path.as_deref())?;
    let member = roster
        .find(&query)
        .ok_or_else(|| anyhow!("no roster member matches {query}"))?;
    let provider = build_provider(&cfg)?;

    let history = normalize(provider.fetch_history(&member.entry), &cfg.date_format);

    println!("{} ({})", member.entry.name, member.id);
    if history.is_empty() {
        println!("No Contests Data");
        return Ok(());
    }
    print_series("LeetCode", &history.leetcode);
    print_series("Codeforces", &history.codeforces);
    if let Some(range) = chart_range(&history) {
        println!("Axis: {}..{}", range.min, range.max);
    }
    Ok(())
}

fn print_series(label: &str, series: &RatingSeries) {
    println!("{label}: {} contests", series.len());
    for (date, rating) in series.dates.iter().zip(&series.ratings) {
        println!("  {date:<12} {rating:>5}");
    }
}

fn positional_arg(args: &[String]) -> Option<String> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--roster" {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg.clone());
        }
    }
    None
}

fn parse_roster_arg(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--roster=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--roster" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
