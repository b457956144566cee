use rayon::prelude::*;

use crate::codeforces::{ProviderRating, UNRANKED};
use crate::roster::{Roster, RosterMember};

/// Something that can look up a current rating by Codeforces handle.
pub trait RatingSource: Sync {
    fn fetch_rating(&self, handle: &str) -> Option<ProviderRating>;
}

/// Display band for a rating. `Unranked` is reserved for members whose
/// provider rank is "N/A".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankColor {
    Red,
    Orange,
    Blue,
    Cyan,
    Green,
    Gray,
    Unranked,
}

impl RankColor {
    pub fn label(self) -> &'static str {
        match self {
            RankColor::Red => "red",
            RankColor::Orange => "orange",
            RankColor::Blue => "blue",
            RankColor::Cyan => "cyan",
            RankColor::Green => "green",
            RankColor::Gray => "gray",
            RankColor::Unranked => "unranked",
        }
    }
}

const TIERS: [(u32, RankColor); 5] = [
    (2400, RankColor::Red),
    (2200, RankColor::Orange),
    (1600, RankColor::Blue),
    (1400, RankColor::Cyan),
    (1200, RankColor::Green),
];

pub fn tier_color(rating: u32) -> RankColor {
    TIERS
        .iter()
        .find(|(floor, _)| rating >= *floor)
        .map(|(_, color)| *color)
        .unwrap_or(RankColor::Gray)
}

pub fn rank_color(rank: &str, rating: u32) -> RankColor {
    if rank == UNRANKED {
        RankColor::Unranked
    } else {
        tier_color(rating)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub id: String,
    pub name: String,
    pub year: String,
    pub lc_username: String,
    pub cc_username: String,
    pub cf_username: String,
    pub rating: u32,
    pub max_rating: u32,
    pub rank: String,
    pub max_rank: String,
    pub title_photo: String,
    pub rank_color: RankColor,
    pub max_rank_color: RankColor,
}

impl LeaderboardRow {
    /// Builds a row, defaulting a missing rating. Each color comes from its
    /// own pair: `rank_color` from `rating` and `rank`, `max_rank_color`
    /// from `max_rating` and `max_rank`. The current rank is never colored
    /// by the max rating.
    pub fn new(member: &RosterMember, rating: Option<ProviderRating>) -> Self {
        let rating = rating.unwrap_or_default();
        let entry = &member.entry;
        Self {
            id: member.id.clone(),
            name: entry.name.clone(),
            year: entry.year.clone(),
            lc_username: entry.lc_username.clone(),
            cc_username: entry.cc_username.clone(),
            cf_username: entry.cf_username.clone(),
            rank_color: rank_color(&rating.rank, rating.rating),
            max_rank_color: rank_color(&rating.max_rank, rating.max_rating),
            rating: rating.rating,
            max_rating: rating.max_rating,
            rank: rating.rank,
            max_rank: rating.max_rank,
            title_photo: rating.title_photo,
        }
    }
}

/// Rows plus the loading flag the view renders from.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardView {
    pub rows: Vec<LeaderboardRow>,
    pub loading: bool,
}

impl LeaderboardView {
    pub fn loading() -> Self {
        Self {
            rows: Vec::new(),
            loading: true,
        }
    }

    pub fn ready(rows: Vec<LeaderboardRow>) -> Self {
        Self {
            rows,
            loading: false,
        }
    }
}

/// Fetches every member's rating in parallel, waits for all of them and
/// returns one row per member ordered by rating.
///
/// Members without a Codeforces handle skip the fetch and get default
/// values, like members whose fetch failed.
pub fn assemble<S>(roster: &Roster, source: &S, parallelism: usize) -> Vec<LeaderboardRow>
where
    S: RatingSource + ?Sized,
{
    let mut rows: Vec<LeaderboardRow> = with_fetch_pool(parallelism, || {
        roster
            .members()
            .par_iter()
            .map(|member| {
                let handle = member.entry.cf_username.trim();
                let rating = if handle.is_empty() {
                    None
                } else {
                    source.fetch_rating(handle)
                };
                LeaderboardRow::new(member, rating)
            })
            .collect()
    });
    sort_rows(&mut rows);
    rows
}

/// Rating descending. Stable, so equal ratings keep roster order.
pub fn sort_rows(rows: &mut [LeaderboardRow]) {
    rows.sort_by(|a, b| b.rating.cmp(&a.rating));
}

pub fn fetch_parallelism_from(raw: Option<&str>) -> usize {
    raw.and_then(|val| val.trim().parse::<usize>().ok())
        .unwrap_or(6)
        .clamp(2, 32)
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
