use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::codeforces::{PLACEHOLDER_PHOTO, ProviderRating};
use crate::history::{
    CodeforcesContest, HistorySource, LeetCodeContest, LeetCodeContestInfo, RawContestHistory,
};
use crate::leaderboard::RatingSource;
use crate::roster::RosterEntry;

const CONTEST_SPACING_SECS: i64 = 7 * 24 * 3600;
const FIRST_CONTEST_TS: i64 = 1_672_531_200;

const CF_RANKS: [(i64, &str); 6] = [
    (2400, "international grandmaster"),
    (2200, "master"),
    (1600, "expert"),
    (1400, "specialist"),
    (1200, "pupil"),
    (0, "newbie"),
];

/// Offline stand-in for the live providers. Numbers are random but seeded
/// by handle, so the same handle always looks the same.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    /// Chance that a handle yields no rating.
    pub failure_rate: f64,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self { failure_rate: 0.1 }
    }
}

impl RatingSource for FakeProvider {
    fn fetch_rating(&self, handle: &str) -> Option<ProviderRating> {
        let mut rng = rng_for(handle);
        if rng.gen_bool(self.failure_rate.clamp(0.0, 1.0)) {
            return None;
        }
        let rating = rng.gen_range(800..2600i64);
        let max_rating = rating + rng.gen_range(0..300i64);
        Some(ProviderRating {
            rating: rating as u32,
            max_rating: max_rating as u32,
            rank: rank_name(rating).to_string(),
            max_rank: rank_name(max_rating).to_string(),
            title_photo: PLACEHOLDER_PHOTO.to_string(),
        })
    }
}

impl HistorySource for FakeProvider {
    fn fetch_history(&self, member: &RosterEntry) -> RawContestHistory {
        let mut raw = RawContestHistory::default();

        if !member.cf_username.is_empty() {
            let mut rng = rng_for(&member.cf_username);
            let mut rating = 1400i64;
            for idx in 0..rng.gen_range(4..16i64) {
                let old = rating;
                rating = (rating + rng.gen_range(-120..150i64)).max(0);
                raw.codeforces.push(CodeforcesContest {
                    contest_id: Some(1800 + idx as u64),
                    contest_name: format!("Codeforces Round {}", 900 + idx),
                    rank: Some(rng.gen_range(1..20_000u32)),
                    rating_update_time_seconds: FIRST_CONTEST_TS + idx * CONTEST_SPACING_SECS,
                    old_rating: old,
                    new_rating: rating,
                });
            }
        }

        if !member.lc_username.is_empty() {
            let mut rng = rng_for(&member.lc_username);
            let mut rating = 1500.0f64;
            for idx in 0..rng.gen_range(3..12i64) {
                rating = (rating + rng.gen_range(-60.0..90.0)).max(0.0);
                raw.leetcode.push(LeetCodeContest {
                    attended: true,
                    rating,
                    contest: LeetCodeContestInfo {
                        title: format!("Weekly Contest {}", 350 + idx),
                        start_time: FIRST_CONTEST_TS + 3600 + idx * CONTEST_SPACING_SECS,
                    },
                });
            }
        }

        // Providers do not promise ordering; neither does the fake.
        raw.codeforces.reverse();
        raw
    }
}

fn rank_name(rating: i64) -> &'static str {
    CF_RANKS
        .iter()
        .find(|(floor, _)| rating >= *floor)
        .map(|(_, name)| *name)
        .unwrap_or("newbie")
}

fn rng_for(handle: &str) -> StdRng {
    let seed = handle
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });
    StdRng::seed_from_u64(seed)
}
