use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::roster::RosterEntry;

pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";
/// Space added above the highest rating on the chart's vertical axis.
pub const CHART_HEADROOM: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeetCodeContest {
    #[serde(default = "default_attended")]
    pub attended: bool,
    #[serde(default)]
    pub rating: f64,
    pub contest: LeetCodeContestInfo,
}

fn default_attended() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeetCodeContestInfo {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "startTime")]
    pub start_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeforcesContest {
    #[serde(rename = "contestId", default)]
    pub contest_id: Option<u64>,
    #[serde(rename = "contestName", default)]
    pub contest_name: String,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(rename = "ratingUpdateTimeSeconds")]
    pub rating_update_time_seconds: i64,
    #[serde(rename = "oldRating", default)]
    pub old_rating: i64,
    #[serde(rename = "newRating")]
    pub new_rating: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawContestHistory {
    pub leetcode: Vec<LeetCodeContest>,
    pub codeforces: Vec<CodeforcesContest>,
}

/// Something that can produce raw contest history for a roster member.
pub trait HistorySource: Sync {
    fn fetch_history(&self, member: &RosterEntry) -> RawContestHistory;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContestPoint {
    pub date: NaiveDate,
    pub rating: i64,
}

/// One provider's ratings in contest order. `dates[i]` and `ratings[i]`
/// describe `points[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingSeries {
    pub points: Vec<ContestPoint>,
    pub dates: Vec<String>,
    pub ratings: Vec<i64>,
}

impl RatingSeries {
    fn from_timed(mut timed: Vec<(i64, i64)>, date_format: &str) -> Self {
        timed.sort_by_key(|(ts, _)| *ts);

        let mut series = RatingSeries::default();
        for (ts, rating) in timed {
            let Some(date) = local_date(ts) else {
                continue;
            };
            series.points.push(ContestPoint { date, rating });
            series.dates.push(format_date(date, date_format));
            series.ratings.push(rating);
        }
        series
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    fn labelled(&self) -> impl Iterator<Item = (NaiveDate, &str)> + '_ {
        self.points
            .iter()
            .zip(self.dates.iter())
            .map(|(p, d)| (p.date, d.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedHistory {
    pub leetcode: RatingSeries,
    pub codeforces: RatingSeries,
}

impl NormalizedHistory {
    pub fn is_empty(&self) -> bool {
        self.leetcode.is_empty() && self.codeforces.is_empty()
    }

    /// Date labels of the earliest and latest contest across both series,
    /// i.e. the ends of a shared time axis.
    pub fn axis_labels(&self) -> Option<(&str, &str)> {
        let all = || self.leetcode.labelled().chain(self.codeforces.labelled());
        let first = all().min_by_key(|(date, _)| *date)?.1;
        let last = all().max_by_key(|(date, _)| *date)?.1;
        Some((first, last))
    }
}

pub fn normalize(raw: RawContestHistory, date_format: &str) -> NormalizedHistory {
    let date_format = checked_date_format(date_format);

    let leetcode = raw
        .leetcode
        .into_iter()
        .filter(|c| c.attended)
        .map(|c| (c.contest.start_time, c.rating.round() as i64))
        .collect();
    let codeforces = raw
        .codeforces
        .into_iter()
        .map(|c| (c.rating_update_time_seconds, c.new_rating))
        .collect();

    NormalizedHistory {
        leetcode: RatingSeries::from_timed(leetcode, date_format),
        codeforces: RatingSeries::from_timed(codeforces, date_format),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRange {
    pub min: i64,
    pub max: i64,
}

/// Vertical axis bounds over both series. A flat series gets a zero floor so
/// the axis never collapses to a single value.
pub fn chart_range(history: &NormalizedHistory) -> Option<ChartRange> {
    let mut all = history
        .leetcode
        .ratings
        .iter()
        .chain(history.codeforces.ratings.iter())
        .copied();
    let first = all.next()?;
    let (min, max) = all.fold((first, first), |(lo, hi), r| (lo.min(r), hi.max(r)));
    Some(ChartRange {
        min: if min == max { 0 } else { min },
        max: max.saturating_add(CHART_HEADROOM),
    })
}

/// A format is usable when it parses and renders for a plain date. Time
/// specifiers such as `%H` parse fine but cannot render without a time.
pub fn is_valid_date_format(fmt: &str) -> bool {
    if fmt.trim().is_empty() || StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return false;
    }
    let Some(probe_date) = NaiveDate::from_ymd_opt(2000, 1, 1) else {
        return false;
    };
    let mut out = String::new();
    write!(out, "{}", probe_date.format(fmt)).is_ok()
}

fn format_date(date: NaiveDate, fmt: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(fmt)).is_ok() {
        return out;
    }
    date.format(DEFAULT_DATE_FORMAT).to_string()
}

fn checked_date_format(fmt: &str) -> &str {
    if is_valid_date_format(fmt) {
        fmt
    } else {
        DEFAULT_DATE_FORMAT
    }
}

fn local_date(epoch_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch_secs, 0).map(|utc| utc.with_timezone(&Local).date_naive())
}
