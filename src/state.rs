use std::collections::{HashMap, HashSet, VecDeque};

use crate::history::NormalizedHistory;
use crate::leaderboard::{LeaderboardRow, LeaderboardView};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Leaderboard,
    Profile { member_id: String },
}

/// Requests from the UI thread to the provider worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    Refresh,
    FetchHistory { member_id: String },
}

/// Updates from the provider worker to the UI thread.
#[derive(Debug, Clone)]
pub enum Delta {
    SetLeaderboard(Vec<LeaderboardRow>),
    SetHistory {
        member_id: String,
        history: NormalizedHistory,
    },
    Log(String),
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub leaderboard: LeaderboardView,
    pub selected: usize,
    pub history: HashMap<String, NormalizedHistory>,
    pub history_loading: HashSet<String>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Leaderboard,
            leaderboard: LeaderboardView::loading(),
            selected: 0,
            history: HashMap::new(),
            history_loading: HashSet::new(),
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
        }
    }

    pub fn rows(&self) -> &[LeaderboardRow] {
        &self.leaderboard.rows
    }

    pub fn selected_row(&self) -> Option<&LeaderboardRow> {
        self.leaderboard.rows.get(self.selected)
    }

    pub fn row_by_id(&self, member_id: &str) -> Option<&LeaderboardRow> {
        self.leaderboard.rows.iter().find(|r| r.id == member_id)
    }

    pub fn select_next(&mut self) {
        let total = self.leaderboard.rows.len();
        if total > 0 && self.selected + 1 < total {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Switches to the profile screen for the selected row. Returns the
    /// member id when history still has to be requested.
    pub fn open_profile(&mut self) -> Option<String> {
        let member_id = self.selected_row()?.id.clone();
        self.screen = Screen::Profile {
            member_id: member_id.clone(),
        };
        if self.history.contains_key(&member_id) || self.history_loading.contains(&member_id) {
            return None;
        }
        self.history_loading.insert(member_id.clone());
        Some(member_id)
    }

    pub fn close_profile(&mut self) {
        self.screen = Screen::Leaderboard;
    }

    /// Marks the board as loading and drops cached history. Returns the
    /// member whose profile is open, whose history must be requested again.
    pub fn begin_refresh(&mut self) -> Option<String> {
        self.leaderboard.loading = true;
        self.history.clear();
        let Screen::Profile { member_id } = &self.screen else {
            return None;
        };
        let member_id = member_id.clone();
        self.history_loading.insert(member_id.clone());
        Some(member_id)
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetLeaderboard(rows) => {
            // Keep the cursor on the same member across re-sorts.
            let selected_id = state.selected_row().map(|r| r.id.clone());
            state.leaderboard = LeaderboardView::ready(rows);
            state.selected = selected_id
                .and_then(|id| state.leaderboard.rows.iter().position(|r| r.id == id))
                .unwrap_or(0);
        }
        Delta::SetHistory { member_id, history } => {
            state.history_loading.remove(&member_id);
            state.history.insert(member_id, history);
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
