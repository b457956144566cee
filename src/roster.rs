use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const BUNDLED_ROSTER: &str = include_str!("../data/members.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(default)]
    pub lc_username: String,
    #[serde(default)]
    pub cc_username: String,
    #[serde(default)]
    pub cf_username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    /// Map key from the roster file; opaque.
    pub id: String,
    pub entry: RosterEntry,
}

/// Tracked users in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: Vec<RosterMember>,
}

impl Roster {
    pub fn new(members: Vec<RosterMember>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[RosterMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RosterMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Looks a member up by map key first, then by any of their handles.
    pub fn find(&self, query: &str) -> Option<&RosterMember> {
        self.get(query).or_else(|| {
            self.members.iter().find(|m| {
                let e = &m.entry;
                [&e.cf_username, &e.lc_username, &e.cc_username]
                    .iter()
                    .any(|h| !h.is_empty() && h.eq_ignore_ascii_case(query))
            })
        })
    }
}

pub fn load_roster(path: Option<&Path>) -> Result<Roster> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read roster {}", path.display()))?;
            parse_roster_json(&raw).with_context(|| format!("parse roster {}", path.display()))
        }
        None => parse_roster_json(BUNDLED_ROSTER).context("parse bundled roster"),
    }
}

pub fn parse_roster_json(raw: &str) -> Result<Roster> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Roster::default());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid roster json")?;
    let Value::Object(map) = root else {
        return Err(anyhow!("roster must be a json object keyed by member id"));
    };

    let mut members = Vec::with_capacity(map.len());
    for (id, value) in map {
        let entry: RosterEntry = serde_json::from_value(value)
            .with_context(|| format!("invalid roster entry {id}"))?;
        members.push(RosterMember { id, entry });
    }
    Ok(Roster { members })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}
