// Pick history and the availability derived from it.
//
// Nothing here is cached: the current week and the available set are
// recomputed from the history on every request.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::probability::Week;
use crate::team::{Team, TeamRegistry};

// ---------------------------------------------------------------------------
// Pick history
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid pick history JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pick history must be a JSON array or an object keyed `week-N`")]
    UnsupportedShape,
}

/// One slot per week, index 0 is week 1. Slots hold raw participant text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickHistory {
    slots: Vec<Option<String>>,
}

impl PickHistory {
    /// Blank or whitespace-only slots are normalized to empty.
    pub fn new(slots: Vec<Option<String>>) -> Self {
        let slots = slots
            .into_iter()
            .map(|slot| slot.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
            .collect();
        Self { slots }
    }

    /// Convenience for string slices where `""` means empty.
    pub fn from_strs<'a>(slots: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(slots.into_iter().map(|s| Some(s.to_string())).collect())
    }

    /// Parse the legacy saved-picks format: either an array of strings
    /// (`null` or non-strings are empty slots) or an object with `week-N`
    /// keys. Unrecognized object keys are ignored. Picks for weeks after
    /// `last_week` are dropped before any slot is allocated.
    pub fn from_legacy_json(text: &str, last_week: Week) -> Result<Self, HistoryError> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Array(items) => {
                if items.len() > last_week as usize {
                    warn!(
                        "dropping {} saved picks past week {}",
                        items.len() - last_week as usize,
                        last_week
                    );
                }
                Ok(Self::new(
                    items
                        .into_iter()
                        .take(last_week as usize)
                        .map(|item| item.as_str().map(str::to_string))
                        .collect(),
                ))
            }
            Value::Object(map) => {
                let mut history = PickHistory::default();
                for (key, item) in map {
                    let Some(week) = key
                        .strip_prefix("week-")
                        .and_then(|n| n.parse::<Week>().ok())
                        .filter(|w| *w >= 1)
                    else {
                        debug!("ignoring legacy pick key '{}'", key);
                        continue;
                    };
                    let Some(team) = item.as_str() else {
                        continue;
                    };
                    if week > last_week {
                        warn!(
                            "dropping saved week {} pick '{}': season ends at week {}",
                            week, team, last_week
                        );
                        continue;
                    }
                    history.set(week, Some(team.to_string()));
                }
                Ok(history)
            }
            _ => Err(HistoryError::UnsupportedShape),
        }
    }

    /// Raw pick for `week`, if the slot is filled.
    pub fn get(&self, week: Week) -> Option<&str> {
        if week == 0 {
            return None;
        }
        self.slots
            .get(week as usize - 1)
            .and_then(|slot| slot.as_deref())
    }

    /// Fill or clear the slot for `week`, growing the history as needed.
    /// Week 0 is ignored.
    pub fn set(&mut self, week: Week, team: Option<String>) {
        if week == 0 {
            return;
        }
        let idx = week as usize - 1;
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = team.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    }

    /// Filled slots as `(week, raw name)` in week order.
    pub fn picks(&self) -> impl Iterator<Item = (Week, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_deref().map(|s| (i as Week + 1, s)))
    }

    pub fn slots(&self) -> &[Option<String>] {
        &self.slots
    }
}

// ---------------------------------------------------------------------------
// Available set
// ---------------------------------------------------------------------------

/// Teams not yet used. Ordered, so the memo key is independent of the order
/// in which teams were removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableSet {
    teams: BTreeSet<Team>,
}

impl AvailableSet {
    pub fn contains(&self, team: &Team) -> bool {
        self.teams.contains(team)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter()
    }

    /// A new set without `team`. The receiver is left untouched so sibling
    /// search branches never observe each other's removals.
    pub fn without(&self, team: &Team) -> AvailableSet {
        let mut next = self.clone();
        next.teams.remove(team);
        next
    }

    /// Canonical names joined by `,` in sorted order.
    pub fn canonical_key(&self) -> String {
        let names: Vec<&str> = self.teams.iter().map(Team::name).collect();
        names.join(",")
    }
}

impl FromIterator<Team> for AvailableSet {
    fn from_iter<I: IntoIterator<Item = Team>>(iter: I) -> Self {
        AvailableSet {
            teams: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Derives the current week and the available teams from a pick history.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityTracker<'a> {
    registry: &'a TeamRegistry,
    total_weeks: Week,
}

impl<'a> AvailabilityTracker<'a> {
    pub fn new(registry: &'a TeamRegistry, total_weeks: Week) -> Self {
        Self {
            registry,
            total_weeks,
        }
    }

    /// First week in `1..=total_weeks` with an empty slot. Slots past the end
    /// of the history count as empty; `None` when every week is filled.
    pub fn current_week(&self, history: &PickHistory) -> Option<Week> {
        (1..=self.total_weeks).find(|week| history.get(*week).is_none())
    }

    /// Every known team minus those consumed by resolvable picks.
    /// Unresolvable names are skipped without removing anything.
    pub fn available_teams(&self, history: &PickHistory) -> AvailableSet {
        let mut available: BTreeSet<Team> = self.registry.teams().clone();
        for (week, raw) in history.picks() {
            match self.registry.resolve(raw) {
                Some(team) => {
                    available.remove(team);
                }
                None => debug!("week {} pick '{}' matches no known team", week, raw),
            }
        }
        AvailableSet { teams: available }
    }
}
