// Memoized survival search.
//
// V(week, avail) is the best probability of surviving every week from `week`
// through the search's end week, using each team in `avail` at most once.
// Weeks past the end week count as certain survival; weeks with no data are
// skipped; a week with data but no usable available team is elimination.
//
// The memo cache is passed in explicitly. One cache per recommendation; a
// cache is never reused across different tables or end weeks.

use std::collections::HashMap;

use tracing::debug;

use crate::availability::AvailableSet;
use crate::probability::{ProbabilityTable, Week};
use crate::team::Team;

// ---------------------------------------------------------------------------
// Memo cache
// ---------------------------------------------------------------------------

/// `"{week}|{sorted,team,names}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(week: Week, avail: &AvailableSet) -> Self {
        StateKey(format!("{week}|{}", avail.canonical_key()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Values of already-evaluated states plus a hit counter.
#[derive(Debug, Default)]
pub struct MemoCache {
    values: HashMap<StateKey, f64>,
    hits: u64,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `(week, avail)`, without touching the counters.
    #[cfg(test)]
    fn peek(&self, week: Week, avail: &AvailableSet) -> Option<f64> {
        self.values.get(&StateKey::new(week, avail)).copied()
    }

    /// Number of distinct states evaluated.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    fn lookup(&mut self, key: &StateKey) -> Option<f64> {
        let value = self.values.get(key).copied();
        if value.is_some() {
            self.hits += 1;
        }
        value
    }

    fn store(&mut self, key: StateKey, value: f64) {
        self.values.insert(key, value);
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// A team together with the survival probability of the best path that
/// starts by picking it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub team: Team,
    pub probability: f64,
}

/// Search over a fixed table up to a fixed end week.
#[derive(Debug, Clone, Copy)]
pub struct SurvivalSearch<'a> {
    table: &'a ProbabilityTable,
    end_week: Week,
}

impl<'a> SurvivalSearch<'a> {
    pub fn new(table: &'a ProbabilityTable, end_week: Week) -> Self {
        Self { table, end_week }
    }

    pub fn end_week(&self) -> Week {
        self.end_week
    }

    /// Maximum probability of surviving `week..=end_week` with `avail`.
    /// Always within `[0, 1]`.
    ///
    /// Weeks without data are jumped over in one step, so states are only
    /// ever keyed by weeks that have data.
    pub fn value(&self, week: Week, avail: &AvailableSet, cache: &mut MemoCache) -> f64 {
        let Some((week, probabilities)) = self.table.next_week_with_data(week, self.end_week)
        else {
            return 1.0;
        };

        let key = StateKey::new(week, avail);
        if let Some(cached) = cache.lookup(&key) {
            return cached;
        }

        let mut best: Option<f64> = None;
        for (team, p) in probabilities.candidates() {
            if !avail.contains(team) {
                continue;
            }
            let survival = p * self.value_after(week, &avail.without(team), cache);
            if best.map_or(true, |b| survival > b) {
                best = Some(survival);
            }
        }
        let value = best.unwrap_or(0.0);

        cache.store(key, value);
        value
    }

    /// Value of the weeks following `week`.
    fn value_after(&self, week: Week, avail: &AvailableSet, cache: &mut MemoCache) -> f64 {
        if week >= self.end_week {
            return 1.0;
        }
        self.value(week + 1, avail, cache)
    }

    /// Best first pick at `week`. Candidates are scanned in data order and
    /// only a strictly greater value replaces the current best, so ties go
    /// to the team listed first. `None` when the week has no data or no
    /// available team has a usable probability.
    pub fn best_pick(
        &self,
        week: Week,
        avail: &AvailableSet,
        cache: &mut MemoCache,
    ) -> Option<Candidate> {
        let probabilities = self.table.lookup(week)?;

        let mut best: Option<Candidate> = None;
        for (team, p) in probabilities.candidates() {
            if !avail.contains(team) {
                continue;
            }
            let survival = p * self.value_after(week, &avail.without(team), cache);
            if best.as_ref().map_or(true, |b| survival > b.probability) {
                best = Some(Candidate {
                    team: team.clone(),
                    probability: survival,
                });
            }
        }

        debug!(
            week,
            end_week = self.end_week,
            states = cache.len(),
            hits = cache.hits(),
            "survival search finished"
        );
        best
    }
}
