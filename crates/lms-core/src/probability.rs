// Per-week win probability data.
//
// Entries keep the order in which the data supplied them: that order is the
// tie-break order of the recommender. Malformed values are retained so the
// table mirrors its source, and filtered wherever candidates are drawn.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::team::{Team, TeamRegistry};

/// 1-based week number within a season.
pub type Week = u32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid probability JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("probability data must be a JSON object keyed by week number")]
    NotAnObject,

    #[error("invalid week key `{0}`: expected an integer >= 1")]
    InvalidWeek(String),

    #[error("week {week} must map team names to probabilities")]
    WeekNotAnObject { week: Week },
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A single (team, probability) row for one week. `probability` is `None`
/// when the source value was not a number at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityEntry {
    pub team: Team,
    pub probability: Option<f64>,
}

impl ProbabilityEntry {
    /// The probability if it can be used as a pick candidate.
    pub fn usable(&self) -> Option<f64> {
        self.probability.filter(|p| is_usable(*p))
    }
}

/// Whether `p` is a valid candidate probability: finite and within (0, 1].
pub fn is_usable(p: f64) -> bool {
    p.is_finite() && p > 0.0 && p <= 1.0
}

/// One week of team probabilities, in data order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekProbabilities {
    entries: Vec<ProbabilityEntry>,
}

impl WeekProbabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. A team already present keeps its first value.
    pub fn push(&mut self, team: Team, probability: Option<f64>) {
        if self.entries.iter().any(|e| e.team == team) {
            warn!("duplicate probability entry for '{}', keeping the first", team);
            return;
        }
        self.entries.push(ProbabilityEntry { team, probability });
    }

    pub fn entries(&self) -> &[ProbabilityEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Usable probability for `team`, if any.
    pub fn get(&self, team: &Team) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| &e.team == team)
            .and_then(ProbabilityEntry::usable)
    }

    /// Valid candidates in data order.
    pub fn candidates(&self) -> impl Iterator<Item = (&Team, f64)> {
        self.entries
            .iter()
            .filter_map(|e| e.usable().map(|p| (&e.team, p)))
    }
}

impl<T: Into<Team>> FromIterator<(T, f64)> for WeekProbabilities {
    fn from_iter<I: IntoIterator<Item = (T, f64)>>(iter: I) -> Self {
        let mut week = WeekProbabilities::new();
        for (team, p) in iter {
            week.push(team.into(), Some(p));
        }
        week
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Week number -> that week's probabilities. Read-only once assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityTable {
    weeks: BTreeMap<Week, WeekProbabilities>,
}

impl ProbabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"7": {"Chiefs": 0.788, ...}, "8": {...}}`. Team order within
    /// a week follows the document. Non-numeric values are kept as unusable
    /// entries rather than rejected.
    pub fn from_json_str(text: &str) -> Result<Self, TableError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self, TableError> {
        let Value::Object(weeks) = value else {
            return Err(TableError::NotAnObject);
        };

        let mut table = ProbabilityTable::new();
        for (key, teams) in weeks {
            let week = parse_week(key)?;
            let Value::Object(teams) = teams else {
                return Err(TableError::WeekNotAnObject { week });
            };
            let mut probabilities = WeekProbabilities::new();
            for (team, raw) in teams {
                let name = team.trim();
                if name.is_empty() {
                    continue;
                }
                probabilities.push(Team::new(name), raw.as_f64());
            }
            table.insert_week(week, probabilities);
        }
        Ok(table)
    }

    /// Insert or replace a full week.
    pub fn insert_week(&mut self, week: Week, probabilities: WeekProbabilities) {
        self.weeks.insert(week, probabilities);
    }

    /// `None` means no modeled data for the week; that is not an error.
    pub fn lookup(&self, week: Week) -> Option<&WeekProbabilities> {
        self.weeks.get(&week)
    }

    /// First week in `from..=through` that has data.
    pub fn next_week_with_data(
        &self,
        from: Week,
        through: Week,
    ) -> Option<(Week, &WeekProbabilities)> {
        if from > through {
            return None;
        }
        self.weeks.range(from..=through).next().map(|(w, p)| (*w, p))
    }

    /// Copy of the table with every team spelled the way `registry` spells
    /// it. Names the registry does not know are kept as they are.
    pub fn canonicalized(&self, registry: &TeamRegistry) -> ProbabilityTable {
        let mut table = ProbabilityTable::new();
        for (week, probabilities) in &self.weeks {
            let mut canonical = WeekProbabilities::new();
            for entry in probabilities.entries() {
                let team = registry
                    .resolve(entry.team.name())
                    .cloned()
                    .unwrap_or_else(|| entry.team.clone());
                canonical.push(team, entry.probability);
            }
            table.insert_week(*week, canonical);
        }
        table
    }

    pub fn weeks(&self) -> impl Iterator<Item = (Week, &WeekProbabilities)> {
        self.weeks.iter().map(|(w, p)| (*w, p))
    }

    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }
}

fn parse_week(key: &str) -> Result<Week, TableError> {
    match key.trim().parse::<Week>() {
        Ok(week) if week >= 1 => Ok(week),
        _ => Err(TableError::InvalidWeek(key.to_string())),
    }
}
