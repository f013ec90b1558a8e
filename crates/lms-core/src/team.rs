// Team identifiers and case-insensitive name resolution.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::probability::ProbabilityTable;

/// A team in its canonical display form (the spelling used by the
/// probability data, e.g. "49ers", "Chiefs").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Team(String);

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Team(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Team {
    fn from(name: &str) -> Self {
        Team::new(name)
    }
}

/// The universe of known teams plus a lowercase lookup map.
///
/// Built once from the probability data and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct TeamRegistry {
    teams: BTreeSet<Team>,
    by_lowercase: HashMap<String, Team>,
}

impl TeamRegistry {
    /// Collect every team that appears in any week of `table`.
    pub fn from_table(table: &ProbabilityTable) -> Self {
        Self::from_names(
            table
                .weeks()
                .flat_map(|(_, week)| week.entries().iter().map(|e| e.team.name())),
        )
    }

    /// Build a registry from raw names. When two names differ only by case,
    /// the first one seen is the canonical form.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut registry = TeamRegistry::default();
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if registry.by_lowercase.contains_key(&key) {
                continue;
            }
            let team = Team::new(name);
            registry.teams.insert(team.clone());
            registry.by_lowercase.insert(key, team);
        }
        registry
    }

    /// Resolve free text to the canonical team. Surrounding whitespace is
    /// ignored; unknown names return `None`.
    pub fn resolve(&self, raw: &str) -> Option<&Team> {
        self.by_lowercase.get(&raw.trim().to_lowercase())
    }

    /// All known teams in canonical sort order.
    pub fn teams(&self) -> &BTreeSet<Team> {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}
