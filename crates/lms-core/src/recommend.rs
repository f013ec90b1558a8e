// Recommendation orchestration: history -> (current week, available set) ->
// survival search -> one pick or a message.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::info;

use crate::availability::{AvailabilityTracker, PickHistory};
use crate::probability::{ProbabilityTable, Week};
use crate::search::{MemoCache, SurvivalSearch};
use crate::settings::SeasonSettings;
use crate::team::{Team, TeamRegistry};

/// Why no pick could be recommended. These are normal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRecommendation {
    /// Every week already has a pick.
    AllWeeksFilled,
    /// The current week has no probability data.
    NoDataForWeek(Week),
    /// No available team has a usable probability for the current week.
    NoUsableTeam(Week),
}

impl NoRecommendation {
    pub fn message(&self) -> String {
        match self {
            NoRecommendation::AllWeeksFilled => {
                "All weeks already have picks. No recommendation available right now.".to_string()
            }
            NoRecommendation::NoDataForWeek(week) => {
                format!("No win probability data for Week {week}.")
            }
            NoRecommendation::NoUsableTeam(_) => {
                "No available team with win probability data. Check your previous picks."
                    .to_string()
            }
        }
    }
}

/// Outcome of a recommendation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    Pick {
        week: Week,
        team: Team,
        /// Survival probability along the best path within the horizon.
        probability: f64,
    },
    NoPick(NoRecommendation),
}

impl Recommendation {
    pub fn team(&self) -> Option<&Team> {
        match self {
            Recommendation::Pick { team, .. } => Some(team),
            Recommendation::NoPick(_) => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Pick {
                week,
                team,
                probability,
            } => write!(
                f,
                "Recommended Pick for Week {week}: {team} ({:.1}% win chance)",
                probability * 100.0
            ),
            Recommendation::NoPick(reason) => f.write_str(&reason.message()),
        }
    }
}

/// `{"week", "team", "probability"}` or `{"message"}`.
impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Recommendation::Pick {
                week,
                team,
                probability,
            } => {
                let mut s = serializer.serialize_struct("Recommendation", 3)?;
                s.serialize_field("week", week)?;
                s.serialize_field("team", team)?;
                s.serialize_field("probability", probability)?;
                s.end()
            }
            Recommendation::NoPick(reason) => {
                let mut s = serializer.serialize_struct("Recommendation", 1)?;
                s.serialize_field("message", &reason.message())?;
                s.end()
            }
        }
    }
}

/// Holds the immutable inputs shared by every request.
///
/// The table is stored with team names in their registry spelling, so data
/// that spells a team differently from week to week still matches the
/// available set.
#[derive(Debug, Clone)]
pub struct Recommender<'a> {
    table: ProbabilityTable,
    registry: &'a TeamRegistry,
    settings: SeasonSettings,
}

impl<'a> Recommender<'a> {
    pub fn new(
        table: &ProbabilityTable,
        registry: &'a TeamRegistry,
        settings: SeasonSettings,
    ) -> Self {
        Self {
            table: table.canonicalized(registry),
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &SeasonSettings {
        &self.settings
    }

    /// Recommend a pick for the first unfilled week of `history`.
    ///
    /// A fresh memo cache is created for this call and dropped before it
    /// returns.
    pub fn recommend(&self, history: &PickHistory) -> Recommendation {
        let tracker = AvailabilityTracker::new(self.registry, self.settings.total_weeks());

        let Some(week) = tracker.current_week(history) else {
            return Recommendation::NoPick(NoRecommendation::AllWeeksFilled);
        };

        if self.table.lookup(week).is_none() {
            return Recommendation::NoPick(NoRecommendation::NoDataForWeek(week));
        }

        let available = tracker.available_teams(history);
        let end_week = self.settings.end_week(week);
        let search = SurvivalSearch::new(&self.table, end_week);
        let mut cache = MemoCache::new();

        match search.best_pick(week, &available, &mut cache) {
            Some(best) => {
                info!(
                    "Week {} recommendation: {} ({:.4}) via {} through week {}, {} states",
                    week,
                    best.team,
                    best.probability,
                    self.settings.strategy(),
                    end_week,
                    cache.len()
                );
                Recommendation::Pick {
                    week,
                    team: best.team,
                    probability: best.probability,
                }
            }
            None => Recommendation::NoPick(NoRecommendation::NoUsableTeam(week)),
        }
    }
}
