// Season shape and search tuning.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probability::Week;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("total_weeks must be greater than 0")]
    ZeroTotalWeeks,

    #[error("horizon_weeks must be greater than 0")]
    ZeroHorizon,
}

/// How far ahead the recommender looks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Memoized search over `horizon_weeks` weeks.
    #[default]
    Lookahead,
    /// Current week only: the single highest available probability.
    Greedy,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Lookahead => "lookahead",
            Strategy::Greedy => "greedy",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lookahead" => Ok(Strategy::Lookahead),
            "greedy" => Ok(Strategy::Greedy),
            other => Err(format!(
                "unknown strategy `{other}`, expected `lookahead` or `greedy`"
            )),
        }
    }
}

/// Validated season parameters shared by the tracker and the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonSettings {
    total_weeks: Week,
    horizon_weeks: Week,
    strategy: Strategy,
}

impl SeasonSettings {
    /// Both counts must be positive. A horizon longer than the season is
    /// accepted; the end week is clamped to `total_weeks` anyway.
    pub fn new(
        total_weeks: Week,
        horizon_weeks: Week,
        strategy: Strategy,
    ) -> Result<Self, SettingsError> {
        if total_weeks == 0 {
            return Err(SettingsError::ZeroTotalWeeks);
        }
        if horizon_weeks == 0 {
            return Err(SettingsError::ZeroHorizon);
        }
        Ok(Self {
            total_weeks,
            horizon_weeks,
            strategy,
        })
    }

    pub fn total_weeks(&self) -> Week {
        self.total_weeks
    }

    pub fn horizon_weeks(&self) -> Week {
        self.horizon_weeks
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Same settings with a different horizon.
    pub fn with_horizon(self, horizon_weeks: Week) -> Result<Self, SettingsError> {
        Self::new(self.total_weeks, horizon_weeks, self.strategy)
    }

    /// Same settings with a different strategy.
    pub fn with_strategy(self, strategy: Strategy) -> Self {
        Self { strategy, ..self }
    }

    /// Last week the search explores when starting from `current_week`:
    /// `min(total_weeks, current_week + horizon_weeks - 1)`, or the current
    /// week itself under the greedy strategy.
    pub fn end_week(&self, current_week: Week) -> Week {
        let horizon = match self.strategy {
            Strategy::Lookahead => self.horizon_weeks,
            Strategy::Greedy => 1,
        };
        self.total_weeks
            .min(current_week.saturating_add(horizon - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_counts() {
        assert_eq!(
            SeasonSettings::new(0, 4, Strategy::Lookahead),
            Err(SettingsError::ZeroTotalWeeks)
        );
        assert_eq!(
            SeasonSettings::new(18, 0, Strategy::Lookahead),
            Err(SettingsError::ZeroHorizon)
        );
    }

    #[test]
    fn end_week_is_clamped_to_season() {
        let s = SeasonSettings::new(18, 8, Strategy::Lookahead).unwrap();
        assert_eq!(s.end_week(1), 8);
        assert_eq!(s.end_week(7), 14);
        assert_eq!(s.end_week(12), 18);
        assert_eq!(s.end_week(18), 18);
    }

    #[test]
    fn horizon_longer_than_season_is_accepted() {
        let s = SeasonSettings::new(4, 10, Strategy::Lookahead).unwrap();
        assert_eq!(s.end_week(2), 4);
    }

    #[test]
    fn greedy_ends_at_current_week() {
        let s = SeasonSettings::new(18, 8, Strategy::Greedy).unwrap();
        assert_eq!(s.end_week(7), 7);
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Greedy".parse::<Strategy>(), Ok(Strategy::Greedy));
        assert_eq!(" lookahead ".parse::<Strategy>(), Ok(Strategy::Lookahead));
        assert!("beam".parse::<Strategy>().is_err());
    }

    #[test]
    fn with_horizon_revalidates() {
        let s = SeasonSettings::new(18, 8, Strategy::Lookahead).unwrap();
        assert_eq!(s.with_horizon(3).unwrap().horizon_weeks(), 3);
        assert_eq!(s.with_horizon(0), Err(SettingsError::ZeroHorizon));
    }
}
