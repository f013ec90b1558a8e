// Command orchestration for the `lms` binary.
//
// Every command reloads what it needs (pick history, probability table) from
// the database and data files, so no state outlives a single invocation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lms_core::{
    AvailabilityTracker, PickHistory, ProbabilityTable, Recommendation, Recommender, Strategy,
    TeamRegistry, Week,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{Database, StoredWeek};
use crate::odds_client::OddsProvider;
use crate::sources::{self, FetchedWeek};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejected pick edits.
#[derive(Debug, Error, PartialEq)]
pub enum PickError {
    #[error("week {week} is outside the season (1-{total_weeks})")]
    WeekOutOfRange { week: Week, total_weeks: Week },

    #[error("team name must not be empty")]
    EmptyTeam,

    #[error("{team} was already picked in week {week}")]
    AlreadyUsed { team: String, week: Week },
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Per-request overrides of the configured season settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendOptions {
    pub horizon: Option<Week>,
    pub strategy: Option<Strategy>,
}

/// What `record_pick` stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPick {
    pub week: Week,
    pub team: String,
    /// `false` when the name matched no team in the probability data.
    pub recognized: bool,
}

/// Pick history plus derived status for display.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub pool_name: String,
    pub history: PickHistory,
    pub current_week: Option<Week>,
    pub last_recommendation: Option<serde_json::Value>,
    /// Weeks whose probabilities were fetched and stored.
    pub fetched_weeks: Vec<StoredWeek>,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pub config: Config,
    pub db: Database,
    /// Directory relative data paths are resolved against.
    base_dir: PathBuf,
}

impl App {
    pub fn new(config: Config, db: Database, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            db,
            base_dir: base_dir.into(),
        }
    }

    fn pool_id(&self) -> &str {
        &self.config.pool.id
    }

    fn total_weeks(&self) -> Week {
        self.config.pool.total_weeks
    }

    fn last_recommendation_key(&self) -> String {
        format!("last_recommendation:{}", self.pool_id())
    }

    /// Current pick history, one slot per season week.
    pub fn history(&self) -> Result<PickHistory> {
        self.db.load_history(self.pool_id(), self.total_weeks())
    }

    /// Probability data file overlaid with stored weeks.
    pub fn probability_table(&self) -> Result<ProbabilityTable> {
        sources::load_probability_table(&self.config, &self.base_dir, &self.db)
            .context("failed to load probability data")
    }

    // ------------------------------------------------------------------
    // Recommendation
    // ------------------------------------------------------------------

    /// Recommend a pick for the first unfilled week and remember the result.
    pub fn recommend(&self, options: RecommendOptions) -> Result<Recommendation> {
        let mut settings = self
            .config
            .season_settings()
            .context("invalid season settings")?;
        if let Some(horizon) = options.horizon {
            settings = settings
                .with_horizon(horizon)
                .context("invalid horizon override")?;
        }
        if let Some(strategy) = options.strategy {
            settings = settings.with_strategy(strategy);
        }

        let table = self.probability_table()?;
        let registry = TeamRegistry::from_table(&table);
        let history = self.history()?;

        let recommendation = Recommender::new(&table, &registry, settings).recommend(&history);
        info!("{}", recommendation);

        let value = serde_json::to_value(&recommendation)
            .context("failed to serialize recommendation")?;
        self.db.save_state(&self.last_recommendation_key(), &value)?;

        Ok(recommendation)
    }

    // ------------------------------------------------------------------
    // Pick edits
    // ------------------------------------------------------------------

    /// Fill `week` with `team`. Names that match a team in the probability
    /// data are stored in its canonical spelling; others are stored as typed.
    pub fn record_pick(&self, week: Week, team: &str) -> Result<RecordedPick> {
        self.check_week(week)?;
        let raw = team.trim();
        if raw.is_empty() {
            return Err(PickError::EmptyTeam.into());
        }

        let table = self.probability_table()?;
        let registry = TeamRegistry::from_table(&table);
        let resolved = registry.resolve(raw).map(|t| t.name().to_string());
        let stored = resolved.clone().unwrap_or_else(|| raw.to_string());

        let history = self.history()?;
        let key = stored.to_lowercase();
        if let Some((used_week, _)) = history
            .picks()
            .find(|(w, name)| *w != week && name.to_lowercase() == key)
        {
            return Err(PickError::AlreadyUsed {
                team: stored,
                week: used_week,
            }
            .into());
        }

        if resolved.is_none() {
            warn!("'{}' matches no team in the probability data", raw);
        }
        self.db.record_pick(self.pool_id(), week, &stored)?;
        info!("Recorded week {} pick: {}", week, stored);

        Ok(RecordedPick {
            week,
            team: stored,
            recognized: resolved.is_some(),
        })
    }

    /// Empty `week`. Returns `true` if it held a pick.
    pub fn clear_pick(&self, week: Week) -> Result<bool> {
        self.check_week(week)?;
        let removed = self.db.clear_pick(self.pool_id(), week)?;
        if removed {
            info!("Cleared week {} pick", week);
        }
        Ok(removed)
    }

    /// Delete every pick of this pool and the remembered recommendation.
    pub fn reset(&self) -> Result<usize> {
        let removed = self.db.clear_pool(self.pool_id())?;
        self.db.delete_state(&self.last_recommendation_key())?;
        info!("Reset pool {}: {} picks removed", self.pool_id(), removed);
        Ok(removed)
    }

    /// Replace this pool's picks with a legacy saved-picks JSON file.
    /// Slots past the season length are dropped.
    pub fn import_picks(&self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let history = PickHistory::from_legacy_json(&text, self.total_weeks())
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let written = self.db.import_history(self.pool_id(), &history)?;
        info!("Imported {} picks from {}", written, path.display());
        Ok(written)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn status(&self) -> Result<PoolStatus> {
        let history = self.history()?;
        let registry = TeamRegistry::default();
        let current_week =
            AvailabilityTracker::new(&registry, self.total_weeks()).current_week(&history);
        let last_recommendation = self.db.load_state(&self.last_recommendation_key())?;
        let fetched_weeks = self.db.stored_weeks()?;

        Ok(PoolStatus {
            pool_name: self.config.pool.name.clone(),
            history,
            current_week,
            last_recommendation,
            fetched_weeks,
        })
    }

    // ------------------------------------------------------------------
    // Odds
    // ------------------------------------------------------------------

    /// Fetch moneylines from `provider` and store them as `week`.
    pub async fn fetch_odds(&self, provider: &dyn OddsProvider, week: Week) -> Result<FetchedWeek> {
        self.check_week(week)?;
        let fetched = sources::fetch_week(provider, &self.db, week)
            .await
            .with_context(|| format!("failed to fetch odds for week {week}"))?;
        Ok(fetched)
    }

    fn check_week(&self, week: Week) -> Result<(), PickError> {
        let total_weeks = self.total_weeks();
        if week == 0 || week > total_weeks {
            return Err(PickError::WeekOutOfRange { week, total_weeks });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialsConfig, DataPaths, OddsConfig, PoolConfig};
    use lms_core::{NoRecommendation, Team};

    fn test_app(total_weeks: Week) -> App {
        let config = Config {
            pool: PoolConfig {
                name: "Unit".into(),
                id: "unit".into(),
                total_weeks,
                horizon_weeks: 2,
                strategy: Strategy::Lookahead,
            },
            odds: OddsConfig {
                base_url: "http://127.0.0.1:1/odds".into(),
                regions: "us".into(),
                bookmaker: "draftkings".into(),
                timeout_secs: 5,
            },
            credentials: CredentialsConfig::default(),
            db_path: ":memory:".into(),
            data_paths: DataPaths::default(),
        };
        let db = Database::open(":memory:").unwrap();
        let w1: lms_core::WeekProbabilities =
            [("Bills", 0.71), ("Jets", 0.29)].into_iter().collect();
        let w2: lms_core::WeekProbabilities =
            [("Bills", 0.9), ("Jets", 0.55)].into_iter().collect();
        db.store_week(1, &w1, chrono::Utc::now()).unwrap();
        db.store_week(2, &w2, chrono::Utc::now()).unwrap();
        App::new(config, db, std::env::temp_dir())
    }

    #[test]
    fn recommend_uses_stored_weeks_and_remembers_result() {
        let app = test_app(2);
        let rec = app.recommend(RecommendOptions::default()).unwrap();
        assert_eq!(rec.team(), Some(&Team::new("Bills")));

        let status = app.status().unwrap();
        assert_eq!(
            status.last_recommendation.unwrap()["team"],
            serde_json::json!("Bills")
        );
    }

    #[test]
    fn horizon_override_changes_pick() {
        let app = test_app(2);
        let greedy = app
            .recommend(RecommendOptions {
                horizon: Some(1),
                strategy: None,
            })
            .unwrap();
        assert_eq!(
            greedy,
            Recommendation::Pick {
                week: 1,
                team: Team::new("Bills"),
                probability: 0.71
            }
        );
    }

    #[test]
    fn zero_horizon_override_is_rejected() {
        let app = test_app(2);
        assert!(app
            .recommend(RecommendOptions {
                horizon: Some(0),
                strategy: None,
            })
            .is_err());
    }

    #[test]
    fn record_pick_canonicalizes_known_teams() {
        let app = test_app(2);
        let recorded = app.record_pick(1, "  jets ").unwrap();
        assert_eq!(recorded.team, "Jets");
        assert!(recorded.recognized);
        assert_eq!(app.history().unwrap().get(1), Some("Jets"));
    }

    #[test]
    fn record_pick_keeps_unknown_names() {
        let app = test_app(2);
        let recorded = app.record_pick(2, "Oilers").unwrap();
        assert_eq!(recorded.team, "Oilers");
        assert!(!recorded.recognized);
    }

    #[test]
    fn record_pick_rejects_reuse_in_another_week() {
        let app = test_app(2);
        app.record_pick(1, "Bills").unwrap();
        let err = app.record_pick(2, "BILLS").unwrap_err();
        assert_eq!(
            err.downcast_ref::<PickError>(),
            Some(&PickError::AlreadyUsed {
                team: "Bills".into(),
                week: 1
            })
        );
        // Re-recording the same week is an overwrite, not reuse.
        app.record_pick(1, "Bills").unwrap();
    }

    #[test]
    fn record_pick_rejects_out_of_range_week_and_blank_team() {
        let app = test_app(2);
        let err = app.record_pick(3, "Bills").unwrap_err();
        assert_eq!(
            err.downcast_ref::<PickError>(),
            Some(&PickError::WeekOutOfRange {
                week: 3,
                total_weeks: 2
            })
        );
        let err = app.record_pick(1, "   ").unwrap_err();
        assert_eq!(err.downcast_ref::<PickError>(), Some(&PickError::EmptyTeam));
    }

    #[test]
    fn reset_clears_picks_and_last_recommendation() {
        let app = test_app(2);
        app.record_pick(1, "Bills").unwrap();
        app.record_pick(2, "Jets").unwrap();
        let rec = app.recommend(RecommendOptions::default()).unwrap();
        assert_eq!(rec, Recommendation::NoPick(NoRecommendation::AllWeeksFilled));

        assert_eq!(app.reset().unwrap(), 2);
        let status = app.status().unwrap();
        assert_eq!(status.current_week, Some(1));
        assert!(status.last_recommendation.is_none());
    }
}
