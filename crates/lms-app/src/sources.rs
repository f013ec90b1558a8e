// Probability data loading: a season file (JSON or CSV) overlaid with weeks
// fetched from the odds provider and stored in the database.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use lms_core::odds::{week_from_events, OddsEvent};
use lms_core::probability::TableError;
use lms_core::{ProbabilityTable, Team, Week, WeekProbabilities};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::odds_client::{OddsClientError, OddsProvider};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("invalid probability JSON in {path}: {source}")]
    Json { path: String, source: TableError },

    #[error("unsupported probability file {path}: expected .json or .csv")]
    UnsupportedFormat { path: String },

    #[error(transparent)]
    Odds(#[from] OddsClientError),

    #[error("odds for week {week} produced no usable probabilities")]
    EmptyWeek { week: Week },

    #[error("database error: {0:#}")]
    Database(anyhow::Error),
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// `week,team,probability` row. `probability` is kept as text so a blank or
/// non-numeric value becomes an unusable entry instead of a bad row.
#[derive(Debug, Deserialize)]
struct RawProbabilityRow {
    week: String,
    team: String,
    #[serde(default)]
    probability: String,
}

fn load_csv_from_reader<R: Read>(rdr: R) -> Result<ProbabilityTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let mut weeks: BTreeMap<Week, WeekProbabilities> = BTreeMap::new();
    for result in reader.deserialize::<RawProbabilityRow>() {
        match result {
            Ok(raw) => {
                let week = match raw.week.parse::<Week>() {
                    Ok(w) if w >= 1 => w,
                    _ => {
                        warn!("skipping probability row with invalid week '{}'", raw.week);
                        continue;
                    }
                };
                if raw.team.is_empty() {
                    warn!("skipping week {} probability row with no team", week);
                    continue;
                }
                let probability = raw.probability.parse::<f64>().ok();
                weeks
                    .entry(week)
                    .or_default()
                    .push(Team::new(raw.team), probability);
            }
            Err(e) => {
                warn!("skipping malformed probability row: {}", e);
            }
        }
    }

    let mut table = ProbabilityTable::new();
    for (week, probabilities) in weeks {
        table.insert_week(week, probabilities);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load a probability table from a `.json` or `.csv` file.
pub fn load_table_file(path: &Path) -> Result<ProbabilityTable, SourceError> {
    let display = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => {
            let text = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
                path: display.clone(),
                source: e,
            })?;
            ProbabilityTable::from_json_str(&text).map_err(|e| SourceError::Json {
                path: display,
                source: e,
            })
        }
        Some("csv") => {
            let file = std::fs::File::open(path).map_err(|e| SourceError::Io {
                path: display.clone(),
                source: e,
            })?;
            load_csv_from_reader(file).map_err(|e| SourceError::Csv {
                path: display,
                source: e,
            })
        }
        _ => Err(SourceError::UnsupportedFormat { path: display }),
    }
}

/// Weeks in `stored` replace the same weeks in `base`.
pub fn overlay(mut base: ProbabilityTable, stored: ProbabilityTable) -> ProbabilityTable {
    for (week, probabilities) in stored.weeks() {
        base.insert_week(week, probabilities.clone());
    }
    base
}

/// Assemble the table used for recommendations: the configured data file
/// (resolved against `base_dir`, optional and possibly absent) overlaid with
/// every week stored in `db`.
pub fn load_probability_table(
    config: &Config,
    base_dir: &Path,
    db: &Database,
) -> Result<ProbabilityTable, SourceError> {
    let base = match config.data_paths.probabilities.as_deref() {
        Some(rel) => {
            let path = base_dir.join(rel);
            if path.exists() {
                load_table_file(&path)?
            } else {
                warn!("probability file {} not found, using stored weeks only", path.display());
                ProbabilityTable::new()
            }
        }
        None => ProbabilityTable::new(),
    };

    let stored = db.load_weeks().map_err(SourceError::Database)?;
    let table = overlay(base, stored);
    info!("Loaded probability data for {} weeks", table.week_count());
    Ok(table)
}

// ---------------------------------------------------------------------------
// Odds fetch
// ---------------------------------------------------------------------------

/// Result of one `fetch_week` call.
#[derive(Debug, Clone)]
pub struct FetchedWeek {
    pub week: Week,
    pub requested_at: DateTime<Utc>,
    pub bookmaker: String,
    pub events: Vec<OddsEvent>,
    pub probabilities: WeekProbabilities,
}

/// Fetch the current slate from `provider`, convert it to one week of
/// probabilities, and store it as `week`, replacing earlier data for that
/// week. Nothing is stored when the slate yields no usable probabilities.
pub async fn fetch_week(
    provider: &dyn OddsProvider,
    db: &Database,
    week: Week,
) -> Result<FetchedWeek, SourceError> {
    let requested_at = Utc::now();
    let events = provider.fetch_events().await?;
    let probabilities = week_from_events(&events);

    if probabilities.is_empty() {
        return Err(SourceError::EmptyWeek { week });
    }

    db.store_week(week, &probabilities, requested_at)
        .map_err(SourceError::Database)?;
    info!(
        "Stored week {} probabilities for {} teams from {} events",
        week,
        probabilities.len(),
        events.len()
    );

    Ok(FetchedWeek {
        week,
        requested_at,
        bookmaker: provider.bookmaker().to_string(),
        events,
        probabilities,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_groups_rows_by_week_in_file_order() {
        let data = "\
week,team,probability
7,Chiefs,0.788
8,Bills,0.71
7,Patriots,0.661
";
        let table = load_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.week_count(), 2);

        let week7: Vec<&str> = table
            .lookup(7)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.team.name())
            .collect();
        assert_eq!(week7, vec!["Chiefs", "Patriots"]);
        assert_eq!(table.lookup(8).unwrap().get(&Team::new("Bills")), Some(0.71));
    }

    #[test]
    fn csv_non_numeric_probability_is_unusable_entry() {
        let data = "\
week,team,probability
3,Jets,n/a
3,Giants,
3,Rams,0.55
";
        let table = load_csv_from_reader(data.as_bytes()).unwrap();
        let week = table.lookup(3).unwrap();
        assert_eq!(week.len(), 3);
        assert_eq!(week.get(&Team::new("Jets")), None);
        assert_eq!(week.candidates().count(), 1);
    }

    #[test]
    fn csv_skips_bad_weeks_and_blank_teams() {
        let data = "\
week,team,probability
0,Jets,0.5
x,Jets,0.5
4, ,0.5
4,Bears,0.6
";
        let table = load_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.week_count(), 1);
        assert_eq!(table.lookup(4).unwrap().len(), 1);
    }

    #[test]
    fn csv_trims_whitespace() {
        let data = "week, team, probability\n 2 , Lions , 0.8 \n";
        let table = load_csv_from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.lookup(2).unwrap().get(&Team::new("Lions")), Some(0.8));
    }

    #[test]
    fn overlay_replaces_whole_weeks() {
        let base = ProbabilityTable::from_json_str(
            r#"{"7": {"Chiefs": 0.788, "Patriots": 0.661}, "8": {"Bills": 0.71}}"#,
        )
        .unwrap();
        let stored = ProbabilityTable::from_json_str(r#"{"7": {"Rams": 0.6}}"#).unwrap();

        let merged = overlay(base, stored);
        let week7 = merged.lookup(7).unwrap();
        assert_eq!(week7.len(), 1);
        assert_eq!(week7.get(&Team::new("Chiefs")), None);
        assert_eq!(merged.lookup(8).unwrap().get(&Team::new("Bills")), Some(0.71));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_table_file(Path::new("probabilities.xlsx")).unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_table_file(Path::new("/nonexistent/lms/probabilities.csv")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
