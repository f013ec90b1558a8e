// Moneyline odds to win probabilities.
//
// Converts The Odds API `h2h` events into a week of normalized probabilities.
// Pure conversion only; fetching lives in the application crate.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::probability::WeekProbabilities;
use crate::team::Team;

// ---------------------------------------------------------------------------
// Provider payload
// ---------------------------------------------------------------------------

/// One game as returned by the odds provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsEvent {
    #[serde(default, alias = "event_id")]
    pub id: Option<String>,
    #[serde(default, alias = "commenceTime")]
    pub commence_time: Option<String>,
    #[serde(default, alias = "homeTeam")]
    pub home_team: Option<String>,
    #[serde(default, alias = "awayTeam")]
    pub away_team: Option<String>,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmaker {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default, alias = "team")]
    pub name: Option<String>,
    /// American moneyline price.
    #[serde(default, alias = "odds")]
    pub price: Option<f64>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Implied probability of an American moneyline price.
///
/// `+150` -> 100 / 250 = 0.4, `-200` -> 200 / 300 = 0.667. A price of zero
/// or a non-finite value has no meaning and returns `None`.
pub fn american_to_probability(price: f64) -> Option<f64> {
    if !price.is_finite() {
        return None;
    }
    if price > 0.0 {
        Some(100.0 / (price + 100.0))
    } else if price < 0.0 {
        Some(-price / (-price + 100.0))
    } else {
        None
    }
}

/// Normalized win probabilities for one event, in outcome order.
///
/// Uses the first bookmaker and its `h2h` market (or its first market when
/// there is no `h2h`). Raw implied probabilities include the bookmaker's
/// margin, so they are scaled to sum to 1.
pub fn event_probabilities(event: &OddsEvent) -> Vec<(String, f64)> {
    let Some(bookmaker) = event.bookmakers.first() else {
        return Vec::new();
    };
    let Some(market) = bookmaker
        .markets
        .iter()
        .find(|m| m.key == "h2h")
        .or_else(|| bookmaker.markets.first())
    else {
        return Vec::new();
    };

    let mut probabilities: Vec<(String, f64)> = Vec::new();
    for outcome in &market.outcomes {
        let Some(name) = outcome.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        let Some(p) = outcome.price.and_then(american_to_probability) else {
            continue;
        };
        match probabilities.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = p,
            None => probabilities.push((name.to_string(), p)),
        }
    }

    let total: f64 = probabilities.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        for (_, p) in probabilities.iter_mut() {
            *p /= total;
        }
    }
    probabilities
}

/// Assemble one week of probabilities from a slate of events. A team listed
/// in two events keeps its first value.
pub fn week_from_events(events: &[OddsEvent]) -> WeekProbabilities {
    let mut week = WeekProbabilities::new();
    for event in events {
        let probabilities = event_probabilities(event);
        if probabilities.is_empty() {
            warn!(
                "no usable moneyline for event {} ({} vs {})",
                event.id.as_deref().unwrap_or("?"),
                event.home_team.as_deref().unwrap_or("?"),
                event.away_team.as_deref().unwrap_or("?")
            );
            continue;
        }
        for (name, p) in probabilities {
            week.push(Team::new(name), Some(p));
        }
    }
    week
}
