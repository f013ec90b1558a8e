// End-to-end checks of the recommendation engine through the public API:
// the NFL week 7/8 scenarios plus exhaustive property checks on a small
// synthetic season.

use lms_core::{
    AvailableSet, MemoCache, NoRecommendation, PickHistory, ProbabilityTable, Recommendation,
    Recommender, SeasonSettings, Strategy, SurvivalSearch, Team, TeamRegistry, Week,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn nfl_table() -> ProbabilityTable {
    ProbabilityTable::from_json_str(include_str!("fixtures/nfl_weeks_7_8.json"))
        .expect("fixture should parse")
}

/// Weeks 1-6 filled with names that match no team in the data, so the
/// current week is 7 and nothing is removed from availability.
fn history_through_week_6(extra: &[&str]) -> PickHistory {
    let mut slots = vec!["Oilers", "Redskins", "Expos", "Sonics", "Whalers", "Nordiques"];
    slots.extend_from_slice(extra);
    PickHistory::from_strs(slots)
}

fn settings(horizon: Week) -> SeasonSettings {
    SeasonSettings::new(18, horizon, Strategy::Lookahead).unwrap()
}

fn assert_pick(result: &Recommendation, week: Week, team: &str, probability: f64) {
    match result {
        Recommendation::Pick {
            week: w,
            team: t,
            probability: p,
        } => {
            assert_eq!(*w, week, "week");
            assert_eq!(t.name(), team, "team");
            assert!(
                (p - probability).abs() < 1e-9,
                "probability {p} != {probability}"
            );
        }
        other => panic!("expected a pick, got {other:?}"),
    }
}

// ===========================================================================
// NFL scenarios
// ===========================================================================

#[test]
fn week_7_horizon_1_picks_chiefs() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(1));

    let result = rec.recommend(&history_through_week_6(&[]));
    assert_pick(&result, 7, "Chiefs", 0.788);
}

#[test]
fn week_7_search_over_full_universe_picks_chiefs() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let all: AvailableSet = registry.teams().iter().cloned().collect();
    let search = SurvivalSearch::new(&table, 7);
    let mut cache = MemoCache::new();

    let best = search.best_pick(7, &all, &mut cache).unwrap();
    assert_eq!(best.team, Team::new("Chiefs"));
    assert!((best.probability - 0.788).abs() < 1e-12);
}

#[test]
fn used_chiefs_falls_back_to_patriots() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(1));

    let mut history = history_through_week_6(&[]);
    history.set(3, Some("chiefs".into()));

    let result = rec.recommend(&history);
    assert_pick(&result, 7, "Patriots", 0.661);
}

#[test]
fn week_7_lookahead_multiplies_through_week_8_and_skips_gaps() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(8));

    // Weeks 9-14 have no data and pass through; Bills (0.71) is the best
    // week-8 team and does not play in week 7.
    let result = rec.recommend(&history_through_week_6(&[]));
    assert_pick(&result, 7, "Chiefs", 0.788 * 0.71);
}

#[test]
fn week_8_recommendation_after_week_7_pick() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(4));

    let result = rec.recommend(&history_through_week_6(&["Bills"]));
    assert_pick(&result, 8, "Steelers", 0.61);
}

#[test]
fn all_weeks_filled_skips_search() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(8));

    let history = PickHistory::from_strs(["Anything"; 18]);
    let result = rec.recommend(&history);
    assert_eq!(result, Recommendation::NoPick(NoRecommendation::AllWeeksFilled));

    // Same outcome with no data at all.
    let empty = ProbabilityTable::new();
    let empty_registry = TeamRegistry::from_table(&empty);
    let rec = Recommender::new(&empty, &empty_registry, settings(8));
    assert_eq!(
        rec.recommend(&history),
        Recommendation::NoPick(NoRecommendation::AllWeeksFilled)
    );
}

#[test]
fn current_week_with_only_used_teams_has_no_usable_team() {
    let table = ProbabilityTable::from_json_str(
        r#"{
            "1": {"A": 0.6, "C": 0.5},
            "2": {"B": 0.7},
            "3": {"A": 0.8, "B": 0.6}
        }"#,
    )
    .unwrap();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(3));

    let result = rec.recommend(&PickHistory::from_strs(["A", "b"]));
    assert_eq!(result, Recommendation::NoPick(NoRecommendation::NoUsableTeam(3)));
    assert_eq!(
        result.to_string(),
        "No available team with win probability data. Check your previous picks."
    );
}

#[test]
fn fresh_cache_per_call_sees_updated_history() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let rec = Recommender::new(&table, &registry, settings(2));

    let first = rec.recommend(&history_through_week_6(&[]));
    let mut history = history_through_week_6(&[]);
    history.set(1, Some("Bills".into()));
    let second = rec.recommend(&history);

    assert_pick(&first, 7, "Chiefs", 0.788 * 0.71);
    assert_pick(&second, 7, "Chiefs", 0.788 * 0.61);
}

// ===========================================================================
// Exhaustive properties on a small season
// ===========================================================================

const TEAMS: [&str; 5] = ["A", "B", "C", "D", "E"];

fn small_table() -> ProbabilityTable {
    ProbabilityTable::from_json_str(
        r#"{
            "1": {"A": 0.8, "B": 0.7, "C": 0.55, "D": 0.3},
            "2": {"A": 0.9, "C": 0.6, "E": 0.65, "B": 0.0},
            "4": {"B": 0.75, "D": 0.72, "E": 0.5, "C": "n/a"},
            "5": {"A": 0.85, "D": 0.8, "E": 0.7}
        }"#,
    )
    .unwrap()
}

fn all_subsets() -> Vec<AvailableSet> {
    (0u32..(1 << TEAMS.len()))
        .map(|mask| {
            TEAMS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, n)| Team::new(*n))
                .collect()
        })
        .collect()
}

fn is_subset(a: &AvailableSet, b: &AvailableSet) -> bool {
    a.iter().all(|t| b.contains(t))
}

/// Reference value: try every injective assignment of teams to data weeks.
fn brute_force(table: &ProbabilityTable, week: Week, end: Week, avail: &AvailableSet) -> f64 {
    if week > end {
        return 1.0;
    }
    let Some(probabilities) = table.lookup(week) else {
        return brute_force(table, week + 1, end, avail);
    };
    probabilities
        .candidates()
        .filter(|(t, _)| avail.contains(t))
        .map(|(t, p)| p * brute_force(table, week + 1, end, &avail.without(t)))
        .fold(0.0, f64::max)
}

#[test]
fn value_is_a_probability_and_matches_brute_force() {
    let table = small_table();
    for end in 1..=5 {
        let search = SurvivalSearch::new(&table, end);
        for start in 1..=end {
            let mut cache = MemoCache::new();
            for avail in all_subsets() {
                let v = search.value(start, &avail, &mut cache);
                assert!((0.0..=1.0).contains(&v), "V({start}, {avail:?}) = {v}");
                let reference = brute_force(&table, start, end, &avail);
                assert!(
                    (v - reference).abs() < 1e-12,
                    "V({start}, {avail:?}) through {end}: {v} != {reference}"
                );
            }
        }
    }
}

#[test]
fn value_is_monotone_in_available_set() {
    let table = small_table();
    let search = SurvivalSearch::new(&table, 5);
    let subsets = all_subsets();
    for week in 1..=5 {
        let mut cache = MemoCache::new();
        for small in &subsets {
            for large in &subsets {
                if is_subset(small, large) {
                    let vs = search.value(week, small, &mut cache);
                    let vl = search.value(week, large, &mut cache);
                    assert!(vs <= vl + 1e-15, "week {week}: {small:?} -> {vs} > {large:?} -> {vl}");
                }
            }
        }
    }
}

#[test]
fn shared_and_fresh_caches_agree() {
    let table = small_table();
    let search = SurvivalSearch::new(&table, 5);
    let mut shared = MemoCache::new();
    for avail in all_subsets() {
        let with_shared = search.value(1, &avail, &mut shared);
        let with_fresh = search.value(1, &avail, &mut MemoCache::new());
        assert_eq!(with_shared, with_fresh);
    }
}

#[test]
fn best_pick_is_available_and_has_usable_data() {
    let table = small_table();
    for end in 1..=5 {
        let search = SurvivalSearch::new(&table, end);
        for week in [1, 2, 4, 5].into_iter().filter(|w| *w <= end) {
            for avail in all_subsets() {
                let mut cache = MemoCache::new();
                if let Some(best) = search.best_pick(week, &avail, &mut cache) {
                    assert!(avail.contains(&best.team));
                    let p = table.lookup(week).unwrap().get(&best.team);
                    assert!(p.is_some(), "{} has no usable week-{week} data", best.team);
                    let v = search.value(week, &avail, &mut cache);
                    assert!((best.probability - v).abs() < 1e-12);
                } else {
                    let usable = table
                        .lookup(week)
                        .unwrap()
                        .candidates()
                        .any(|(t, _)| avail.contains(t));
                    assert!(!usable, "week {week}, {avail:?} should have a pick");
                }
            }
        }
    }
}

#[test]
fn horizon_one_is_greedy() {
    let table = small_table();
    for week in [1, 2, 4, 5] {
        let search = SurvivalSearch::new(&table, week);
        for avail in all_subsets() {
            let mut cache = MemoCache::new();
            let best = search.best_pick(week, &avail, &mut cache);
            let greedy = table
                .lookup(week)
                .unwrap()
                .candidates()
                .filter(|(t, _)| avail.contains(t))
                .fold(None::<(&Team, f64)>, |acc, (t, p)| match acc {
                    Some((_, bp)) if bp >= p => acc,
                    _ => Some((t, p)),
                });
            match (best, greedy) {
                (Some(b), Some((t, p))) => {
                    assert_eq!(&b.team, t);
                    assert_eq!(b.probability, p);
                }
                (None, None) => {}
                (b, g) => panic!("mismatch at week {week}: {b:?} vs {g:?}"),
            }
        }
    }
}

#[test]
fn removal_order_does_not_change_value_or_key() {
    let table = small_table();
    let search = SurvivalSearch::new(&table, 5);
    let full: AvailableSet = TEAMS.iter().map(|n| Team::new(*n)).collect();
    let via_ab = full.without(&Team::new("A")).without(&Team::new("B"));
    let via_ba = full.without(&Team::new("B")).without(&Team::new("A"));

    let mut cache = MemoCache::new();
    let first = search.value(4, &via_ab, &mut cache);
    let states = cache.len();
    let hits = cache.hits();
    let second = search.value(4, &via_ba, &mut cache);

    assert_eq!(first, second);
    assert_eq!(cache.len(), states, "no new state for an equal set");
    assert_eq!(cache.hits(), hits + 1);
}

#[test]
fn greedy_strategy_matches_horizon_one() {
    let table = nfl_table();
    let registry = TeamRegistry::from_table(&table);
    let greedy = Recommender::new(
        &table,
        &registry,
        settings(8).with_strategy(Strategy::Greedy),
    );
    let one = Recommender::new(&table, &registry, settings(1));

    let history = history_through_week_6(&[]);
    assert_eq!(greedy.recommend(&history), one.recommend(&history));
}
