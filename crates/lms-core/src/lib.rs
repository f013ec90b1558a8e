// Library root for the survivor-pool recommendation engine.
//
// Leaf-first: team registry and probability table, availability derived from
// the pick history, the memoized survival search, and the recommender that
// ties them together. Moneyline conversion lives in `odds`.

pub mod availability;
pub mod odds;
pub mod probability;
pub mod recommend;
pub mod search;
pub mod settings;
pub mod team;

pub use availability::{AvailabilityTracker, AvailableSet, PickHistory};
pub use probability::{ProbabilityTable, Week, WeekProbabilities};
pub use recommend::{NoRecommendation, Recommendation, Recommender};
pub use search::{Candidate, MemoCache, SurvivalSearch};
pub use settings::{SeasonSettings, Strategy};
pub use team::{Team, TeamRegistry};
