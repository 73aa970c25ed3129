//! Feature selection: the elimination search and the choice of its best round.

pub mod rfe;
pub mod score;

pub use rfe::{run_rfe, RfeConfig, RoundRecord, TAXA_KEY_SEPARATOR};
pub use score::{min_max_normalize, score_and_select, ScoreWeights, SelectionResults};
