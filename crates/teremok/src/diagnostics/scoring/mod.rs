//! Pure scorers: catalog and answers in, typed outcome out.
//!
//! None of these functions touch storage or fail; malformed answers are
//! counted in `skipped` and otherwise ignored.

mod banding;
mod board;
mod tally;
mod weighted;

pub use banding::{score_formula, FormulaOutcome, LikertAnswer};
pub use board::ScoreBoard;
pub use tally::{rank_leaders, score_rsp, LeaderRanking, RspOutcome, RspScores, TallyAnswer};
pub use weighted::{
    pick_primary, score_raw_typology, score_typology, RawTypologyAnswers, TypologyAnswers,
    TypologyOutcome,
};
