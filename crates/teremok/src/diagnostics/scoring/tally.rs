use crate::diagnostics::catalog::RspCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Fields that may wrap a code when the web client posts answer objects.
const WRAPPED_CODE_FIELDS: [&str; 2] = ["value", "code"];

/// One submitted answer. Anything that does not resolve to a code is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TallyAnswer {
    Code(String),
    Wrapped(Map<String, Value>),
    Other(Value),
}

impl TallyAnswer {
    pub fn code(&self) -> Option<RspCode> {
        match self {
            TallyAnswer::Code(raw) => RspCode::parse(raw),
            TallyAnswer::Wrapped(fields) => WRAPPED_CODE_FIELDS
                .iter()
                .find_map(|field| fields.get(*field))
                .and_then(Value::as_str)
                .and_then(RspCode::parse),
            TallyAnswer::Other(_) => None,
        }
    }
}

impl From<&str> for TallyAnswer {
    fn from(value: &str) -> Self {
        TallyAnswer::Code(value.to_string())
    }
}

impl From<RspCode> for TallyAnswer {
    fn from(value: RspCode) -> Self {
        TallyAnswer::Code(value.as_str().to_string())
    }
}

/// Tally over the three codes; every code is always present.
pub type RspScores = BTreeMap<RspCode, u32>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspOutcome {
    pub primary: RspCode,
    pub secondary: Vec<RspCode>,
    pub scores: RspScores,
    /// More than one code shares the top tally.
    pub mixed: bool,
    pub skipped: usize,
}

pub fn score_rsp(answers: &[TallyAnswer]) -> RspOutcome {
    let mut scores: RspScores = RspCode::ALL.into_iter().map(|code| (code, 0)).collect();
    let mut skipped = 0usize;

    for answer in answers {
        match answer.code() {
            Some(code) => *scores.entry(code).or_insert(0) += 1,
            None => {
                debug!(?answer, "skipping unrecognised rsp answer");
                skipped += 1;
            }
        }
    }

    let ranking = rank_leaders(&scores);

    RspOutcome {
        primary: ranking.primary,
        secondary: ranking.secondary,
        mixed: ranking.mixed,
        scores,
        skipped,
    }
}

/// Primary and secondary codes derived from a tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderRanking {
    pub primary: RspCode,
    pub secondary: Vec<RspCode>,
    pub mixed: bool,
}

/// Leaders are the codes at the top tally, in canonical order; the first is
/// primary and the rest become secondary. A sole leader instead gets the best
/// runner-up as secondary, but only when that runner-up scored at all.
pub fn rank_leaders(scores: &RspScores) -> LeaderRanking {
    let tally = |code: RspCode| scores.get(&code).copied().unwrap_or(0);
    let max = RspCode::ALL.into_iter().map(tally).max().unwrap_or(0);

    let mut leaders = RspCode::ALL.into_iter().filter(|code| tally(*code) == max);
    let primary = leaders.next().unwrap_or(RspCode::Result);
    let tied: Vec<RspCode> = leaders.collect();

    if !tied.is_empty() {
        return LeaderRanking {
            primary,
            secondary: tied,
            mixed: true,
        };
    }

    let runner_up = RspCode::ALL
        .into_iter()
        .filter(|code| *code != primary)
        .fold(None, |best: Option<RspCode>, code| match best {
            Some(best) if tally(best) >= tally(code) => Some(best),
            _ => Some(code),
        });

    let secondary = runner_up
        .filter(|code| tally(*code) > 0)
        .into_iter()
        .collect();

    LeaderRanking {
        primary,
        secondary,
        mixed: false,
    }
}
