use super::ScoreBoard;
use crate::diagnostics::catalog::{TieBreak, TypologyCatalog, TypologyOption};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Question id → chosen option index.
pub type TypologyAnswers = BTreeMap<u32, i64>;

/// Typology answers exactly as posted: a JSON object keyed by question id.
///
/// Entries are only trusted once [`parse`](Self::parse) reads them, so a
/// submission with a bad key or option still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTypologyAnswers(Map<String, Value>);

impl RawTypologyAnswers {
    /// Well-formed `(question, option)` pairs and the count of entries whose
    /// key is not a question id or whose option is not an integer.
    pub fn parse(&self) -> (TypologyAnswers, usize) {
        let mut answers = TypologyAnswers::new();
        let mut malformed = 0usize;

        for (key, value) in &self.0 {
            match (key.trim().parse::<u32>(), value.as_i64()) {
                (Ok(question_id), Some(choice)) => {
                    answers.insert(question_id, choice);
                }
                _ => {
                    debug!(question = %key, %value, "skipping malformed typology answer");
                    malformed += 1;
                }
            }
        }

        (answers, malformed)
    }
}

impl From<TypologyAnswers> for RawTypologyAnswers {
    fn from(answers: TypologyAnswers) -> Self {
        answers.into_iter().collect()
    }
}

impl FromIterator<(u32, i64)> for RawTypologyAnswers {
    fn from_iter<I: IntoIterator<Item = (u32, i64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(question_id, choice)| (question_id.to_string(), Value::from(choice)))
                .collect(),
        )
    }
}

/// Winning archetype plus every category that scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypologyOutcome {
    pub primary: String,
    pub scores: ScoreBoard,
    /// Answers ignored for naming an unknown question, an out-of-range option
    /// or for being unreadable.
    pub skipped: usize,
}

/// Sums option weights across all valid answers and names the top category.
///
/// Answers are applied in ascending question id. Unknown questions and
/// out-of-range option indices are skipped. With nothing valid to apply the
/// catalog fallback wins over an empty board.
pub fn score_typology(catalog: &TypologyCatalog, answers: &TypologyAnswers) -> TypologyOutcome {
    let mut scores = ScoreBoard::new();
    let mut skipped = 0usize;

    for (&question_id, &choice) in answers {
        let Some(option) = chosen_option(catalog, question_id, choice) else {
            debug!(question_id, choice, "skipping typology answer");
            skipped += 1;
            continue;
        };

        for (category, points) in option.score.iter() {
            scores.add(category, points);
        }
    }

    let primary = pick_primary(catalog, &scores);

    TypologyOutcome {
        primary,
        scores,
        skipped,
    }
}

/// Scores posted answers; unreadable entries are added to `skipped`.
pub fn score_raw_typology(
    catalog: &TypologyCatalog,
    answers: &RawTypologyAnswers,
) -> TypologyOutcome {
    let (parsed, malformed) = answers.parse();
    let mut outcome = score_typology(catalog, &parsed);
    outcome.skipped += malformed;
    outcome
}

fn chosen_option(
    catalog: &TypologyCatalog,
    question_id: u32,
    choice: i64,
) -> Option<&TypologyOption> {
    let question = catalog.question(question_id)?;
    let index = usize::try_from(choice).ok()?;
    question.options.get(index)
}

/// Applies the catalog's tie-break policy to the highest-scoring categories.
pub fn pick_primary(catalog: &TypologyCatalog, scores: &ScoreBoard) -> String {
    let leaders = scores.leaders();

    let winner = match catalog.tie_break {
        TieBreak::FirstAwarded => leaders.first().copied(),
        TieBreak::CatalogOrder => catalog
            .category_keys()
            .find(|key| leaders.contains(key)),
    };

    match winner {
        Some(key) if catalog.has_category(key) => key.to_string(),
        _ => catalog.fallback.clone(),
    }
}
