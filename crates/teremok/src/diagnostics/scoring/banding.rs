use crate::diagnostics::catalog::{BandLevel, FormulaCatalog};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One Likert answer; non-integers are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LikertAnswer {
    Value(i64),
    Other(Value),
}

impl LikertAnswer {
    pub fn value(&self) -> Option<i64> {
        match self {
            LikertAnswer::Value(value) => Some(*value),
            LikertAnswer::Other(_) => None,
        }
    }
}

impl From<i64> for LikertAnswer {
    fn from(value: i64) -> Self {
        LikertAnswer::Value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaOutcome {
    pub total: i64,
    pub band: BandLevel,
    pub title: String,
    pub description: String,
    pub skipped: usize,
    /// Integers outside the option scale; they still count toward `total`.
    pub out_of_range: usize,
}

/// Sums integer answers and maps the total onto the catalog's bands.
pub fn score_formula(catalog: &FormulaCatalog, answers: &[LikertAnswer]) -> FormulaOutcome {
    let scale = catalog.value_range();
    let mut total: i64 = 0;
    let mut skipped = 0usize;
    let mut out_of_range = 0usize;

    for answer in answers {
        match answer.value() {
            Some(value) => {
                if !scale.contains(&value) {
                    out_of_range += 1;
                }
                total = total.saturating_add(value);
            }
            None => {
                debug!(?answer, "skipping non-integer formula answer");
                skipped += 1;
            }
        }
    }

    let (band, title, description) = match catalog.band_for(total) {
        Some(definition) => (
            definition.level,
            definition.title.clone(),
            definition.description.clone(),
        ),
        // Only a catalog built in code without validation can lack bands.
        None => (BandLevel::from_total(total), String::new(), String::new()),
    };

    FormulaOutcome {
        total,
        band,
        title,
        description,
        skipped,
        out_of_range,
    }
}
