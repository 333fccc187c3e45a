use super::{check_dense_ids, CatalogError, FORMULA_DOCUMENT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Ordered reliability levels, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl BandLevel {
    pub const ALL: [BandLevel; 4] = [
        BandLevel::Green,
        BandLevel::Yellow,
        BandLevel::Orange,
        BandLevel::Red,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BandLevel::Green => "green",
            BandLevel::Yellow => "yellow",
            BandLevel::Orange => "orange",
            BandLevel::Red => "red",
        }
    }

    /// Standard cutoffs for the ten-question, four-point questionnaire.
    pub fn from_total(total: i64) -> Self {
        if total >= 34 {
            BandLevel::Green
        } else if total >= 27 {
            BandLevel::Yellow
        } else if total >= 19 {
            BandLevel::Orange
        } else {
            BandLevel::Red
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            BandLevel::Green => "🟢",
            BandLevel::Yellow => "🟡",
            BandLevel::Orange => "🟠",
            BandLevel::Red => "🔴",
        }
    }
}

impl fmt::Display for BandLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandDefinition {
    pub level: BandLevel,
    /// Inclusive lower bound on the summed answers.
    pub min_total: i64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaOption {
    pub value: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaQuestion {
    pub id: u32,
    pub text: String,
}

/// Likert questionnaire ("Formula") sharing one option scale across questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaCatalog {
    #[serde(default)]
    pub title: String,
    pub options: Vec<FormulaOption>,
    /// Evaluated top-down; the first band whose bound is met wins.
    pub bands: Vec<BandDefinition>,
    pub questions: Vec<FormulaQuestion>,
}

impl FormulaCatalog {
    pub fn band_for(&self, total: i64) -> Option<&BandDefinition> {
        self.bands
            .iter()
            .find(|band| total >= band.min_total)
            .or_else(|| self.bands.last())
    }

    /// Values a well-formed answer may take.
    pub fn value_range(&self) -> RangeInclusive<i64> {
        let min = self.options.iter().map(|option| option.value).min();
        let max = self.options.iter().map(|option| option.value).max();
        match (min, max) {
            (Some(min), Some(max)) => min..=max,
            _ => 1..=4,
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        check_dense_ids(
            FORMULA_DOCUMENT,
            self.questions.iter().map(|question| question.id),
        )?;

        let values: Vec<i64> = self.options.iter().map(|option| option.value).collect();
        if values != [1, 2, 3, 4] {
            return Err(CatalogError::invalid(
                FORMULA_DOCUMENT,
                format!("options must carry values 1..4 in order, found {values:?}"),
            ));
        }

        if self.bands.is_empty() {
            return Err(CatalogError::invalid(FORMULA_DOCUMENT, "no bands declared"));
        }

        for pair in self.bands.windows(2) {
            if pair[0].min_total <= pair[1].min_total {
                return Err(CatalogError::invalid(
                    FORMULA_DOCUMENT,
                    format!(
                        "band {} (>= {}) must have a higher bound than band {} (>= {})",
                        pair[0].level, pair[0].min_total, pair[1].level, pair[1].min_total
                    ),
                ));
            }
        }

        for level in BandLevel::ALL {
            let declared = self.bands.iter().filter(|band| band.level == level).count();
            if declared != 1 {
                return Err(CatalogError::invalid(
                    FORMULA_DOCUMENT,
                    format!("band {level} declared {declared} times"),
                ));
            }
        }

        Ok(())
    }
}
