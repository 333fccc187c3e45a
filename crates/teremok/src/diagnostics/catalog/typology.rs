use super::{check_dense_ids, CatalogError, TYPOLOGY_DOCUMENT};
use crate::diagnostics::scoring::ScoreBoard;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the weighted scorer picks a winner among categories tied on points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The tied category that received points earliest, walking questions by ascending id.
    #[default]
    FirstAwarded,
    /// The tied category declared first in the catalog.
    CatalogOrder,
}

/// Display metadata for one archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub key: String,
    pub name: String,
    pub emoji: String,
    pub short_description: String,
    #[serde(default)]
    pub advice: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypologyOption {
    pub text: String,
    pub score: ScoreBoard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypologyQuestion {
    pub id: u32,
    pub text: String,
    pub options: Vec<TypologyOption>,
}

/// Weighted multi-category questionnaire ("Teremok" archetypes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypologyCatalog {
    #[serde(default)]
    pub title: String,
    /// Category returned when no answer contributes any points.
    pub fallback: String,
    #[serde(default)]
    pub tie_break: TieBreak,
    pub categories: Vec<CategoryProfile>,
    pub questions: Vec<TypologyQuestion>,
}

impl TypologyCatalog {
    pub fn question(&self, id: u32) -> Option<&TypologyQuestion> {
        // ids are dense and 1-based once validated
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.questions.get(index).filter(|question| question.id == id)
    }

    pub fn category(&self, key: &str) -> Option<&CategoryProfile> {
        self.categories.iter().find(|category| category.key == key)
    }

    pub fn has_category(&self, key: &str) -> bool {
        self.category(key).is_some()
    }

    /// Category keys in declaration order.
    pub fn category_keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|category| category.key.as_str())
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.key.trim().is_empty() {
                return Err(CatalogError::invalid(
                    TYPOLOGY_DOCUMENT,
                    "category key must not be empty",
                ));
            }
            if !seen.insert(category.key.as_str()) {
                return Err(CatalogError::invalid(
                    TYPOLOGY_DOCUMENT,
                    format!("category '{}' declared twice", category.key),
                ));
            }
        }

        if !self.has_category(&self.fallback) {
            return Err(CatalogError::invalid(
                TYPOLOGY_DOCUMENT,
                format!("fallback '{}' is not a declared category", self.fallback),
            ));
        }

        check_dense_ids(
            TYPOLOGY_DOCUMENT,
            self.questions.iter().map(|question| question.id),
        )?;

        for question in &self.questions {
            if question.options.is_empty() {
                return Err(CatalogError::invalid(
                    TYPOLOGY_DOCUMENT,
                    format!("question {} has no options", question.id),
                ));
            }

            for (index, option) in question.options.iter().enumerate() {
                if option.score.is_empty() {
                    return Err(CatalogError::invalid(
                        TYPOLOGY_DOCUMENT,
                        format!("question {} option {index} awards no points", question.id),
                    ));
                }
                for (key, points) in option.score.iter() {
                    if points == 0 {
                        return Err(CatalogError::invalid(
                            TYPOLOGY_DOCUMENT,
                            format!(
                                "question {} option {index} awards zero points to '{key}'",
                                question.id
                            ),
                        ));
                    }
                    if !self.has_category(key) {
                        return Err(CatalogError::invalid(
                            TYPOLOGY_DOCUMENT,
                            format!(
                                "question {} option {index} scores unknown category '{key}'",
                                question.id
                            ),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}
