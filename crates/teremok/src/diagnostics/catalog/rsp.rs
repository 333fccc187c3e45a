use super::{check_dense_ids, CatalogError, RSP_DOCUMENT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three motivation codes, declared in canonical tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RspCode {
    Result,
    Status,
    Process,
}

impl RspCode {
    pub const ALL: [RspCode; 3] = [RspCode::Result, RspCode::Status, RspCode::Process];

    pub fn as_str(&self) -> &'static str {
        match self {
            RspCode::Result => "result",
            RspCode::Status => "status",
            RspCode::Process => "process",
        }
    }

    /// Case-insensitive match on the wire code.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for RspCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspCategory {
    pub key: RspCode,
    pub name: String,
    pub emoji: String,
    pub short_description: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspOption {
    pub text: String,
    pub code: RspCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspQuestion {
    pub id: u32,
    pub text: String,
    pub options: Vec<RspOption>,
}

/// Single-choice questionnaire where every option names one code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspCatalog {
    #[serde(default)]
    pub title: String,
    pub categories: Vec<RspCategory>,
    pub questions: Vec<RspQuestion>,
}

impl RspCatalog {
    pub fn category(&self, code: RspCode) -> Option<&RspCategory> {
        self.categories.iter().find(|category| category.key == code)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let declared: Vec<RspCode> = self.categories.iter().map(|category| category.key).collect();
        if declared != RspCode::ALL {
            return Err(CatalogError::invalid(
                RSP_DOCUMENT,
                format!("categories must be result, status, process in order, found {declared:?}"),
            ));
        }

        check_dense_ids(RSP_DOCUMENT, self.questions.iter().map(|question| question.id))?;

        if let Some(question) = self.questions.iter().find(|question| question.options.is_empty()) {
            return Err(CatalogError::invalid(
                RSP_DOCUMENT,
                format!("question {} has no options", question.id),
            ));
        }

        Ok(())
    }
}
