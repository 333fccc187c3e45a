use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::scoring::{
    FormulaOutcome, LikertAnswer, RawTypologyAnswers, RspOutcome, TallyAnswer, TypologyOutcome,
};

/// Messenger user identifier supplied by the bot or the web app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by storage once a result is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultId(pub u64);

/// The diagnostics a user can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Typology,
    Formula,
    Rsp,
}

impl Product {
    pub const ALL: [Product; 3] = [Product::Typology, Product::Formula, Product::Rsp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Typology => "typology",
            Product::Formula => "formula",
            Product::Rsp => "rsp",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Product::Typology => "Теремок",
            Product::Formula => "Формула команды",
            Product::Rsp => "Формула РСП",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "typology" | "teremok" => Ok(Product::Typology),
            "formula" => Ok(Product::Formula),
            "rsp" | "formula_rsp" => Ok(Product::Rsp),
            other => Err(format!("unknown diagnostic '{other}'")),
        }
    }
}

/// Outcome of any of the three scorers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "product", rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    Typology(TypologyOutcome),
    Formula(FormulaOutcome),
    Rsp(RspOutcome),
}

impl DiagnosticOutcome {
    pub fn product(&self) -> Product {
        match self {
            DiagnosticOutcome::Typology(_) => Product::Typology,
            DiagnosticOutcome::Formula(_) => Product::Formula,
            DiagnosticOutcome::Rsp(_) => Product::Rsp,
        }
    }

    /// Category key (or band level) naming the result.
    pub fn primary_key(&self) -> &str {
        match self {
            DiagnosticOutcome::Typology(outcome) => &outcome.primary,
            DiagnosticOutcome::Formula(outcome) => outcome.band.as_str(),
            DiagnosticOutcome::Rsp(outcome) => outcome.primary.as_str(),
        }
    }

    pub fn skipped(&self) -> usize {
        match self {
            DiagnosticOutcome::Typology(outcome) => outcome.skipped,
            DiagnosticOutcome::Formula(outcome) => outcome.skipped,
            DiagnosticOutcome::Rsp(outcome) => outcome.skipped,
        }
    }

    /// `key:value` pairs joined by `;`, used in exports.
    pub fn score_summary(&self) -> String {
        match self {
            DiagnosticOutcome::Typology(outcome) => outcome
                .scores
                .iter()
                .map(|(key, points)| format!("{key}:{points}"))
                .collect::<Vec<_>>()
                .join(";"),
            DiagnosticOutcome::Formula(outcome) => format!("total:{}", outcome.total),
            DiagnosticOutcome::Rsp(outcome) => outcome
                .scores
                .iter()
                .map(|(code, count)| format!("{code}:{count}"))
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

/// Persisted diagnostic result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Option<ResultId>,
    pub user_id: UserId,
    pub outcome: DiagnosticOutcome,
    /// Raw answers exactly as submitted.
    pub answers: Value,
    pub created_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn product(&self) -> Product {
        self.outcome.product()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypologySubmission {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub answers: RawTypologyAnswers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSubmission {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub answers: Vec<LikertAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RspSubmission {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub answers: Vec<TallyAnswer>,
}

/// Response handed back to whoever submitted answers.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub id: Option<ResultId>,
    pub user_id: UserId,
    pub product: Product,
    pub outcome: DiagnosticOutcome,
    /// Whether the operator notification went out.
    pub notified: bool,
}

/// Contact details a user leaves for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub team_size: Option<String>,
    /// Phone, e-mail or messenger handle.
    pub contact: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub request: Option<String>,
    /// Where the lead came from ("bot", "web").
    #[serde(default = "default_lead_source")]
    pub source: String,
    /// Operator workflow state; resubmitting contacts never resets it.
    #[serde(default = "default_lead_status")]
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_lead_source() -> String {
    "web".to_string()
}

fn default_lead_status() -> String {
    LEAD_STATUS_NEW.to_string()
}

/// Status every lead starts with.
pub const LEAD_STATUS_NEW: &str = "new";

/// Operator change to a lead's workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStatusUpdate {
    #[serde(default = "default_lead_status")]
    pub status: String,
    /// `None` keeps the notes already on the lead.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query options for listing stored results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub product: Option<Product>,
    /// Matches [`DiagnosticOutcome::primary_key`].
    pub primary: Option<String>,
    /// Earliest `created_at` to include.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ResultFilter {
    pub fn matches(&self, record: &ResultRecord) -> bool {
        if self.since.is_some_and(|since| record.created_at < since) {
            return false;
        }
        if let Some(product) = self.product {
            if record.product() != product {
                return false;
            }
        }
        if let Some(primary) = &self.primary {
            if record.outcome.primary_key() != primary {
                return false;
            }
        }
        true
    }
}

/// Result counts for the operator dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultStatistics {
    pub total: usize,
    pub by_product: BTreeMap<Product, usize>,
    /// Counts per primary key, grouped by product.
    pub by_primary: BTreeMap<Product, BTreeMap<String, usize>>,
    /// Results per UTC calendar day.
    pub daily: BTreeMap<NaiveDate, usize>,
    /// Every stored lead, regardless of the result filter.
    pub leads: usize,
}

impl ResultStatistics {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            let product = record.product();
            stats.total += 1;
            *stats.by_product.entry(product).or_default() += 1;
            *stats
                .by_primary
                .entry(product)
                .or_default()
                .entry(record.outcome.primary_key().to_string())
                .or_default() += 1;
            *stats
                .daily
                .entry(record.created_at.date_naive())
                .or_default() += 1;
        }
        stats
    }
}
