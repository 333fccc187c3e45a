//! Diagnostic quizzes: catalogs, scoring, persistence contracts and HTTP routes.
//!
//! The scorers in [`scoring`] are pure and never fail. Everything with side
//! effects (storage, operator notifications, subscription checks) sits behind
//! the traits re-exported here so adapters can be swapped per deployment.

pub mod catalog;
pub mod domain;
pub mod export;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use catalog::{BandLevel, CatalogError, Catalogs, RspCode, TieBreak};
pub use domain::{
    DiagnosticOutcome, FormulaSubmission, Lead, LeadStatusUpdate, Product, ResultFilter, ResultId,
    ResultRecord, ResultStatistics, RspSubmission, SubmissionReceipt, TypologySubmission, UserId,
    LEAD_STATUS_NEW,
};
pub use notifications::{MessageKind, NotifyError, OperatorMessage, OperatorNotifier};
pub use repository::{DiagnosticRepository, RepositoryError};
pub use router::diagnostics_router;
pub use scoring::{
    rank_leaders, score_formula, score_raw_typology, score_rsp, score_typology, FormulaOutcome,
    LikertAnswer, RawTypologyAnswers, RspOutcome, ScoreBoard, TallyAnswer, TypologyAnswers,
    TypologyOutcome,
};
pub use service::{AccessGate, DiagnosticService, DiagnosticServiceError, OpenAccess};
