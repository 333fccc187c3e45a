//! Scoring engine and HTTP surface for the Teremok diagnostic quizzes.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod telemetry;
