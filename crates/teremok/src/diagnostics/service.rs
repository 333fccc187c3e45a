use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::catalog::Catalogs;
use super::domain::{
    DiagnosticOutcome, FormulaSubmission, Lead, LeadStatusUpdate, ResultFilter, ResultRecord,
    ResultStatistics, RspSubmission, SubmissionReceipt, TypologySubmission, UserId,
    LEAD_STATUS_NEW,
};
use super::export::{export_results_csv, ExportError};
use super::notifications::{
    describe_outcome, new_lead_message, test_result_message, OperatorMessage, OperatorNotifier,
};
use super::repository::{DiagnosticRepository, RepositoryError};
use super::scoring::{score_formula, score_raw_typology, score_rsp};

/// Entry check consulted before a user may take a diagnostic, e.g. a
/// required channel subscription.
pub trait AccessGate: Send + Sync {
    fn allows(&self, user_id: UserId) -> bool;
}

/// Gate used when subscription checks are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAccess;

impl AccessGate for OpenAccess {
    fn allows(&self, _user_id: UserId) -> bool {
        true
    }
}

/// Service composing the catalogs, scorers, repository and operator channel.
pub struct DiagnosticService<R, N> {
    catalogs: Arc<Catalogs>,
    repository: Arc<R>,
    notifier: Arc<N>,
    gate: Arc<dyn AccessGate>,
}

impl<R, N> DiagnosticService<R, N>
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    pub fn new(catalogs: Arc<Catalogs>, repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            catalogs,
            repository,
            notifier,
            gate: Arc::new(OpenAccess),
        }
    }

    pub fn with_access_gate(mut self, gate: Arc<dyn AccessGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    /// Whether the user may start a diagnostic at all.
    pub fn can_start(&self, user_id: UserId) -> bool {
        self.gate.allows(user_id)
    }

    pub fn submit_typology(
        &self,
        submission: TypologySubmission,
    ) -> Result<SubmissionReceipt, DiagnosticServiceError> {
        let user_id = self.admit(submission.user_id)?;
        let outcome = score_raw_typology(&self.catalogs.typology, &submission.answers);
        let answers = raw_answers(&submission.answers);
        self.record(user_id, DiagnosticOutcome::Typology(outcome), answers)
    }

    pub fn submit_formula(
        &self,
        submission: FormulaSubmission,
    ) -> Result<SubmissionReceipt, DiagnosticServiceError> {
        let user_id = self.admit(submission.user_id)?;
        let outcome = score_formula(&self.catalogs.formula, &submission.answers);
        let answers = raw_answers(&submission.answers);
        self.record(user_id, DiagnosticOutcome::Formula(outcome), answers)
    }

    pub fn submit_rsp(
        &self,
        submission: RspSubmission,
    ) -> Result<SubmissionReceipt, DiagnosticServiceError> {
        let user_id = self.admit(submission.user_id)?;
        let outcome = score_rsp(&submission.answers);
        let answers = raw_answers(&submission.answers);
        self.record(user_id, DiagnosticOutcome::Rsp(outcome), answers)
    }

    /// Most recent stored result for a user.
    pub fn latest_result(&self, user_id: UserId) -> Result<ResultRecord, DiagnosticServiceError> {
        let record = self
            .repository
            .latest_for_user(user_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn results(
        &self,
        filter: &ResultFilter,
    ) -> Result<Vec<ResultRecord>, DiagnosticServiceError> {
        Ok(self.repository.list_results(filter)?)
    }

    /// Store contact details and forward them to the operator.
    ///
    /// Status and notes belong to the operator: a new lead starts as
    /// [`LEAD_STATUS_NEW`] and a resubmission keeps what is stored.
    pub fn submit_lead(&self, lead: Lead) -> Result<Lead, DiagnosticServiceError> {
        let mut lead = normalize_lead(lead)?;
        match self.repository.lead_for_user(lead.user_id)? {
            Some(existing) => {
                lead.status = existing.status;
                lead.notes = existing.notes;
            }
            None => {
                lead.status = LEAD_STATUS_NEW.to_string();
                lead.notes = None;
            }
        }
        let stored = self.repository.upsert_lead(lead)?;

        let label = match self.repository.latest_for_user(stored.user_id) {
            Ok(record) => record.map(|record| describe_outcome(&record.outcome, &self.catalogs)),
            Err(err) => {
                warn!(user_id = %stored.user_id, error = %err, "unable to attach result to lead");
                None
            }
        };

        info!(user_id = %stored.user_id, source = %stored.source, "lead stored");
        self.dispatch(new_lead_message(&stored, label.as_ref()));
        Ok(stored)
    }

    pub fn leads(&self) -> Result<Vec<Lead>, DiagnosticServiceError> {
        Ok(self.repository.list_leads()?)
    }

    pub fn update_lead_status(
        &self,
        user_id: UserId,
        update: LeadStatusUpdate,
    ) -> Result<Lead, DiagnosticServiceError> {
        let status = update.status.trim().to_string();
        if status.is_empty() {
            return Err(DiagnosticServiceError::InvalidLead(
                "status must not be empty".to_string(),
            ));
        }
        let update = LeadStatusUpdate {
            status,
            notes: update.notes.map(|notes| notes.trim().to_string()),
        };

        let lead = self.repository.update_lead_status(user_id, update)?;
        info!(%user_id, status = %lead.status, "lead status updated");
        Ok(lead)
    }

    /// Counts of matching results plus the number of stored leads.
    pub fn statistics(
        &self,
        filter: &ResultFilter,
    ) -> Result<ResultStatistics, DiagnosticServiceError> {
        let records = self.repository.list_results(filter)?;
        let mut statistics = ResultStatistics::tally(&records);
        statistics.leads = self.repository.list_leads()?.len();
        Ok(statistics)
    }

    /// Writes matching results, joined with lead contacts, as CSV.
    pub fn export_results<W: Write>(
        &self,
        filter: &ResultFilter,
        writer: W,
    ) -> Result<usize, DiagnosticServiceError> {
        let records = self.repository.list_results(filter)?;
        let leads = self.repository.list_leads()?;
        export_results_csv(&records, &leads, &self.catalogs, writer)?;
        Ok(records.len())
    }

    fn admit(&self, user_id: Option<UserId>) -> Result<UserId, DiagnosticServiceError> {
        let user_id = user_id.ok_or(DiagnosticServiceError::MissingUserId)?;
        if !self.gate.allows(user_id) {
            return Err(DiagnosticServiceError::AccessDenied(user_id));
        }
        Ok(user_id)
    }

    fn record(
        &self,
        user_id: UserId,
        outcome: DiagnosticOutcome,
        answers: Value,
    ) -> Result<SubmissionReceipt, DiagnosticServiceError> {
        let record = ResultRecord {
            id: None,
            user_id,
            outcome,
            answers,
            created_at: Utc::now(),
        };

        let stored = self.repository.insert_result(record)?;
        info!(
            %user_id,
            product = %stored.product(),
            primary = stored.outcome.primary_key(),
            skipped = stored.outcome.skipped(),
            "diagnostic result stored"
        );

        let lead = match self.repository.lead_for_user(user_id) {
            Ok(lead) => lead,
            Err(err) => {
                warn!(%user_id, error = %err, "unable to load lead for notification");
                None
            }
        };
        let notified = self.dispatch(test_result_message(&stored, &self.catalogs, lead.as_ref()));

        Ok(SubmissionReceipt {
            id: stored.id,
            user_id,
            product: stored.product(),
            outcome: stored.outcome,
            notified,
        })
    }

    /// Delivery failures are logged, never surfaced to the submitter.
    fn dispatch(&self, message: OperatorMessage) -> bool {
        let user_id = message.user_id;
        match self.notifier.notify(message) {
            Ok(()) => true,
            Err(err) => {
                warn!(%user_id, error = %err, "operator notification failed");
                false
            }
        }
    }
}

fn raw_answers<T: Serialize>(answers: &T) -> Value {
    serde_json::to_value(answers).unwrap_or(Value::Null)
}

fn normalize_lead(mut lead: Lead) -> Result<Lead, DiagnosticServiceError> {
    lead.name = lead.name.trim().to_string();
    lead.contact = lead.contact.trim().to_string();

    if lead.name.is_empty() {
        return Err(DiagnosticServiceError::InvalidLead(
            "name must not be empty".to_string(),
        ));
    }
    if lead.contact.is_empty() {
        return Err(DiagnosticServiceError::InvalidLead(
            "contact must not be empty".to_string(),
        ));
    }

    for field in [
        &mut lead.role,
        &mut lead.company,
        &mut lead.team_size,
        &mut lead.request,
    ] {
        *field = trimmed(field.take());
    }
    lead.username = trimmed(lead.username.take())
        .map(|username| username.trim_start_matches('@').to_string())
        .filter(|username| !username.is_empty());

    Ok(lead)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Error raised by the diagnostic service.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticServiceError {
    #[error("user_id is required")]
    MissingUserId,
    #[error("user {0} is not allowed to take the diagnostic")]
    AccessDenied(UserId),
    #[error("invalid lead: {0}")]
    InvalidLead(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
