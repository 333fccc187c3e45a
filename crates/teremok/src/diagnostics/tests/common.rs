use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::diagnostics::catalog::Catalogs;
use crate::diagnostics::domain::{
    Lead, LeadStatusUpdate, ResultFilter, ResultId, ResultRecord, UserId, LEAD_STATUS_NEW,
};
use crate::diagnostics::notifications::{NotifyError, OperatorMessage, OperatorNotifier};
use crate::diagnostics::repository::{DiagnosticRepository, RepositoryError};
use crate::diagnostics::scoring::{LikertAnswer, TallyAnswer, TypologyAnswers};
use crate::diagnostics::service::{AccessGate, DiagnosticService};
use crate::diagnostics::diagnostics_router;

pub(super) fn catalogs() -> Arc<Catalogs> {
    Arc::new(Catalogs::embedded().expect("embedded catalogs are valid"))
}

/// Question id → option index pairs.
pub(super) fn typology_answers(pairs: &[(u32, i64)]) -> TypologyAnswers {
    pairs.iter().copied().collect::<BTreeMap<_, _>>()
}

pub(super) fn likert(values: &[i64]) -> Vec<LikertAnswer> {
    values.iter().copied().map(LikertAnswer::from).collect()
}

pub(super) fn codes(values: &[&str]) -> Vec<TallyAnswer> {
    values.iter().copied().map(TallyAnswer::from).collect()
}

pub(super) fn lead(user_id: i64) -> Lead {
    Lead {
        user_id: UserId(user_id),
        name: "Ирина".to_string(),
        role: Some("HR-директор".to_string()),
        company: Some("ООО Северный ветер".to_string()),
        team_size: Some("10-15".to_string()),
        contact: "+7 900 000-00-00".to_string(),
        username: Some("irina_hr".to_string()),
        request: Some("Хотим разобраться с текучкой в отделе продаж".to_string()),
        source: "bot".to_string(),
        status: LEAD_STATUS_NEW.to_string(),
        notes: None,
    }
}

pub(super) fn build_service() -> (
    DiagnosticService<MemoryRepository, MemoryNotifier>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = DiagnosticService::new(catalogs(), repository.clone(), notifier.clone());
    (service, repository, notifier)
}

pub(super) fn router_with_service(
    service: DiagnosticService<MemoryRepository, MemoryNotifier>,
) -> axum::Router {
    diagnostics_router(Arc::new(service))
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    results: Mutex<Vec<ResultRecord>>,
    leads: Mutex<HashMap<UserId, Lead>>,
}

impl MemoryRepository {
    pub(super) fn stored_results(&self) -> Vec<ResultRecord> {
        self.results.lock().expect("repository mutex poisoned").clone()
    }
}

impl DiagnosticRepository for MemoryRepository {
    fn insert_result(&self, mut record: ResultRecord) -> Result<ResultRecord, RepositoryError> {
        let mut guard = self.results.lock().expect("repository mutex poisoned");
        record.id = Some(ResultId(guard.len() as u64 + 1));
        guard.push(record.clone());
        Ok(record)
    }

    fn latest_for_user(&self, user_id: UserId) -> Result<Option<ResultRecord>, RepositoryError> {
        let guard = self.results.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .find(|record| record.user_id == user_id)
            .cloned())
    }

    fn list_results(&self, filter: &ResultFilter) -> Result<Vec<ResultRecord>, RepositoryError> {
        let guard = self.results.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|record| filter.matches(record))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn upsert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        guard.insert(lead.user_id, lead.clone());
        Ok(lead)
    }

    fn lead_for_user(&self, user_id: UserId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.leads.lock().expect("repository mutex poisoned");
        Ok(guard.get(&user_id).cloned())
    }

    fn list_leads(&self) -> Result<Vec<Lead>, RepositoryError> {
        let guard = self.leads.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn update_lead_status(
        &self,
        user_id: UserId,
        update: LeadStatusUpdate,
    ) -> Result<Lead, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        let lead = guard.get_mut(&user_id).ok_or(RepositoryError::NotFound)?;
        lead.status = update.status;
        if let Some(notes) = update.notes {
            lead.notes = Some(notes);
        }
        Ok(lead.clone())
    }
}

pub(super) struct UnavailableRepository;

impl DiagnosticRepository for UnavailableRepository {
    fn insert_result(&self, _record: ResultRecord) -> Result<ResultRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_for_user(&self, _user_id: UserId) -> Result<Option<ResultRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_results(&self, _filter: &ResultFilter) -> Result<Vec<ResultRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_lead(&self, _lead: Lead) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn lead_for_user(&self, _user_id: UserId) -> Result<Option<Lead>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_leads(&self) -> Result<Vec<Lead>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_lead_status(
        &self,
        _user_id: UserId,
        _update: LeadStatusUpdate,
    ) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    messages: Mutex<Vec<OperatorMessage>>,
}

impl MemoryNotifier {
    pub(super) fn messages(&self) -> Vec<OperatorMessage> {
        self.messages.lock().expect("notifier mutex poisoned").clone()
    }
}

impl OperatorNotifier for MemoryNotifier {
    fn notify(&self, message: OperatorMessage) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .push(message);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl OperatorNotifier for OfflineNotifier {
    fn notify(&self, _message: OperatorMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("chat api timed out".to_string()))
    }
}

/// Admits only the listed users.
pub(super) struct SubscriberList(pub(super) HashSet<UserId>);

impl AccessGate for SubscriberList {
    fn allows(&self, user_id: UserId) -> bool {
        self.0.contains(&user_id)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
