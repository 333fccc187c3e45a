use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use teremok::config::DiagnosticsConfig;
use teremok::diagnostics::{
    AccessGate, DiagnosticRepository, Lead, LeadStatusUpdate, NotifyError, OpenAccess,
    OperatorMessage, OperatorNotifier, RepositoryError, ResultFilter, ResultId, ResultRecord,
    UserId,
};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Present only while the channel subscription check is enforced.
    pub(crate) subscriptions: Option<Arc<ChannelSubscriptionGate>>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDiagnosticRepository {
    results: Arc<Mutex<Vec<ResultRecord>>>,
    leads: Arc<Mutex<HashMap<UserId, Lead>>>,
}

impl DiagnosticRepository for InMemoryDiagnosticRepository {
    fn insert_result(&self, mut record: ResultRecord) -> Result<ResultRecord, RepositoryError> {
        let mut guard = self.results.lock().expect("repository mutex poisoned");
        let next_id = ResultId(guard.len() as u64 + 1);
        if record.id.is_some_and(|id| id != next_id) {
            return Err(RepositoryError::Conflict);
        }
        record.id = Some(next_id);
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
        let mut guard = self.leads.lock().expect("lead mutex poisoned");
        guard.insert(lead.user_id, lead.clone());
        Ok(lead)
    }

    fn lead_for_user(&self, user_id: UserId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.leads.lock().expect("lead mutex poisoned");
        Ok(guard.get(&user_id).cloned())
    }

    fn list_leads(&self) -> Result<Vec<Lead>, RepositoryError> {
        let guard = self.leads.lock().expect("lead mutex poisoned");
        let mut leads: Vec<Lead> = guard.values().cloned().collect();
        leads.sort_by_key(|lead| lead.user_id);
        Ok(leads)
    }

    fn update_lead_status(
        &self,
        user_id: UserId,
        update: LeadStatusUpdate,
    ) -> Result<Lead, RepositoryError> {
        let mut guard = self.leads.lock().expect("lead mutex poisoned");
        let lead = guard.get_mut(&user_id).ok_or(RepositoryError::NotFound)?;
        lead.status = update.status;
        if let Some(notes) = update.notes {
            lead.notes = Some(notes);
        }
        Ok(lead.clone())
    }
}

/// Operator channel that keeps an outbox and logs every delivery.
///
/// Without a manager chat configured every message is refused with
/// [`NotifyError::NotConfigured`].
#[derive(Default, Clone)]
pub(crate) struct ManagerChatNotifier {
    chat_id: Option<i64>,
    outbox: Arc<Mutex<Vec<OperatorMessage>>>,
}

impl ManagerChatNotifier {
    pub(crate) fn new(chat_id: Option<i64>) -> Self {
        Self {
            chat_id,
            outbox: Arc::default(),
        }
    }

    pub(crate) fn delivered(&self) -> Vec<OperatorMessage> {
        self.outbox.lock().expect("outbox mutex poisoned").clone()
    }
}

impl OperatorNotifier for ManagerChatNotifier {
    fn notify(&self, message: OperatorMessage) -> Result<(), NotifyError> {
        let chat_id = self.chat_id.ok_or(NotifyError::NotConfigured)?;
        info!(chat_id, kind = ?message.kind, user_id = %message.user_id, "operator message queued");
        self.outbox
            .lock()
            .expect("outbox mutex poisoned")
            .push(message);
        Ok(())
    }
}

/// Admits only users known to be subscribed to the required channel.
#[derive(Default)]
pub(crate) struct ChannelSubscriptionGate {
    channel: String,
    members: Mutex<HashSet<UserId>>,
}

impl ChannelSubscriptionGate {
    pub(crate) fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            members: Mutex::default(),
        }
    }

    pub(crate) fn with_members(
        channel: impl Into<String>,
        members: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            channel: channel.into(),
            members: Mutex::new(members.into_iter().collect()),
        }
    }

    pub(crate) fn channel(&self) -> &str {
        &self.channel
    }

    pub(crate) fn record_subscription(&self, user_id: UserId) {
        let inserted = self
            .members
            .lock()
            .expect("membership mutex poisoned")
            .insert(user_id);
        if inserted {
            info!(%user_id, channel = %self.channel, "channel subscription recorded");
        }
    }
}

impl AccessGate for ChannelSubscriptionGate {
    fn allows(&self, user_id: UserId) -> bool {
        let allowed = self
            .members
            .lock()
            .expect("membership mutex poisoned")
            .contains(&user_id);
        if !allowed {
            info!(%user_id, channel = %self.channel, "user not subscribed to required channel");
        }
        allowed
    }
}

/// Gate seeded from `APP_SUBSCRIBED_USERS`, or `None` when access stays open.
pub(crate) fn subscription_gate(
    config: &DiagnosticsConfig,
) -> Option<Arc<ChannelSubscriptionGate>> {
    if !config.subscription_check {
        return None;
    }

    match config.required_channel.as_deref() {
        Some(channel) => {
            let members = config.subscribers.iter().copied().map(UserId);
            let gate = ChannelSubscriptionGate::with_members(channel, members);
            info!(
                channel,
                seeded = config.subscribers.len(),
                "channel subscription check enabled"
            );
            Some(Arc::new(gate))
        }
        None => {
            warn!("subscription check enabled without APP_REQUIRED_CHANNEL; access left open");
            None
        }
    }
}

pub(crate) fn access_gate(gate: Option<&Arc<ChannelSubscriptionGate>>) -> Arc<dyn AccessGate> {
    match gate {
        Some(gate) => gate.clone(),
        None => Arc::new(OpenAccess),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use teremok::diagnostics::{
        score_rsp, DiagnosticOutcome, MessageKind, Product, TallyAnswer,
    };

    fn rsp_record(user_id: i64) -> ResultRecord {
        ResultRecord {
            id: None,
            user_id: UserId(user_id),
            outcome: DiagnosticOutcome::Rsp(score_rsp(&[TallyAnswer::from("status")])),
            answers: json!(["status"]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn repository_assigns_sequential_ids_and_lists_newest_first() {
        let repository = InMemoryDiagnosticRepository::default();
        repository.insert_result(rsp_record(1)).expect("insert");
        let second = repository.insert_result(rsp_record(2)).expect("insert");

        assert_eq!(second.id, Some(ResultId(2)));
        let listed = repository
            .list_results(&ResultFilter {
                product: Some(Product::Rsp),
                ..ResultFilter::default()
            })
            .expect("list");
        assert_eq!(listed[0].user_id, UserId(2));
        assert_eq!(
            repository
                .latest_for_user(UserId(1))
                .expect("lookup")
                .and_then(|record| record.id),
            Some(ResultId(1))
        );
    }

    #[test]
    fn repository_rejects_preassigned_ids_out_of_sequence() {
        let repository = InMemoryDiagnosticRepository::default();
        let mut record = rsp_record(1);
        record.id = Some(ResultId(9));

        assert!(matches!(
            repository.insert_result(record),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn notifier_requires_manager_chat() {
        let message = OperatorMessage {
            kind: MessageKind::NewLead,
            user_id: UserId(4),
            text: "📩".to_string(),
        };

        let offline = ManagerChatNotifier::new(None);
        assert!(matches!(
            offline.notify(message.clone()),
            Err(NotifyError::NotConfigured)
        ));

        let online = ManagerChatNotifier::new(Some(-100123));
        online.notify(message).expect("delivered");
        assert_eq!(online.delivered().len(), 1);
    }

    #[test]
    fn gate_follows_configuration() {
        let mut config = DiagnosticsConfig::default();
        assert!(subscription_gate(&config).is_none());
        assert!(access_gate(None).allows(UserId(1)));

        config.subscription_check = true;
        assert!(subscription_gate(&config).is_none());

        config.required_channel = Some("@teremok_hr".to_string());
        config.subscribers = vec![2];
        let gate = subscription_gate(&config).expect("gate enforced");
        let access = access_gate(Some(&gate));
        assert!(!access.allows(UserId(1)));
        assert!(access.allows(UserId(2)));

        gate.record_subscription(UserId(1));
        assert!(access.allows(UserId(1)));
    }

    #[test]
    fn subscription_gate_admits_recorded_members() {
        let gate = ChannelSubscriptionGate::new("@teremok_hr");
        assert!(!gate.allows(UserId(5)));

        gate.record_subscription(UserId(5));
        assert!(gate.allows(UserId(5)));
    }
}
