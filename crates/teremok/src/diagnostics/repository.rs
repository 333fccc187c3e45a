use super::domain::{Lead, LeadStatusUpdate, ResultFilter, ResultRecord, UserId};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait DiagnosticRepository: Send + Sync {
    /// Persists a result and returns it with its storage id filled in.
    fn insert_result(&self, record: ResultRecord) -> Result<ResultRecord, RepositoryError>;
    fn latest_for_user(&self, user_id: UserId) -> Result<Option<ResultRecord>, RepositoryError>;
    /// Newest first.
    fn list_results(&self, filter: &ResultFilter) -> Result<Vec<ResultRecord>, RepositoryError>;
    fn upsert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    fn lead_for_user(&self, user_id: UserId) -> Result<Option<Lead>, RepositoryError>;
    fn list_leads(&self) -> Result<Vec<Lead>, RepositoryError>;
    /// Fails with [`RepositoryError::NotFound`] when the user left no lead.
    fn update_lead_status(
        &self,
        user_id: UserId,
        update: LeadStatusUpdate,
    ) -> Result<Lead, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
