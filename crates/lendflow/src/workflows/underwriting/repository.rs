use serde::{Deserialize, Serialize};

use super::domain::{
    DocumentPackage, LoanApplication, LoanId, UploadedFile, ValuationFields,
};

/// Storage abstraction so the service module can be exercised in isolation.
/// `update` is an atomic upsert of the whole aggregate.
pub trait LoanRepository: Send + Sync {
    fn insert(&self, loan: LoanApplication) -> Result<LoanApplication, RepositoryError>;
    fn update(&self, loan: LoanApplication) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &LoanId) -> Result<Option<LoanApplication>, RepositoryError>;
    /// All applications whose borrower email matches, normalized by the
    /// implementation to lowercase-trimmed comparison.
    fn list_by_email(&self, email: &str) -> Result<Vec<LoanApplication>, RepositoryError>;
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

/// Durable, all-or-nothing persistence of borrower-submitted files. A failure
/// must leave nothing behind so the caller can retry the whole submission.
pub trait DocumentStore: Send + Sync {
    fn persist_conditions_package(
        &self,
        loan_id: &LoanId,
        files: &[UploadedFile],
    ) -> Result<DocumentPackage, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("document storage failed: {0}")]
    Unavailable(String),
}

/// Outbound email hooks. Best effort: callers log failures and move on, a
/// failed send never rolls back committed state.
pub trait NotificationDispatcher: Send + Sync {
    fn send_borrower_email(&self, to: &str, subject: &str, body: &str)
        -> Result<(), DispatchError>;
    fn send_lender_email(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Opaque third-party valuation lookup consumed by the valuation trail.
pub trait ValuationProvider: Send + Sync {
    fn fetch_external_valuation(
        &self,
        address: &str,
    ) -> Result<Option<ValuationFields>, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("valuation provider unavailable: {0}")]
    Unavailable(String),
}

/// Notification the state machine or orchestrator asks the caller to send
/// after the mutation commits. Dispatch is decoupled so it can fail or be
/// retried without touching loan state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationRequest {
    UnderwritingConditions { loan_id: LoanId, email: String },
    BorrowerAccessSetup { loan_id: LoanId, email: String },
    BorrowerMessage {
        loan_id: LoanId,
        email: String,
        subject: String,
        body: String,
    },
}

impl NotificationRequest {
    pub fn loan_id(&self) -> &LoanId {
        match self {
            Self::UnderwritingConditions { loan_id, .. }
            | Self::BorrowerAccessSetup { loan_id, .. }
            | Self::BorrowerMessage { loan_id, .. } => loan_id,
        }
    }
}

/// Sanitized representation of a loan's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct LoanStatusView {
    pub loan_id: LoanId,
    pub stage: &'static str,
    pub stage_index: usize,
    pub pre_approval_decision: &'static str,
    pub intake_status: &'static str,
    pub borrower_access: super::domain::BorrowerAccessStatus,
    pub history: Vec<&'static str>,
}

impl LoanStatusView {
    pub fn from_loan(loan: &LoanApplication) -> Self {
        Self {
            loan_id: loan.id.clone(),
            stage: loan.current_stage.label(),
            stage_index: loan.current_stage.index(),
            pre_approval_decision: loan.pre_approval_decision.label(),
            intake_status: loan.intake.status.label(),
            borrower_access: loan.borrower_access.status(),
            history: loan.history.iter().map(|event| event.name()).collect(),
        }
    }
}
