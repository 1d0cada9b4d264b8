use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::links::{ActionLinkCodec, LinkAction, LinkError, SignedActionLink};

use super::decision::{DecisionEngine, DecisionSummary, UnderwritingRules};
use super::domain::{
    BorrowerProfile, ConditionsSubmission, IntakeForm, LoanApplication, LoanId, LoanType,
    PurchaseDetails, ValuationFields, ValuationSource, WorkflowError, WorkflowEvent, WorkflowStage,
};
use super::intake;
use super::machine;
use super::orchestrator::{self, LenderDecision};
use super::prefill::{self, PrefillSnapshot};
use super::repository::{
    DocumentStore, LoanRepository, NotificationDispatcher, NotificationRequest, ProviderError,
    RepositoryError, StorageError, ValuationProvider,
};
use super::valuation::{self, ValuationView};
use super::{identity, LoanStatusView};

/// Inbound loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoanApplication {
    pub borrower: BorrowerProfile,
    pub llc_name: Option<String>,
    pub llc_state: Option<String>,
    pub amount: f64,
    pub loan_type: LoanType,
    #[serde(default)]
    pub purchase: PurchaseDetails,
}

/// Result of a mutating operation: the updated aggregate plus whatever was
/// computed on the way, so callers never need a second read.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub loan: LoanApplication,
    pub notifications: Vec<NotificationRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DecisionSummary>,
}

/// Service composing persistence, document storage, notification dispatch,
/// valuation lookups, and the decision engine behind one facade.
///
/// All mutations of a single loan are serialized through a per-loan lock;
/// loans are independent aggregates so no cross-loan locking exists.
pub struct LoanWorkflowService<R, D, N, V> {
    repository: Arc<R>,
    documents: Arc<D>,
    dispatcher: Arc<N>,
    valuations: Arc<V>,
    engine: DecisionEngine,
    codec: ActionLinkCodec,
    link_ttl: Duration,
    lender_recipients: Vec<String>,
    locks: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
    summaries: TtlCache<LoanId, DecisionSummary>,
    loan_sequence: AtomicU64,
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum LoanServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl<R, D, N, V> LoanWorkflowService<R, D, N, V>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    pub fn new(
        repository: Arc<R>,
        documents: Arc<D>,
        dispatcher: Arc<N>,
        valuations: Arc<V>,
        rules: UnderwritingRules,
        codec: ActionLinkCodec,
        link_ttl: Duration,
        lender_recipients: Vec<String>,
    ) -> Self {
        Self {
            repository,
            documents,
            dispatcher,
            valuations,
            engine: DecisionEngine::new(rules),
            codec,
            link_ttl,
            lender_recipients,
            locks: Mutex::new(HashMap::new()),
            summaries: TtlCache::new(256, Duration::minutes(10)),
            loan_sequence: AtomicU64::new(1),
        }
    }

    fn next_loan_id(&self) -> LoanId {
        let id = self.loan_sequence.fetch_add(1, Ordering::Relaxed);
        LoanId(format!("loan-{id:06}"))
    }

    fn lock_for(&self, id: &LoanId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks.entry(id.clone()).or_default().clone()
    }

    fn load(&self, id: &LoanId) -> Result<LoanApplication, LoanServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(LoanServiceError::Repository(RepositoryError::NotFound))
    }

    fn borrower_history(
        &self,
        loan: &LoanApplication,
    ) -> Result<Vec<LoanApplication>, LoanServiceError> {
        Ok(self.repository.list_by_email(&loan.borrower.email)?)
    }

    fn has_prior_approved_loan(&self, loan: &LoanApplication) -> Result<bool, LoanServiceError> {
        Ok(self.borrower_history(loan)?.iter().any(|other| {
            other.id != loan.id
                && other.current_stage.index() >= WorkflowStage::Approved.index()
        }))
    }

    /// Best-effort dispatch: failures are logged and swallowed, never
    /// surfaced to the caller or rolled back into loan state.
    fn dispatch(&self, requests: &[NotificationRequest]) {
        for request in requests {
            let result = match request {
                NotificationRequest::UnderwritingConditions { email, loan_id } => {
                    self.dispatcher.send_borrower_email(
                        email,
                        "Underwriting conditions required",
                        &format!(
                            "Loan {loan_id} has entered underwriting review. Please complete \
                             the continuation intake and conditions forms."
                        ),
                    )
                }
                NotificationRequest::BorrowerAccessSetup { email, loan_id } => {
                    self.dispatcher.send_borrower_email(
                        email,
                        "Set up your borrower portal access",
                        &format!(
                            "Loan {loan_id} has been pre-approved. Create your borrower \
                             account to track underwriting and funding."
                        ),
                    )
                }
                NotificationRequest::BorrowerMessage {
                    email,
                    subject,
                    body,
                    ..
                } => self.dispatcher.send_borrower_email(email, subject, body),
            };
            if let Err(err) = result {
                tracing::warn!(loan_id = %request.loan_id(), error = %err, "notification dispatch failed");
            }
        }
    }

    /// Email the lender team about a fresh submission, embedding signed
    /// one-click approve/deny links.
    fn notify_lenders_of_submission(&self, loan: &LoanApplication, now: DateTime<Utc>) {
        if self.lender_recipients.is_empty() {
            return;
        }
        let expires_at = now + self.link_ttl;
        let approve = self.codec.sign(&loan.id.0, LinkAction::Approve, expires_at);
        let deny = self.codec.sign(&loan.id.0, LinkAction::Deny, expires_at);
        let body = format!(
            "New {} application {} for ${:.2} from {}.\n\
             Approve: /api/v1/loans/{}/actions/approve?expires={}&sig={}\n\
             Deny: /api/v1/loans/{}/actions/deny?expires={}&sig={}",
            loan.loan_type.label(),
            loan.id,
            loan.amount,
            loan.borrower.full_name(),
            loan.id,
            expires_at.timestamp(),
            approve,
            loan.id,
            expires_at.timestamp(),
            deny,
        );
        if let Err(err) = self.dispatcher.send_lender_email(
            &self.lender_recipients,
            &format!("New loan application {}", loan.id),
            &body,
        ) {
            tracing::warn!(loan_id = %loan.id, error = %err, "lender notification failed");
        }
    }

    pub fn submit_application(
        &self,
        submission: NewLoanApplication,
    ) -> Result<LoanApplication, LoanServiceError> {
        let now = Utc::now();
        let borrower = identity::normalize_profile(submission.borrower);
        let loan = LoanApplication::new(
            self.next_loan_id(),
            borrower,
            submission.llc_name.map(|name| name.trim().to_string()),
            submission.llc_state.map(|state| state.trim().to_string()),
            submission.amount,
            submission.loan_type,
            submission.purchase,
            now,
        );
        let stored = self.repository.insert(loan)?;
        self.notify_lenders_of_submission(&stored, now);
        tracing::info!(loan_id = %stored.id, "loan application submitted");
        Ok(stored)
    }

    pub fn get(&self, id: &LoanId) -> Result<LoanApplication, LoanServiceError> {
        self.load(id)
    }

    pub fn status(&self, id: &LoanId) -> Result<LoanStatusView, LoanServiceError> {
        Ok(LoanStatusView::from_loan(&self.load(id)?))
    }

    pub fn advance_workflow_event(
        &self,
        id: &LoanId,
        event_name: &str,
    ) -> Result<MutationOutcome, LoanServiceError> {
        let guard = self.lock_for(id);
        let _held: MutexGuard<'_, ()> = guard.lock().expect("loan lock poisoned");

        let mut loan = self.load(id)?;
        let Some(event) = WorkflowEvent::parse(event_name) else {
            return Err(WorkflowError::InvalidTransition {
                stage: loan.current_stage.label(),
                event: event_name.to_string(),
            }
            .into());
        };

        let has_prior = self.has_prior_approved_loan(&loan)?;
        let notifications = machine::advance(&mut loan, event, Utc::now(), has_prior)?;
        self.repository.update(loan.clone())?;
        self.summaries.invalidate(id);
        self.dispatch(&notifications);

        Ok(MutationOutcome {
            loan,
            notifications,
            summary: None,
        })
    }

    pub fn apply_lender_decision(
        &self,
        id: &LoanId,
        decision: LenderDecision,
        notes: Option<String>,
    ) -> Result<MutationOutcome, LoanServiceError> {
        let guard = self.lock_for(id);
        let _held = guard.lock().expect("loan lock poisoned");

        let mut loan = self.load(id)?;
        let has_prior = self.has_prior_approved_loan(&loan)?;
        let notifications =
            orchestrator::apply_decision(&mut loan, decision, notes, Utc::now(), has_prior)?;
        self.repository.update(loan.clone())?;
        self.summaries.invalidate(id);
        self.dispatch(&notifications);

        let summary = self.summarize(&loan)?;
        Ok(MutationOutcome {
            loan,
            notifications,
            summary: Some(summary),
        })
    }

    pub fn submit_underwriting_intake(
        &self,
        id: &LoanId,
        form: IntakeForm,
    ) -> Result<MutationOutcome, LoanServiceError> {
        let guard = self.lock_for(id);
        let _held = guard.lock().expect("loan lock poisoned");

        let mut loan = self.load(id)?;
        intake::submit_intake(&mut loan, form, Utc::now())?;
        self.repository.update(loan.clone())?;
        self.summaries.invalidate(id);

        let summary = self.summarize(&loan)?;
        Ok(MutationOutcome {
            loan,
            notifications: Vec::new(),
            summary: Some(summary),
        })
    }

    /// Validate, persist the document package, then commit. Storage must
    /// succeed before any state changes; a failure rejects the submission
    /// and leaves the loan untouched so the caller can retry.
    pub fn submit_conditions_form(
        &self,
        id: &LoanId,
        submission: ConditionsSubmission,
    ) -> Result<MutationOutcome, LoanServiceError> {
        let guard = self.lock_for(id);
        let _held = guard.lock().expect("loan lock poisoned");

        let mut loan = self.load(id)?;
        intake::ensure_conditions_unlocked(&loan)?;

        let violations = intake::validate_conditions(&loan, &submission);
        if !violations.is_empty() {
            return Err(WorkflowError::ValidationFailed { violations }.into());
        }

        let package = self
            .documents
            .persist_conditions_package(id, &submission.files)?;

        intake::apply_conditions(&mut loan, submission, package, Utc::now())?;
        self.repository.update(loan.clone())?;
        self.summaries.invalidate(id);

        let summary = self.summarize(&loan)?;
        Ok(MutationOutcome {
            loan,
            notifications: Vec::new(),
            summary: Some(summary),
        })
    }

    pub fn prefill(&self, id: &LoanId) -> Result<PrefillSnapshot, LoanServiceError> {
        let loan = self.load(id)?;
        let history = self.borrower_history(&loan)?;
        Ok(prefill::resolve(
            &loan,
            &history,
            self.engine.rules().assumed_annual_interest_rate,
            Utc::now(),
        ))
    }

    fn summarize(&self, loan: &LoanApplication) -> Result<DecisionSummary, LoanServiceError> {
        let history = self.borrower_history(loan)?;
        let snapshot = prefill::resolve(
            loan,
            &history,
            self.engine.rules().assumed_annual_interest_rate,
            Utc::now(),
        );
        Ok(self.engine.summarize(loan, &snapshot, Utc::now()))
    }

    pub fn decision_summary(&self, id: &LoanId) -> Result<DecisionSummary, LoanServiceError> {
        let now = Utc::now();
        if let Some(cached) = self.summaries.get(id, now) {
            return Ok(cached);
        }
        let loan = self.load(id)?;
        let summary = self.summarize(&loan)?;
        self.summaries.insert(id.clone(), summary.clone(), now);
        Ok(summary)
    }

    /// Record a valuation input. `External` fetches from the configured
    /// provider using the property address; other roles supply a patch.
    pub fn update_valuation_input(
        &self,
        id: &LoanId,
        source: ValuationSource,
        patch: Option<ValuationFields>,
    ) -> Result<(LoanApplication, ValuationView), LoanServiceError> {
        let guard = self.lock_for(id);
        let _held = guard.lock().expect("loan lock poisoned");

        let mut loan = self.load(id)?;
        let fields = match source {
            ValuationSource::External => {
                let Some(address) = loan.purchase.property_address.clone() else {
                    return Err(WorkflowError::ValidationFailed {
                        violations: vec![
                            "a property address is required for an external valuation lookup"
                                .to_string(),
                        ],
                    }
                    .into());
                };
                match self.valuations.fetch_external_valuation(&address)? {
                    Some(fields) => fields,
                    None => {
                        return Err(WorkflowError::Conflict(format!(
                            "no external valuation is available for {address}"
                        ))
                        .into())
                    }
                }
            }
            _ => patch.ok_or_else(|| WorkflowError::ValidationFailed {
                violations: vec!["a valuation patch is required".to_string()],
            })?,
        };

        valuation::record(&mut loan, source, fields, Utc::now())?;
        self.repository.update(loan.clone())?;
        self.summaries.invalidate(id);

        let view = valuation::current_view(&loan);
        Ok((loan, view))
    }

    pub fn sign_email_action(
        &self,
        id: &LoanId,
        action: LinkAction,
    ) -> Result<SignedActionLink, LoanServiceError> {
        // Signing is stateless, but only mint links for loans that exist.
        let loan = self.load(id)?;
        let expires_at = Utc::now() + self.link_ttl;
        let signature = self.codec.sign(&loan.id.0, action, expires_at);
        Ok(SignedActionLink {
            action,
            expires_at,
            signature,
        })
    }

    pub fn verify_email_action(
        &self,
        id: &LoanId,
        action: LinkAction,
        expires_at: DateTime<Utc>,
        signature: &str,
    ) -> Result<(), LoanServiceError> {
        self.codec
            .verify(&id.0, action, expires_at, signature, Utc::now())?;
        Ok(())
    }

    pub fn verify_document_preview(
        &self,
        id: &LoanId,
        group: &str,
        index: usize,
        expires_at: DateTime<Utc>,
        signature: &str,
    ) -> Result<(), LoanServiceError> {
        self.codec.verify_document(
            &id.0,
            LinkAction::DocumentPreview,
            group,
            index,
            expires_at,
            signature,
            Utc::now(),
        )?;
        Ok(())
    }
}
