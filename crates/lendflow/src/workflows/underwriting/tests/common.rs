use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::links::ActionLinkCodec;
use crate::workflows::underwriting::domain::{
    BorrowerProfile, ConditionsSubmission, DocumentPackage, IntakeForm, LiquidityDocCategory,
    LiquidityDocument, LlcDocument, LlcDocumentKind, LoanApplication, LoanId, LoanType,
    PastProject, PurchaseDetails, ReferralContact, StoredFile, SupportingDocument, UploadedFile,
    ValuationFields,
};
use crate::workflows::underwriting::repository::{
    DispatchError, DocumentStore, LoanRepository, NotificationDispatcher, ProviderError,
    RepositoryError, StorageError, ValuationProvider,
};
use crate::workflows::underwriting::service::{LoanWorkflowService, NewLoanApplication};
use crate::workflows::underwriting::UnderwritingRules;

pub(super) type TestService =
    LoanWorkflowService<MemoryRepository, MemoryDocuments, MemoryDispatcher, MemoryValuations>;

pub(super) fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn upload(name: &str) -> SupportingDocument {
    SupportingDocument {
        name: name.to_string(),
        storage_key: format!("uploads/{name}"),
        uploaded_at: ts(2026, 5, 1),
    }
}

pub(super) fn borrower() -> BorrowerProfile {
    BorrowerProfile {
        first_name: "Dana".to_string(),
        last_name: "Reyes".to_string(),
        email: "dana.reyes@example.com".to_string(),
        phone: Some("515-555-0147".to_string()),
        mailing_address: Some("900 Grand Ave, Des Moines, IA".to_string()),
        emergency_contacts: Vec::new(),
        guarantors: Vec::new(),
        guarantor_contacts: Vec::new(),
    }
}

pub(super) fn purchase() -> PurchaseDetails {
    PurchaseDetails {
        property_address: Some("41 Linden Ave, Des Moines, IA".to_string()),
        purchase_price: Some(420_000.0),
        rehab_budget: Some(80_000.0),
        after_repair_value: Some(650_000.0),
        exit_strategy: Some("resale".to_string()),
        target_closing_date: Some(date(2030, 3, 21)),
        comparable_sales: vec![upload("comps.pdf")],
        property_photos: vec![upload("front-elevation.jpg")],
        purchase_contract: vec![upload("contract.pdf")],
        scope_of_work: vec![upload("scope.pdf")],
    }
}

pub(super) fn submission() -> NewLoanApplication {
    NewLoanApplication {
        borrower: borrower(),
        llc_name: Some("Linden Ave Holdings LLC".to_string()),
        llc_state: Some("IA".to_string()),
        amount: 400_000.0,
        loan_type: LoanType::FixAndFlip,
        purchase: purchase(),
    }
}

/// Aggregate fixture for module tests that drive the workflow directly.
pub(super) fn loan(id: &str) -> LoanApplication {
    LoanApplication::new(
        LoanId(id.to_string()),
        borrower(),
        Some("Linden Ave Holdings LLC".to_string()),
        Some("IA".to_string()),
        400_000.0,
        LoanType::FixAndFlip,
        purchase(),
        ts(2026, 5, 10),
    )
}

pub(super) fn liquidity_doc(statement_name: &str) -> LiquidityDocument {
    LiquidityDocument {
        category: LiquidityDocCategory::BankStatement,
        statement_name: statement_name.to_string(),
        evidence_key: "docs/bank-may.pdf".to_string(),
        uploaded_at: ts(2026, 6, 1),
        named_party_is_guarantor: false,
        named_party_is_llc_member: false,
    }
}

pub(super) fn llc_documents() -> Vec<LlcDocument> {
    LlcDocumentKind::all()
        .into_iter()
        .map(|kind| LlcDocument {
            kind,
            name: format!("{}.pdf", kind.label().replace(' ', "-")),
            storage_key: format!("llc/{}", kind.label().replace(' ', "-")),
            uploaded_at: ts(2026, 5, 12),
        })
        .collect()
}

pub(super) fn referral() -> ReferralContact {
    ReferralContact {
        name: "Marcus Webb".to_string(),
        email: "marcus@webbrealty.example.com".to_string(),
        phone: "515-555-0199".to_string(),
    }
}

pub(super) fn past_project() -> PastProject {
    PastProject {
        address: "12 Oakridge Dr, Ankeny, IA".to_string(),
        photos: vec![upload("oakridge-after.jpg")],
    }
}

pub(super) fn intake_form() -> IntakeForm {
    IntakeForm {
        credit_score: Some(742),
        liquidity_amount: Some(120_000.0),
        has_external_loans: Some(false),
        external_loans: Vec::new(),
        declared_monthly_payment: None,
        notes: None,
    }
}

pub(super) fn conditions_submission() -> ConditionsSubmission {
    ConditionsSubmission {
        credit_score: Some(742),
        liquidity_amount: Some(120_000.0),
        liquidity_documents: vec![liquidity_doc("Dana Reyes")],
        llc_documents: llc_documents(),
        referral: Some(referral()),
        past_projects: vec![past_project()],
        other_mortgage_loan_count: Some(2),
        other_mortgage_total: Some(0.0),
        files: vec![UploadedFile {
            name: "bank-may.pdf".to_string(),
            source_key: "staging/bank-may.pdf".to_string(),
        }],
        reuse_meta: None,
    }
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<LoanId, LoanApplication>>,
}

impl MemoryRepository {
    pub(super) fn seed(&self, loan: LoanApplication) {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(loan.id.clone(), loan);
    }

    pub(super) fn snapshot(&self, id: &LoanId) -> Option<LoanApplication> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl LoanRepository for MemoryRepository {
    fn insert(&self, loan: LoanApplication) -> Result<LoanApplication, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&loan.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }

    fn update(&self, loan: LoanApplication) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(loan.id.clone(), loan);
        Ok(())
    }

    fn fetch(&self, id: &LoanId) -> Result<Option<LoanApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_by_email(&self, email: &str) -> Result<Vec<LoanApplication>, RepositoryError> {
        let needle = email.trim().to_ascii_lowercase();
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut matches: Vec<LoanApplication> = guard
            .values()
            .filter(|loan| loan.borrower.email.trim().to_ascii_lowercase() == needle)
            .cloned()
            .collect();
        matches.sort_by_key(|loan| loan.created_at);
        Ok(matches)
    }
}

#[derive(Default)]
pub(super) struct MemoryDocuments {
    pub(super) packages: Mutex<Vec<(LoanId, Vec<String>)>>,
    pub(super) fail: AtomicBool,
}

impl DocumentStore for MemoryDocuments {
    fn persist_conditions_package(
        &self,
        loan_id: &LoanId,
        files: &[UploadedFile],
    ) -> Result<DocumentPackage, StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("document volume offline".to_string()));
        }
        let names: Vec<String> = files.iter().map(|file| file.name.clone()).collect();
        self.packages
            .lock()
            .expect("package mutex poisoned")
            .push((loan_id.clone(), names));
        let stored = files
            .iter()
            .enumerate()
            .map(|(index, file)| StoredFile {
                id: format!("doc-{:03}", index + 1),
                name: file.name.clone(),
                relative_path: format!("{loan_id}/{}", file.name),
            })
            .collect();
        Ok(DocumentPackage {
            files: stored,
            persisted_at: Utc::now(),
        })
    }
}

#[derive(Default)]
pub(super) struct MemoryDispatcher {
    pub(super) borrower_emails: Mutex<Vec<(String, String)>>,
    pub(super) lender_emails: Mutex<Vec<(Vec<String>, String)>>,
    pub(super) fail: AtomicBool,
}

impl MemoryDispatcher {
    pub(super) fn borrower_subjects(&self) -> Vec<String> {
        self.borrower_emails
            .lock()
            .expect("dispatch mutex poisoned")
            .iter()
            .map(|(_, subject)| subject.clone())
            .collect()
    }
}

impl NotificationDispatcher for MemoryDispatcher {
    fn send_borrower_email(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
    ) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Transport("smtp unreachable".to_string()));
        }
        self.borrower_emails
            .lock()
            .expect("dispatch mutex poisoned")
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }

    fn send_lender_email(
        &self,
        recipients: &[String],
        subject: &str,
        _body: &str,
    ) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Transport("smtp unreachable".to_string()));
        }
        self.lender_emails
            .lock()
            .expect("dispatch mutex poisoned")
            .push((recipients.to_vec(), subject.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryValuations {
    pub(super) response: Mutex<Option<ValuationFields>>,
}

impl ValuationProvider for MemoryValuations {
    fn fetch_external_valuation(
        &self,
        _address: &str,
    ) -> Result<Option<ValuationFields>, ProviderError> {
        Ok(self.response.lock().expect("valuation mutex poisoned").clone())
    }
}

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryRepository>,
    Arc<MemoryDispatcher>,
    Arc<MemoryDocuments>,
    Arc<MemoryValuations>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let documents = Arc::new(MemoryDocuments::default());
    let dispatcher = Arc::new(MemoryDispatcher::default());
    let valuations = Arc::new(MemoryValuations::default());
    let service = Arc::new(LoanWorkflowService::new(
        repository.clone(),
        documents.clone(),
        dispatcher.clone(),
        valuations.clone(),
        UnderwritingRules::default(),
        ActionLinkCodec::new("test-link-secret"),
        Duration::days(3),
        vec!["lending@lendflow.test".to_string()],
    ));
    (service, repository, dispatcher, documents, valuations)
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Drive a freshly submitted loan into underwriting review.
pub(super) fn advance_to_underwriting(service: &TestService, id: &LoanId) {
    for event in [
        "DOCUMENTS_REQUESTED",
        "REVIEW_STARTED",
        "UNDERWRITING_STARTED",
    ] {
        service
            .advance_workflow_event(id, event)
            .expect("stage advances");
    }
}
