use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(pub String);

impl std::fmt::Display for LoanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Product line requested by the borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    FixAndFlip,
    BridgePurchase,
    Refinance,
    GroundUp,
}

impl LoanType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FixAndFlip => "Fix & Flip",
            Self::BridgePurchase => "Bridge Purchase",
            Self::Refinance => "Refinance",
            Self::GroundUp => "Ground-Up Construction",
        }
    }

    /// Rehab products must document the planned work.
    pub const fn requires_scope_of_work(self) -> bool {
        matches!(self, Self::FixAndFlip | Self::GroundUp)
    }

    /// Every product except a refinance involves a purchase contract.
    pub const fn requires_purchase_contract(self) -> bool {
        !matches!(self, Self::Refinance)
    }
}

/// Six ordered stages a loan moves through, application to funding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStage {
    ApplicationSubmitted,
    DocumentCollection,
    LenderReview,
    UnderwritingReview,
    Approved,
    Funding,
}

impl WorkflowStage {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::ApplicationSubmitted,
            Self::DocumentCollection,
            Self::LenderReview,
            Self::UnderwritingReview,
            Self::Approved,
            Self::Funding,
        ]
    }

    pub const fn index(self) -> usize {
        match self {
            Self::ApplicationSubmitted => 0,
            Self::DocumentCollection => 1,
            Self::LenderReview => 2,
            Self::UnderwritingReview => 3,
            Self::Approved => 4,
            Self::Funding => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ApplicationSubmitted => "Application Submitted",
            Self::DocumentCollection => "Document Collection",
            Self::LenderReview => "Lender Review",
            Self::UnderwritingReview => "Underwriting Review",
            Self::Approved => "Approved",
            Self::Funding => "Funding",
        }
    }
}

/// Named transitions between stages. Exactly one event is expected at each
/// stage; anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEvent {
    DocumentsRequested,
    ReviewStarted,
    UnderwritingStarted,
    UnderwritingApproved,
    FundingInitiated,
}

impl WorkflowEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::DocumentsRequested => "DOCUMENTS_REQUESTED",
            Self::ReviewStarted => "REVIEW_STARTED",
            Self::UnderwritingStarted => "UNDERWRITING_STARTED",
            Self::UnderwritingApproved => "UNDERWRITING_APPROVED",
            Self::FundingInitiated => "FUNDING_INITIATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DOCUMENTS_REQUESTED" => Some(Self::DocumentsRequested),
            "REVIEW_STARTED" => Some(Self::ReviewStarted),
            "UNDERWRITING_STARTED" => Some(Self::UnderwritingStarted),
            "UNDERWRITING_APPROVED" => Some(Self::UnderwritingApproved),
            "FUNDING_INITIATED" => Some(Self::FundingInitiated),
            _ => None,
        }
    }
}

/// Lender pre-approval verdict tracked on the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreApprovalDecision {
    Pending,
    PreApprove,
    Decline,
    RequestInfo,
}

impl PreApprovalDecision {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PreApprove => "pre-approved",
            Self::Decline => "declined",
            Self::RequestInfo => "info requested",
        }
    }
}

/// One entry in a message log (borrower communications or lender comments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Communication {
    pub sent_at: DateTime<Utc>,
    pub author: String,
    pub body: String,
}

/// Metadata for an uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingDocument {
    pub name: String,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Purchase-side details supplied at application time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseDetails {
    pub property_address: Option<String>,
    pub purchase_price: Option<f64>,
    pub rehab_budget: Option<f64>,
    pub after_repair_value: Option<f64>,
    pub exit_strategy: Option<String>,
    pub target_closing_date: Option<NaiveDate>,
    pub comparable_sales: Vec<SupportingDocument>,
    pub property_photos: Vec<SupportingDocument>,
    pub purchase_contract: Vec<SupportingDocument>,
    pub scope_of_work: Vec<SupportingDocument>,
}

/// Guarantor contact record kept alongside the plain guarantor name list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuarantorContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

/// Borrower identity as stored on the aggregate. Normalized at submission by
/// the identity module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub mailing_address: Option<String>,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub guarantors: Vec<String>,
    pub guarantor_contacts: Vec<GuarantorContact>,
}

impl BorrowerProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Category of evidence backing a declared liquidity amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityDocCategory {
    BankStatement,
    Brokerage,
    Retirement,
    Other,
}

/// Proof-of-funds document with the declared statement holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityDocument {
    pub category: LiquidityDocCategory,
    /// Name shown on the statement, as the uploader declared it.
    pub statement_name: String,
    pub evidence_key: String,
    pub uploaded_at: DateTime<Utc>,
    pub named_party_is_guarantor: bool,
    pub named_party_is_llc_member: bool,
}

/// The four entity documents underwriting requires for every LLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlcDocumentKind {
    GoodStandingCertificate,
    OperatingAgreement,
    ArticlesOfOrganization,
    EinConfirmation,
}

impl LlcDocumentKind {
    pub const fn all() -> [Self; 4] {
        [
            Self::GoodStandingCertificate,
            Self::OperatingAgreement,
            Self::ArticlesOfOrganization,
            Self::EinConfirmation,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::GoodStandingCertificate => "certificate of good standing",
            Self::OperatingAgreement => "operating agreement",
            Self::ArticlesOfOrganization => "articles of organization",
            Self::EinConfirmation => "EIN confirmation letter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlcDocument {
    pub kind: LlcDocumentKind,
    pub name: String,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferralContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastProject {
    pub address: String,
    pub photos: Vec<SupportingDocument>,
}

/// External loan the borrower declared with another lender.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalLoanDeclaration {
    pub lender_name: String,
    pub total_amount: Option<f64>,
    pub monthly_interest: Option<f64>,
}

/// Gating status of the continuation intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntakeStatus {
    Locked,
    Pending,
    Submitted,
}

impl IntakeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Pending => "pending",
            Self::Submitted => "submitted",
        }
    }
}

/// Borrower-submitted continuation intake data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeForm {
    pub credit_score: Option<u16>,
    pub liquidity_amount: Option<f64>,
    pub has_external_loans: Option<bool>,
    pub external_loans: Vec<ExternalLoanDeclaration>,
    pub declared_monthly_payment: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSubmissionRecord {
    pub submitted_at: DateTime<Utc>,
    pub form: IntakeForm,
}

/// Continuation intake: locked until the loan reaches underwriting review,
/// then pending until the borrower submits. Every submission is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingIntake {
    pub status: IntakeStatus,
    pub requested_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub form_data: Option<IntakeForm>,
    pub submission_history: Vec<IntakeSubmissionRecord>,
}

impl Default for UnderwritingIntake {
    fn default() -> Self {
        Self {
            status: IntakeStatus::Locked,
            requested_at: None,
            submitted_at: None,
            notification_sent_at: None,
            form_data: None,
            submission_history: Vec::new(),
        }
    }
}

/// File handed to the document store for the conditions package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub source_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub relative_path: String,
}

/// Immutable snapshot of the files persisted at conditions submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPackage {
    pub files: Vec<StoredFile>,
    pub persisted_at: DateTime<Utc>,
}

/// Provenance recorded when a category was prefilled from a prior loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReuseMeta {
    pub source_loan: LoanId,
    pub source_created_at: DateTime<Utc>,
    pub categories: Vec<String>,
}

/// Inbound conditions-form submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsSubmission {
    pub credit_score: Option<u16>,
    pub liquidity_amount: Option<f64>,
    pub liquidity_documents: Vec<LiquidityDocument>,
    pub llc_documents: Vec<LlcDocument>,
    pub referral: Option<ReferralContact>,
    pub past_projects: Vec<PastProject>,
    pub other_mortgage_loan_count: Option<u32>,
    pub other_mortgage_total: Option<f64>,
    pub files: Vec<UploadedFile>,
    pub reuse_meta: Option<ReuseMeta>,
}

/// Stored conditions form. The document package is never mutated in place,
/// only superseded wholesale by a later submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionsForm {
    pub credit_score: u16,
    pub liquidity_amount: f64,
    pub liquidity_documents: Vec<LiquidityDocument>,
    pub llc_documents: Vec<LlcDocument>,
    pub referral: ReferralContact,
    pub past_projects: Vec<PastProject>,
    pub other_mortgage_loan_count: u32,
    pub other_mortgage_total: f64,
    pub document_package: DocumentPackage,
    pub reuse_meta: Option<ReuseMeta>,
    pub submitted_at: DateTime<Utc>,
}

/// Borrower portal access. The status is a pure function of the stored flags
/// so a read can never observe an ambiguous combination.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BorrowerAccess {
    pub invited_at: Option<DateTime<Utc>>,
    pub profile_completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowerAccessStatus {
    NotCreated,
    AccessCreated,
    ProfileCompleted,
}

impl BorrowerAccess {
    pub fn status(&self) -> BorrowerAccessStatus {
        match (self.invited_at.is_some(), self.profile_completed) {
            (false, _) => BorrowerAccessStatus::NotCreated,
            (true, false) => BorrowerAccessStatus::AccessCreated,
            (true, true) => BorrowerAccessStatus::ProfileCompleted,
        }
    }
}

/// Who supplied a valuation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationSource {
    LoanOfficer,
    Evaluator,
    External,
}

impl ValuationSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::LoanOfficer => "loan officer",
            Self::Evaluator => "evaluator",
            Self::External => "external data provider",
        }
    }
}

/// Valuation field set carried by each trail entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuationFields {
    pub market_value: Option<f64>,
    pub after_repair_value: Option<f64>,
    pub monthly_rent: Option<f64>,
    pub annual_taxes: Option<f64>,
    pub annual_insurance: Option<f64>,
}

/// Immutable, append-only audit entry. The trail is kept newest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationTrailEntry {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: ValuationSource,
    pub fields: ValuationFields,
}

/// Free-form evaluator worksheet kept alongside the trail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluatorInput {
    pub notes: Option<String>,
    pub fields: ValuationFields,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TitleAgentForm {
    pub company: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
}

/// Aggregate root. Created at submission, never deleted; sub-entities are
/// created lazily and retained indefinitely for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: LoanId,
    pub borrower: BorrowerProfile,
    pub llc_name: Option<String>,
    pub llc_state: Option<String>,
    pub llc_documents: Vec<LlcDocument>,
    pub amount: f64,
    pub loan_type: LoanType,
    pub purchase: PurchaseDetails,
    pub current_stage: WorkflowStage,
    pub history: Vec<WorkflowEvent>,
    pub pre_approval_decision: PreApprovalDecision,
    pub decision_notes: Option<String>,
    pub communications: Vec<Communication>,
    pub lender_comments: Vec<Communication>,
    pub intake: UnderwritingIntake,
    pub conditions: Option<ConditionsForm>,
    pub borrower_access: BorrowerAccess,
    pub valuation_trail: Vec<ValuationTrailEntry>,
    pub evaluator_input: Option<EvaluatorInput>,
    pub title_agent_form: Option<TitleAgentForm>,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
}

impl LoanApplication {
    pub fn new(
        id: LoanId,
        borrower: BorrowerProfile,
        llc_name: Option<String>,
        llc_state: Option<String>,
        amount: f64,
        loan_type: LoanType,
        purchase: PurchaseDetails,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            borrower,
            llc_name,
            llc_state,
            llc_documents: Vec::new(),
            amount,
            loan_type,
            purchase,
            current_stage: WorkflowStage::ApplicationSubmitted,
            history: Vec::new(),
            pre_approval_decision: PreApprovalDecision::Pending,
            decision_notes: None,
            communications: Vec::new(),
            lender_comments: Vec::new(),
            intake: UnderwritingIntake::default(),
            conditions: None,
            borrower_access: BorrowerAccess::default(),
            valuation_trail: Vec::new(),
            evaluator_input: None,
            title_agent_form: None,
            created_at,
            last_event_at: created_at,
        }
    }

    /// Best available credit score: latest conditions form, then intake.
    pub fn declared_credit_score(&self) -> Option<u16> {
        self.conditions
            .as_ref()
            .map(|form| form.credit_score)
            .or_else(|| self.intake.form_data.as_ref().and_then(|f| f.credit_score))
    }

    /// Best available liquidity amount: latest conditions form, then intake.
    pub fn declared_liquidity(&self) -> Option<f64> {
        self.conditions
            .as_ref()
            .map(|form| form.liquidity_amount)
            .or_else(|| {
                self.intake
                    .form_data
                    .as_ref()
                    .and_then(|f| f.liquidity_amount)
            })
    }
}

/// Error taxonomy for the workflow core. Validation and gating failures are
/// recoverable by the caller and carry actionable detail.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("event {event} is not valid at stage {stage}")]
    InvalidTransition { stage: &'static str, event: String },
    #[error("submission rejected: {}", violations.join("; "))]
    ValidationFailed { violations: Vec<String> },
    #[error("{form} is locked: {requirement}")]
    Locked {
        form: &'static str,
        requirement: &'static str,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("action link rejected")]
    Unauthorized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_indices_follow_declaration_order() {
        for (position, stage) in WorkflowStage::ordered().into_iter().enumerate() {
            assert_eq!(stage.index(), position);
        }
    }

    #[test]
    fn event_names_round_trip() {
        for event in [
            WorkflowEvent::DocumentsRequested,
            WorkflowEvent::ReviewStarted,
            WorkflowEvent::UnderwritingStarted,
            WorkflowEvent::UnderwritingApproved,
            WorkflowEvent::FundingInitiated,
        ] {
            assert_eq!(WorkflowEvent::parse(event.name()), Some(event));
        }
        assert_eq!(WorkflowEvent::parse("LOAN_REJECTED"), None);
    }

    #[test]
    fn borrower_access_status_is_derived() {
        let mut access = BorrowerAccess::default();
        assert_eq!(access.status(), BorrowerAccessStatus::NotCreated);

        access.invited_at = Some(Utc::now());
        assert_eq!(access.status(), BorrowerAccessStatus::AccessCreated);

        access.profile_completed = true;
        assert_eq!(access.status(), BorrowerAccessStatus::ProfileCompleted);
    }

    #[test]
    fn declared_values_prefer_conditions_over_intake() {
        let now = Utc::now();
        let mut loan = LoanApplication::new(
            LoanId("loan-1".to_string()),
            BorrowerProfile::default(),
            None,
            None,
            250_000.0,
            LoanType::FixAndFlip,
            PurchaseDetails::default(),
            now,
        );

        assert_eq!(loan.declared_credit_score(), None);

        loan.intake.form_data = Some(IntakeForm {
            credit_score: Some(690),
            liquidity_amount: Some(50_000.0),
            ..IntakeForm::default()
        });
        assert_eq!(loan.declared_credit_score(), Some(690));
        assert_eq!(loan.declared_liquidity(), Some(50_000.0));
    }
}
