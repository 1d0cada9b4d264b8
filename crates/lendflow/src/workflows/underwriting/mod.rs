//! Loan origination and underwriting workflow.
//!
//! A six-stage state machine carries each application from submission to
//! funding. Around it sit the prefill resolver, identity and liquidity
//! normalization, the decision engine, the lender decision orchestrator,
//! the intake/conditions pipeline, and the valuation trail. The
//! [`service::LoanWorkflowService`] facade composes all of it behind
//! swappable persistence, storage, notification, and valuation traits.

pub mod decision;
pub mod domain;
pub mod identity;
pub mod intake;
pub mod machine;
pub mod orchestrator;
pub mod prefill;
pub mod repository;
pub mod router;
pub mod service;
pub mod valuation;

#[cfg(test)]
mod tests;

pub use decision::{DecisionEngine, DecisionSummary, QuickDecision, UnderwritingRules};
pub use domain::{
    LoanApplication, LoanId, LoanType, WorkflowError, WorkflowEvent, WorkflowStage,
};
pub use orchestrator::LenderDecision;
pub use prefill::{PrefillSnapshot, Reuse};
pub use repository::{
    DocumentStore, LoanRepository, LoanStatusView, NotificationDispatcher, NotificationRequest,
    ValuationProvider,
};
pub use service::{LoanWorkflowService, NewLoanApplication};
