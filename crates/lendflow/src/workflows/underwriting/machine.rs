//! Workflow state machine.
//!
//! Stages advance one at a time through a closed transition table. Side
//! effects are described, not dispatched: `advance` returns the
//! notifications the caller must send after the state change commits.

use chrono::{DateTime, Utc};

use super::domain::{
    IntakeStatus, LoanApplication, PreApprovalDecision, WorkflowError, WorkflowEvent, WorkflowStage,
};
use super::repository::NotificationRequest;

/// stage -> expected event -> next stage. Anything outside this table is an
/// invalid transition.
const TRANSITIONS: [(WorkflowStage, WorkflowEvent, WorkflowStage); 5] = [
    (
        WorkflowStage::ApplicationSubmitted,
        WorkflowEvent::DocumentsRequested,
        WorkflowStage::DocumentCollection,
    ),
    (
        WorkflowStage::DocumentCollection,
        WorkflowEvent::ReviewStarted,
        WorkflowStage::LenderReview,
    ),
    (
        WorkflowStage::LenderReview,
        WorkflowEvent::UnderwritingStarted,
        WorkflowStage::UnderwritingReview,
    ),
    (
        WorkflowStage::UnderwritingReview,
        WorkflowEvent::UnderwritingApproved,
        WorkflowStage::Approved,
    ),
    (
        WorkflowStage::Approved,
        WorkflowEvent::FundingInitiated,
        WorkflowStage::Funding,
    ),
];

/// The single event accepted at the given stage, if any.
pub fn expected_event(stage: WorkflowStage) -> Option<WorkflowEvent> {
    TRANSITIONS
        .iter()
        .find(|(from, _, _)| *from == stage)
        .map(|(_, event, _)| *event)
}

fn next_stage(stage: WorkflowStage, event: WorkflowEvent) -> Option<WorkflowStage> {
    TRANSITIONS
        .iter()
        .find(|(from, via, _)| *from == stage && *via == event)
        .map(|(_, _, to)| *to)
}

/// Advance the loan by exactly one stage via the expected event.
///
/// `has_prior_approved_loan` reflects the borrower's other applications and
/// gates the one-time borrower-access invitation on approval.
pub fn advance(
    loan: &mut LoanApplication,
    event: WorkflowEvent,
    now: DateTime<Utc>,
    has_prior_approved_loan: bool,
) -> Result<Vec<NotificationRequest>, WorkflowError> {
    let Some(target) = next_stage(loan.current_stage, event) else {
        return Err(WorkflowError::InvalidTransition {
            stage: loan.current_stage.label(),
            event: event.name().to_string(),
        });
    };
    debug_assert!(target.index() == loan.current_stage.index() + 1);

    loan.current_stage = target;
    loan.history.push(event);
    loan.last_event_at = now;

    let mut notifications = Vec::new();

    if target == WorkflowStage::UnderwritingReview {
        if loan.intake.status == IntakeStatus::Locked {
            loan.intake.status = IntakeStatus::Pending;
            loan.intake.requested_at = Some(now);
        }
        // One-time "conditions required" email, guarded by the stored stamp.
        if loan.intake.notification_sent_at.is_none() {
            loan.intake.notification_sent_at = Some(now);
            notifications.push(NotificationRequest::UnderwritingConditions {
                loan_id: loan.id.clone(),
                email: loan.borrower.email.clone(),
            });
        }
    }

    if event == WorkflowEvent::UnderwritingApproved {
        if loan.pre_approval_decision == PreApprovalDecision::Pending {
            loan.pre_approval_decision = PreApprovalDecision::PreApprove;
        }
        if !has_prior_approved_loan && loan.borrower_access.invited_at.is_none() {
            loan.borrower_access.invited_at = Some(now);
            notifications.push(NotificationRequest::BorrowerAccessSetup {
                loan_id: loan.id.clone(),
                email: loan.borrower.email.clone(),
            });
        }
    }

    Ok(notifications)
}
