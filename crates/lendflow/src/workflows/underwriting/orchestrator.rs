//! Lender decision orchestration.
//!
//! Applies a lender verdict to the aggregate and returns the notifications
//! the caller must dispatch after the state change commits, so a failed or
//! retried send never touches loan state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Communication, LoanApplication, PreApprovalDecision, WorkflowError, WorkflowStage,
};
use super::machine;
use super::repository::NotificationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LenderDecision {
    PreApprove,
    Decline,
    RequestInfo,
}

impl LenderDecision {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRE_APPROVE" => Some(Self::PreApprove),
            "DECLINE" => Some(Self::Decline),
            "REQUEST_INFO" => Some(Self::RequestInfo),
            _ => None,
        }
    }
}

pub fn apply_decision(
    loan: &mut LoanApplication,
    decision: LenderDecision,
    notes: Option<String>,
    now: DateTime<Utc>,
    has_prior_approved_loan: bool,
) -> Result<Vec<NotificationRequest>, WorkflowError> {
    if loan.current_stage == WorkflowStage::Funding {
        return Err(WorkflowError::Conflict(
            "a decision cannot be changed on a funded loan".to_string(),
        ));
    }

    match decision {
        LenderDecision::RequestInfo => {
            let Some(notes) = notes.filter(|n| !n.trim().is_empty()) else {
                return Err(WorkflowError::ValidationFailed {
                    violations: vec![
                        "REQUEST_INFO requires a note describing what is needed".to_string(),
                    ],
                });
            };
            loan.pre_approval_decision = PreApprovalDecision::RequestInfo;
            loan.communications.push(Communication {
                sent_at: now,
                author: "lender".to_string(),
                body: notes.clone(),
            });
            loan.last_event_at = now;
            Ok(vec![NotificationRequest::BorrowerMessage {
                loan_id: loan.id.clone(),
                email: loan.borrower.email.clone(),
                subject: "More information is needed on your loan application".to_string(),
                body: notes,
            }])
        }
        LenderDecision::Decline => {
            loan.pre_approval_decision = PreApprovalDecision::Decline;
            loan.decision_notes = notes.filter(|n| !n.trim().is_empty());
            loan.last_event_at = now;
            Ok(Vec::new())
        }
        LenderDecision::PreApprove => {
            loan.pre_approval_decision = PreApprovalDecision::PreApprove;
            loan.decision_notes = notes.filter(|n| !n.trim().is_empty());

            // Walk the expected events until the loan sits in underwriting
            // review; the machine appends UNDERWRITING_STARTED and applies
            // the one-time notification guards along the way.
            let mut notifications = Vec::new();
            while loan.current_stage.index() < WorkflowStage::UnderwritingReview.index() {
                let Some(event) = machine::expected_event(loan.current_stage) else {
                    break;
                };
                notifications.extend(machine::advance(
                    loan,
                    event,
                    now,
                    has_prior_approved_loan,
                )?);
            }
            Ok(notifications)
        }
    }
}
