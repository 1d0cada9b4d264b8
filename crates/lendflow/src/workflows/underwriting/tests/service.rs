use super::common::*;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use crate::workflows::underwriting::domain::{
    IntakeStatus, PreApprovalDecision, WorkflowError, WorkflowStage,
};
use crate::workflows::underwriting::orchestrator::LenderDecision;
use crate::workflows::underwriting::service::LoanServiceError;
use crate::workflows::underwriting::QuickDecision;

#[test]
fn submission_normalizes_and_alerts_lenders() {
    let (service, repository, dispatcher, _, _) = build_service();

    let mut inbound = submission();
    inbound.borrower.email = " Dana.Reyes@Example.COM ".to_string();
    let loan = service.submit_application(inbound).expect("submits");

    assert_eq!(loan.borrower.email, "dana.reyes@example.com");
    assert_eq!(loan.borrower.emergency_contacts.len(), 3);
    assert_eq!(loan.current_stage, WorkflowStage::ApplicationSubmitted);
    assert!(repository.snapshot(&loan.id).is_some());

    let lender_emails = dispatcher.lender_emails.lock().expect("mutex");
    assert_eq!(lender_emails.len(), 1);
    assert_eq!(lender_emails[0].0, vec!["lending@lendflow.test".to_string()]);
}

#[test]
fn loan_ids_are_sequenced_per_service_instance() {
    let (service, _, _, _, _) = build_service();
    let first = service.submit_application(submission()).expect("submits");
    let second = service.submit_application(submission()).expect("submits");
    assert_eq!(first.id.0, "loan-000001");
    assert_eq!(second.id.0, "loan-000002");

    // A fresh service starts its own sequence; nothing leaks across instances.
    let (fresh, _, _, _, _) = build_service();
    let other = fresh.submit_application(submission()).expect("submits");
    assert_eq!(other.id.0, "loan-000001");
}

#[test]
fn unknown_events_are_invalid_transitions() {
    let (service, _, _, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");

    let err = service
        .advance_workflow_event(&loan.id, "LOAN_REJECTED")
        .expect_err("unknown event is rejected");
    assert!(matches!(
        err,
        LoanServiceError::Workflow(WorkflowError::InvalidTransition { .. })
    ));
}

#[test]
fn conditions_email_is_sent_exactly_once() {
    let (service, _, dispatcher, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");

    advance_to_underwriting(&service, &loan.id);

    let conditions_subjects = dispatcher
        .borrower_subjects()
        .into_iter()
        .filter(|subject| subject.contains("conditions"))
        .count();
    assert_eq!(conditions_subjects, 1);

    let stored = service.get(&loan.id).expect("loaded");
    assert_eq!(stored.intake.status, IntakeStatus::Pending);
}

#[test]
fn full_lifecycle_reaches_funding() {
    let (service, _, dispatcher, documents, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");

    advance_to_underwriting(&service, &loan.id);

    let outcome = service
        .submit_underwriting_intake(&loan.id, intake_form())
        .expect("intake accepted");
    assert_eq!(outcome.loan.intake.status, IntakeStatus::Submitted);

    let outcome = service
        .submit_conditions_form(&loan.id, conditions_submission())
        .expect("conditions accepted");
    let summary = outcome.summary.expect("summary computed");
    assert_eq!(summary.decision, QuickDecision::Approve);
    assert_eq!(documents.packages.lock().expect("mutex").len(), 1);

    service
        .advance_workflow_event(&loan.id, "UNDERWRITING_APPROVED")
        .expect("approved");
    let outcome = service
        .advance_workflow_event(&loan.id, "FUNDING_INITIATED")
        .expect("funded");
    assert_eq!(outcome.loan.current_stage, WorkflowStage::Funding);

    // First-time borrower got the access invitation on approval.
    assert!(dispatcher
        .borrower_subjects()
        .iter()
        .any(|subject| subject.contains("borrower portal access")));
}

#[test]
fn pre_approval_fast_forwards_to_underwriting() {
    let (service, _, _, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");
    service
        .advance_workflow_event(&loan.id, "DOCUMENTS_REQUESTED")
        .expect("advances");
    service
        .advance_workflow_event(&loan.id, "REVIEW_STARTED")
        .expect("advances");

    let outcome = service
        .apply_lender_decision(&loan.id, LenderDecision::PreApprove, None)
        .expect("decision applies");

    assert_eq!(outcome.loan.current_stage, WorkflowStage::UnderwritingReview);
    assert_eq!(
        outcome.loan.pre_approval_decision,
        PreApprovalDecision::PreApprove
    );
    assert!(outcome.summary.is_some());
}

#[test]
fn request_info_requires_notes_and_messages_the_borrower() {
    let (service, _, dispatcher, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");

    let err = service
        .apply_lender_decision(&loan.id, LenderDecision::RequestInfo, None)
        .expect_err("notes are required");
    assert!(matches!(
        err,
        LoanServiceError::Workflow(WorkflowError::ValidationFailed { .. })
    ));

    let outcome = service
        .apply_lender_decision(
            &loan.id,
            LenderDecision::RequestInfo,
            Some("Please supply a signed purchase contract.".to_string()),
        )
        .expect("decision applies");
    assert_eq!(outcome.loan.communications.len(), 1);
    assert!(dispatcher
        .borrower_subjects()
        .iter()
        .any(|subject| subject.contains("More information")));
}

#[test]
fn funded_loans_reject_new_decisions() {
    let (service, repository, _, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");
    let mut funded = repository.snapshot(&loan.id).expect("stored");
    funded.current_stage = WorkflowStage::Funding;
    repository.seed(funded);

    let err = service
        .apply_lender_decision(&loan.id, LenderDecision::Decline, None)
        .expect_err("funded loans are immutable");
    assert!(matches!(
        err,
        LoanServiceError::Workflow(WorkflowError::Conflict(_))
    ));
}

#[test]
fn repeat_borrowers_skip_the_access_invitation() {
    let (service, repository, dispatcher, _, _) = build_service();

    let mut previous = loan("loan-prior-approved");
    previous.current_stage = WorkflowStage::Approved;
    previous.created_at = Utc::now() - Duration::days(120);
    repository.seed(previous);

    let loan = service.submit_application(submission()).expect("submits");
    advance_to_underwriting(&service, &loan.id);
    service
        .advance_workflow_event(&loan.id, "UNDERWRITING_APPROVED")
        .expect("approved");

    assert!(!dispatcher
        .borrower_subjects()
        .iter()
        .any(|subject| subject.contains("borrower portal access")));
}

#[test]
fn notification_failures_never_roll_back_state() {
    let (service, _, dispatcher, _, _) = build_service();
    dispatcher.fail.store(true, Ordering::SeqCst);

    let loan = service.submit_application(submission()).expect("submits");
    let outcome = service
        .advance_workflow_event(&loan.id, "DOCUMENTS_REQUESTED")
        .expect("advance survives a dead mail transport");
    assert_eq!(outcome.loan.current_stage, WorkflowStage::DocumentCollection);
}

#[test]
fn storage_failure_rejects_conditions_without_mutation() {
    let (service, _, _, documents, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");
    advance_to_underwriting(&service, &loan.id);
    service
        .submit_underwriting_intake(&loan.id, intake_form())
        .expect("intake accepted");

    documents.fail.store(true, Ordering::SeqCst);
    let err = service
        .submit_conditions_form(&loan.id, conditions_submission())
        .expect_err("storage failure surfaces");
    assert!(matches!(err, LoanServiceError::Storage(_)));

    let stored = service.get(&loan.id).expect("loaded");
    assert!(stored.conditions.is_none());
}

#[test]
fn decision_summary_reflects_mutations() {
    let (service, _, _, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");
    advance_to_underwriting(&service, &loan.id);

    let before = service.decision_summary(&loan.id).expect("summary");
    assert!(before
        .flags
        .iter()
        .any(|flag| flag.id == "intake-missing"));

    service
        .submit_underwriting_intake(&loan.id, intake_form())
        .expect("intake accepted");

    let after = service.decision_summary(&loan.id).expect("summary");
    assert!(!after.flags.iter().any(|flag| flag.id == "intake-missing"));
}

#[test]
fn signed_actions_round_trip_and_reject_tampering() {
    let (service, _, _, _, _) = build_service();
    let loan = service.submit_application(submission()).expect("submits");

    let link = service
        .sign_email_action(&loan.id, crate::links::LinkAction::Approve)
        .expect("link minted");

    service
        .verify_email_action(
            &loan.id,
            crate::links::LinkAction::Approve,
            link.expires_at,
            &link.signature,
        )
        .expect("genuine link verifies");

    let err = service
        .verify_email_action(
            &loan.id,
            crate::links::LinkAction::Deny,
            link.expires_at,
            &link.signature,
        )
        .expect_err("action swap is rejected");
    assert!(matches!(err, LoanServiceError::Link(_)));
}
