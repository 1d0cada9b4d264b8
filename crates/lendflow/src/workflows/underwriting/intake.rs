//! Underwriting intake and conditions pipeline.
//!
//! Two sequential borrower forms gated by the state machine: the
//! continuation intake unlocks when the loan enters underwriting review, and
//! the conditions form unlocks only once the intake is submitted. Validation
//! always reports the complete list of violated rules.

use chrono::{DateTime, Utc};

use super::domain::{
    ConditionsForm, ConditionsSubmission, DocumentPackage, IntakeForm, IntakeStatus,
    IntakeSubmissionRecord, LlcDocumentKind, LoanApplication, WorkflowError,
};
use super::identity::{document_usable, validate_liquidity_documents};

pub fn validate_intake(form: &IntakeForm) -> Vec<String> {
    let mut violations = Vec::new();

    if form.credit_score.is_none() {
        violations.push("credit score is required".to_string());
    }
    if !form.liquidity_amount.map(|amount| amount > 0.0).unwrap_or(false) {
        violations.push("available liquidity amount is required".to_string());
    }
    match form.has_external_loans {
        None => violations
            .push("answer whether you carry loans with other lenders".to_string()),
        Some(true) => {
            if form.external_loans.is_empty() {
                violations.push(
                    "list each loan held with another lender, or answer no".to_string(),
                );
            } else if form
                .external_loans
                .iter()
                .any(|loan| loan.lender_name.trim().is_empty())
            {
                violations.push("every external loan needs the lender's name".to_string());
            }
        }
        Some(false) => {}
    }

    violations
}

/// Record a continuation-intake submission. Rejected while the form is still
/// locked; resubmission is allowed and every submission is retained.
pub fn submit_intake(
    loan: &mut LoanApplication,
    form: IntakeForm,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if loan.intake.status == IntakeStatus::Locked {
        return Err(WorkflowError::Locked {
            form: "underwriting intake",
            requirement: "the loan must reach underwriting review first",
        });
    }

    let violations = validate_intake(&form);
    if !violations.is_empty() {
        return Err(WorkflowError::ValidationFailed { violations });
    }

    loan.intake.submission_history.push(IntakeSubmissionRecord {
        submitted_at: now,
        form: form.clone(),
    });
    loan.intake.form_data = Some(form);
    loan.intake.submitted_at = Some(now);
    loan.intake.status = IntakeStatus::Submitted;
    Ok(())
}

/// The conditions form is reachable only after the intake is submitted.
pub fn ensure_conditions_unlocked(loan: &LoanApplication) -> Result<(), WorkflowError> {
    if loan.intake.status != IntakeStatus::Submitted {
        return Err(WorkflowError::Locked {
            form: "conditions form",
            requirement: "submit the underwriting intake first",
        });
    }
    Ok(())
}

/// Full completeness check for a conditions submission. Every violated rule
/// is reported; nothing short-circuits.
pub fn validate_conditions(loan: &LoanApplication, submission: &ConditionsSubmission) -> Vec<String> {
    let mut violations = Vec::new();

    if submission.credit_score.is_none() {
        violations.push("credit score is required".to_string());
    }
    if !submission
        .liquidity_amount
        .map(|amount| amount > 0.0)
        .unwrap_or(false)
    {
        violations.push("liquidity amount is required".to_string());
    }

    if !submission.liquidity_documents.iter().any(document_usable) {
        violations.push("at least one liquidity proof document is required".to_string());
    }

    let missing_llc: Vec<&'static str> = LlcDocumentKind::all()
        .into_iter()
        .filter(|kind| {
            !submission
                .llc_documents
                .iter()
                .any(|doc| doc.kind == *kind)
        })
        .map(|kind| kind.label())
        .collect();
    if !missing_llc.is_empty() {
        violations.push(format!("LLC documents missing: {}", missing_llc.join(", ")));
    }

    let referral_complete = submission
        .referral
        .as_ref()
        .map(|referral| {
            !referral.name.trim().is_empty()
                && !referral.email.trim().is_empty()
                && !referral.phone.trim().is_empty()
        })
        .unwrap_or(false);
    if !referral_complete {
        violations.push("referral contact with name, email, and phone is required".to_string());
    }

    let has_documented_project = submission
        .past_projects
        .iter()
        .any(|project| !project.address.trim().is_empty() && !project.photos.is_empty());
    if !has_documented_project {
        violations
            .push("at least one past project with at least one photo is required".to_string());
    }

    if submission.other_mortgage_loan_count.is_none() {
        violations.push("count of other mortgage loans is required".to_string());
    }
    if submission.other_mortgage_total.is_none() {
        violations.push("total balance of other mortgage loans is required".to_string());
    }

    violations.extend(validate_liquidity_documents(
        &submission.liquidity_documents,
        &loan.borrower,
        loan.llc_name.as_deref(),
    ));

    violations
}

/// Commit a validated conditions submission with its persisted document
/// package. The previous form, if any, is superseded wholesale; the old
/// package is never mutated.
pub fn apply_conditions(
    loan: &mut LoanApplication,
    submission: ConditionsSubmission,
    package: DocumentPackage,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let violations = validate_conditions(loan, &submission);
    if !violations.is_empty() {
        return Err(WorkflowError::ValidationFailed { violations });
    }

    let ConditionsSubmission {
        credit_score: Some(credit_score),
        liquidity_amount: Some(liquidity_amount),
        liquidity_documents,
        llc_documents,
        referral: Some(referral),
        past_projects,
        other_mortgage_loan_count: Some(other_mortgage_loan_count),
        other_mortgage_total: Some(other_mortgage_total),
        files: _,
        reuse_meta,
    } = submission
    else {
        // Unreachable after validation, but never panic on request data.
        return Err(WorkflowError::ValidationFailed {
            violations: vec!["conditions submission is incomplete".to_string()],
        });
    };

    loan.conditions = Some(ConditionsForm {
        credit_score,
        liquidity_amount,
        liquidity_documents,
        llc_documents,
        referral,
        past_projects,
        other_mortgage_loan_count,
        other_mortgage_total,
        document_package: package,
        reuse_meta,
        submitted_at: now,
    });
    Ok(())
}
