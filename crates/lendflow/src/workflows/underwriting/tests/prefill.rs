use super::common::*;

use chrono::{DateTime, Duration, Utc};

use crate::workflows::underwriting::domain::{
    ConditionsForm, DocumentPackage, LoanApplication, WorkflowStage,
};
use crate::workflows::underwriting::prefill::{resolve, Reuse};

const ASSUMED_RATE: f64 = 0.12;

fn conditions_form(submitted_at: DateTime<Utc>) -> ConditionsForm {
    ConditionsForm {
        credit_score: 742,
        liquidity_amount: 120_000.0,
        liquidity_documents: vec![liquidity_doc("Dana Reyes")],
        llc_documents: llc_documents(),
        referral: referral(),
        past_projects: vec![past_project()],
        other_mortgage_loan_count: 2,
        other_mortgage_total: 0.0,
        document_package: DocumentPackage {
            files: Vec::new(),
            persisted_at: submitted_at,
        },
        reuse_meta: None,
        submitted_at,
    }
}

fn prior(id: &str, created_at: DateTime<Utc>) -> LoanApplication {
    let mut prior = loan(id);
    prior.created_at = created_at;
    prior.conditions = Some(conditions_form(created_at));
    prior
}

#[test]
fn recent_attestations_are_reusable() {
    let now = ts(2026, 6, 10);
    let current = loan("loan-p1");
    let prior = prior("loan-p0", now - Duration::days(10));

    let snapshot = resolve(&current, &[prior.clone(), current.clone()], ASSUMED_RATE, now);

    assert_eq!(snapshot.source, Some(prior.id.clone()));
    assert_eq!(
        snapshot.credit_score,
        Reuse::Fresh {
            value: 742,
            on_file: prior.created_at,
        }
    );
    assert!(snapshot.liquidity_amount.can_reuse());
    assert!(snapshot.liquidity_documents.can_reuse());
    assert!(snapshot.llc_documents.can_reuse());
    assert!(snapshot.referral.can_reuse());
    assert!(snapshot.past_projects.can_reuse());
}

#[test]
fn attestations_age_out_after_thirty_days() {
    let now = ts(2026, 6, 10);
    let current = loan("loan-p2");
    let mut old = prior("loan-p0", now - Duration::days(40));
    if let Some(conditions) = &mut old.conditions {
        for doc in &mut conditions.liquidity_documents {
            doc.uploaded_at = now - Duration::days(40);
        }
    }

    let snapshot = resolve(&current, &[old], ASSUMED_RATE, now);

    assert_eq!(snapshot.credit_score, Reuse::Stale);
    assert_eq!(snapshot.liquidity_amount, Reuse::Stale);
    assert_eq!(snapshot.liquidity_documents, Reuse::Stale);
    // Entity and track-record data never ages out.
    assert!(snapshot.llc_documents.can_reuse());
    assert!(snapshot.referral.can_reuse());
    assert!(snapshot.past_projects.can_reuse());
}

#[test]
fn document_reuse_revalidates_ownership_for_the_current_borrower() {
    let now = ts(2026, 6, 10);
    let current = loan("loan-p3");
    let mut third_party = prior("loan-p0", now - Duration::days(5));
    if let Some(conditions) = &mut third_party.conditions {
        for doc in &mut conditions.liquidity_documents {
            doc.statement_name = "Luis Ortega".to_string();
        }
    }

    let snapshot = resolve(&current, &[third_party], ASSUMED_RATE, now);
    assert_eq!(snapshot.liquidity_documents, Reuse::Stale);
}

#[test]
fn active_loans_report_declared_or_estimated_payments() {
    let now = ts(2026, 6, 10);
    let current = loan("loan-p4");

    let mut declared = prior("loan-d", now - Duration::days(90));
    declared.current_stage = WorkflowStage::Funding;
    declared.intake.form_data = Some({
        let mut form = intake_form();
        form.declared_monthly_payment = Some(2_150.0);
        form
    });

    let mut estimated = prior("loan-e", now - Duration::days(60));
    estimated.current_stage = WorkflowStage::Funding;
    estimated.amount = 250_000.0;

    let snapshot = resolve(&current, &[declared, estimated], ASSUMED_RATE, now);

    assert_eq!(snapshot.active_loans.len(), 2);
    let by_id = |id: &str| {
        snapshot
            .active_loans
            .iter()
            .find(|exposure| exposure.loan_id.0 == id)
            .expect("exposure present")
    };
    assert_eq!(by_id("loan-d").monthly_payment, 2_150.0);
    assert!(!by_id("loan-d").estimated);
    assert_eq!(by_id("loan-e").monthly_payment, 250_000.0 * ASSUMED_RATE / 12.0);
    assert!(by_id("loan-e").estimated);
}

#[test]
fn declared_llc_name_is_listed_first() {
    let now = ts(2026, 6, 10);
    let mut current = loan("loan-p5");
    current.llc_name = Some("Oakridge Builds".to_string());

    let mut other = prior("loan-p0", now - Duration::days(15));
    other.llc_name = Some("Linden Ave Holdings LLC".to_string());
    let mut oakridge = prior("loan-p1", now - Duration::days(25));
    oakridge.llc_name = Some("Oakridge Builds LLC".to_string());

    let snapshot = resolve(&current, &[other, oakridge], ASSUMED_RATE, now);

    assert_eq!(snapshot.llc_names[0], "Oakridge Builds");
    assert!(snapshot
        .llc_names
        .iter()
        .any(|name| name == "Linden Ave Holdings LLC"));
}
