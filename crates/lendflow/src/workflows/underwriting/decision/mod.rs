mod config;
mod flags;
mod liquidity;
mod policy;

pub use config::UnderwritingRules;
pub use flags::{FlagSeverity, FlagState, RiskFlag};
pub use liquidity::{days_until_next_month, liquidity_coverage, LiquidityCoverage};
pub use policy::QuickDecision;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ExternalLoanDeclaration, IntakeStatus, LiquidityDocument, LlcDocument, LoanApplication, LoanId,
};
use super::prefill::PrefillSnapshot;

/// Stateless engine applying the rule set to a loan and its prefill state.
pub struct DecisionEngine {
    rules: UnderwritingRules,
}

/// Resolved inputs the rules operate on, assembled once per evaluation.
/// Conditions-form data wins over the intake, which wins over reusable
/// prior-loan values.
#[derive(Debug, Clone)]
pub(crate) struct DecisionInputs {
    pub credit_score: Option<u16>,
    pub liquidity_amount: Option<f64>,
    pub liquidity_documents: Vec<LiquidityDocument>,
    pub llc_documents: Vec<LlcDocument>,
    pub other_mortgage_loan_count: Option<u32>,
    pub external_loans: Vec<ExternalLoanDeclaration>,
    pub intake_submitted: bool,
}

/// Full risk/decision picture for one loan. Deterministic in its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub loan_id: LoanId,
    pub ltv: Option<f64>,
    pub ltc: Option<f64>,
    pub liquidity: LiquidityCoverage,
    pub flags: Vec<RiskFlag>,
    pub decision: QuickDecision,
    pub reasons: Vec<String>,
    pub conditions: Vec<String>,
}

impl DecisionEngine {
    pub fn new(rules: UnderwritingRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &UnderwritingRules {
        &self.rules
    }

    pub fn summarize(
        &self,
        loan: &LoanApplication,
        prefill: &PrefillSnapshot,
        now: DateTime<Utc>,
    ) -> DecisionSummary {
        let inputs = resolve_inputs(loan, prefill);

        let ltv = ratio(loan.amount, loan.purchase.after_repair_value);
        let ltc = cost_basis(loan).and_then(|basis| ratio(loan.amount, Some(basis)));

        let coverage = liquidity_coverage(
            loan.amount,
            inputs.liquidity_amount.unwrap_or(0.0),
            loan.purchase.target_closing_date,
            &prefill.active_loans,
            &inputs.external_loans,
            &self.rules,
        );

        let flags = flags::build_flags(
            loan,
            &inputs,
            ltv,
            ltc,
            &coverage,
            &self.rules,
            now.date_naive(),
        );

        let (decision, reasons, conditions) =
            policy::decide(&inputs, ltv, &coverage, &flags, &self.rules);

        DecisionSummary {
            loan_id: loan.id.clone(),
            ltv,
            ltc,
            liquidity: coverage,
            flags,
            decision,
            reasons,
            conditions,
        }
    }
}

/// Never divides by zero or a missing value.
fn ratio(amount: f64, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(value) if value > 0.0 => Some(amount / value),
        _ => None,
    }
}

fn cost_basis(loan: &LoanApplication) -> Option<f64> {
    let price = loan.purchase.purchase_price?;
    let rehab = loan.purchase.rehab_budget.unwrap_or(0.0);
    Some(price + rehab)
}

fn resolve_inputs(loan: &LoanApplication, prefill: &PrefillSnapshot) -> DecisionInputs {
    let credit_score = loan
        .declared_credit_score()
        .or_else(|| prefill.credit_score.value().copied());
    let liquidity_amount = loan
        .declared_liquidity()
        .or_else(|| prefill.liquidity_amount.value().copied());

    let liquidity_documents = loan
        .conditions
        .as_ref()
        .map(|form| form.liquidity_documents.clone())
        .filter(|docs| !docs.is_empty())
        .or_else(|| prefill.liquidity_documents.value().cloned())
        .unwrap_or_default();

    let mut llc_documents = loan.llc_documents.clone();
    if let Some(form) = &loan.conditions {
        llc_documents.extend(form.llc_documents.iter().cloned());
    }
    if llc_documents.is_empty() {
        if let Some(reused) = prefill.llc_documents.value() {
            llc_documents = reused.clone();
        }
    }

    let other_mortgage_loan_count = loan
        .conditions
        .as_ref()
        .map(|form| form.other_mortgage_loan_count);

    let mut external_loans = loan
        .intake
        .form_data
        .as_ref()
        .map(|form| form.external_loans.clone())
        .unwrap_or_default();
    if external_loans.is_empty() {
        // The conditions form only captures an aggregate figure; treat it as
        // one declared-total exposure.
        if let Some(total) = loan
            .conditions
            .as_ref()
            .map(|form| form.other_mortgage_total)
            .filter(|total| *total > 0.0)
        {
            external_loans.push(ExternalLoanDeclaration {
                lender_name: "declared mortgage exposure".to_string(),
                total_amount: Some(total),
                monthly_interest: None,
            });
        }
    }

    DecisionInputs {
        credit_score,
        liquidity_amount,
        liquidity_documents,
        llc_documents,
        other_mortgage_loan_count,
        external_loans,
        intake_submitted: loan.intake.status == IntakeStatus::Submitted,
    }
}
