//! Risk-flag derivation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::{LlcDocumentKind, LoanApplication};
use super::super::identity::validate_liquidity_documents;
use super::config::UnderwritingRules;
use super::liquidity::LiquidityCoverage;
use super::DecisionInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    /// A policy breach that stands until the underlying number changes.
    Issue,
    /// Something not yet provided; clears once the borrower submits it.
    Pending,
}

/// One weighted risk observation, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub id: String,
    pub label: String,
    pub detail: String,
    pub severity: FlagSeverity,
    pub state: FlagState,
}

fn flag(
    id: &'static str,
    label: impl Into<String>,
    detail: impl Into<String>,
    severity: FlagSeverity,
    state: FlagState,
) -> RiskFlag {
    RiskFlag {
        id: id.to_string(),
        label: label.into(),
        detail: detail.into(),
        severity,
        state,
    }
}

pub(crate) fn build_flags(
    loan: &LoanApplication,
    inputs: &DecisionInputs,
    ltv: Option<f64>,
    ltc: Option<f64>,
    coverage: &LiquidityCoverage,
    rules: &UnderwritingRules,
    today: NaiveDate,
) -> Vec<RiskFlag> {
    let mut flags = Vec::new();

    purchase_document_flags(loan, &mut flags);

    if !inputs.intake_submitted {
        flags.push(flag(
            "intake-missing",
            "continuation intake not submitted",
            "the borrower has not completed the underwriting continuation form",
            FlagSeverity::Medium,
            FlagState::Pending,
        ));
    }

    liquidity_document_flags(loan, inputs, &mut flags);
    llc_document_flags(loan, inputs, &mut flags);

    match ltv {
        Some(value) if value > rules.max_ltv => flags.push(flag(
            "ltv-exceeded",
            "LTV above policy maximum",
            format!("LTV {:.1}% exceeds the {:.1}% maximum", value * 100.0, rules.max_ltv * 100.0),
            FlagSeverity::High,
            FlagState::Issue,
        )),
        None => flags.push(flag(
            "ltv-unknown",
            "LTV cannot be computed",
            "after-repair value is missing",
            FlagSeverity::Medium,
            FlagState::Pending,
        )),
        _ => {}
    }

    match ltc {
        Some(value) if value > rules.max_ltc => flags.push(flag(
            "ltc-exceeded",
            "LTC above policy maximum",
            format!("LTC {:.1}% exceeds the {:.1}% maximum", value * 100.0, rules.max_ltc * 100.0),
            FlagSeverity::High,
            FlagState::Issue,
        )),
        None => flags.push(flag(
            "ltc-unknown",
            "LTC cannot be computed",
            "purchase price or rehab budget is missing",
            FlagSeverity::Medium,
            FlagState::Pending,
        )),
        _ => {}
    }

    match inputs.credit_score {
        Some(score) if score < rules.min_credit_score => flags.push(flag(
            "credit-below-minimum",
            "credit score below minimum",
            format!("score {score} is below the required {}", rules.min_credit_score),
            FlagSeverity::High,
            FlagState::Issue,
        )),
        None => flags.push(flag(
            "credit-missing",
            "credit score not on file",
            "no credit score has been collected for this application",
            FlagSeverity::Medium,
            FlagState::Pending,
        )),
        _ => {}
    }

    if let Some(liquidity) = inputs.liquidity_amount {
        let ratio = liquidity / loan.amount;
        if ratio < rules.min_liquidity_to_loan_ratio {
            flags.push(flag(
                "liquidity-ratio-low",
                "liquidity-to-loan ratio below minimum",
                format!(
                    "liquidity covers {:.1}% of the loan; policy requires {:.1}%",
                    ratio * 100.0,
                    rules.min_liquidity_to_loan_ratio * 100.0
                ),
                FlagSeverity::Medium,
                FlagState::Issue,
            ));
        }
    }

    if let Some(count) = inputs.other_mortgage_loan_count {
        if count > rules.max_other_mortgage_loans {
            flags.push(flag(
                "other-mortgages-exceeded",
                "too many other mortgage loans",
                format!(
                    "{count} open mortgage loans exceeds the {} allowed",
                    rules.max_other_mortgage_loans
                ),
                FlagSeverity::Medium,
                FlagState::Issue,
            ));
        }
    }

    if !coverage.is_enough {
        flags.push(flag(
            "liquidity-coverage-short",
            "liquidity coverage shortfall",
            format!(
                "required reserves {:.2} exceed available liquidity {:.2}",
                coverage.required, coverage.available
            ),
            FlagSeverity::High,
            FlagState::Issue,
        ));
    }

    closing_timeline_flag(loan, rules, today, &mut flags);

    flags
}

fn purchase_document_flags(loan: &LoanApplication, flags: &mut Vec<RiskFlag>) {
    if loan.purchase.comparable_sales.is_empty() {
        flags.push(flag(
            "comps-missing",
            "comparable sales missing",
            "no comparable sales were provided to support the valuation",
            FlagSeverity::Medium,
            FlagState::Pending,
        ));
    }
    if loan.purchase.property_photos.is_empty() {
        flags.push(flag(
            "photos-missing",
            "property photos missing",
            "no photos of the subject property were provided",
            FlagSeverity::Low,
            FlagState::Pending,
        ));
    }
    if loan.loan_type.requires_purchase_contract() && loan.purchase.purchase_contract.is_empty() {
        flags.push(flag(
            "contract-missing",
            "purchase contract missing",
            format!(
                "a {} loan requires the executed purchase contract",
                loan.loan_type.label()
            ),
            FlagSeverity::Medium,
            FlagState::Pending,
        ));
    }
    if loan.loan_type.requires_scope_of_work() && loan.purchase.scope_of_work.is_empty() {
        flags.push(flag(
            "scope-missing",
            "scope of work missing",
            format!(
                "a {} loan requires a rehab scope of work",
                loan.loan_type.label()
            ),
            FlagSeverity::Medium,
            FlagState::Pending,
        ));
    }
}

fn liquidity_document_flags(
    loan: &LoanApplication,
    inputs: &DecisionInputs,
    flags: &mut Vec<RiskFlag>,
) {
    if inputs.liquidity_documents.is_empty() {
        flags.push(flag(
            "liquidity-docs-missing",
            "liquidity documents missing",
            "no usable proof-of-funds documents are on file",
            FlagSeverity::High,
            FlagState::Pending,
        ));
        return;
    }

    let violations = validate_liquidity_documents(
        &inputs.liquidity_documents,
        &loan.borrower,
        loan.llc_name.as_deref(),
    );
    if !violations.is_empty() {
        flags.push(flag(
            "liquidity-docs-ownership",
            "liquidity document ownership unresolved",
            violations.join("; "),
            FlagSeverity::High,
            FlagState::Issue,
        ));
    }
}

fn llc_document_flags(
    loan: &LoanApplication,
    inputs: &DecisionInputs,
    flags: &mut Vec<RiskFlag>,
) {
    if loan.llc_name.is_none() {
        return;
    }
    let missing: Vec<&'static str> = LlcDocumentKind::all()
        .into_iter()
        .filter(|kind| !inputs.llc_documents.iter().any(|doc| doc.kind == *kind))
        .map(|kind| kind.label())
        .collect();
    if !missing.is_empty() {
        flags.push(flag(
            "llc-docs-missing",
            "LLC documents incomplete",
            format!("missing: {}", missing.join(", ")),
            FlagSeverity::Medium,
            FlagState::Pending,
        ));
    }
}


fn closing_timeline_flag(
    loan: &LoanApplication,
    rules: &UnderwritingRules,
    today: NaiveDate,
    flags: &mut Vec<RiskFlag>,
) {
    let Some(closing) = loan.purchase.target_closing_date else {
        return;
    };
    let days_left = (closing - today).num_days();
    if days_left < 0 {
        flags.push(flag(
            "closing-passed",
            "target closing date has passed",
            format!("target closing was {} day(s) ago", -days_left),
            FlagSeverity::Medium,
            FlagState::Issue,
        ));
    } else if days_left <= rules.short_closing_timeline_days {
        flags.push(flag(
            "closing-short",
            "short closing timeline",
            format!("only {days_left} day(s) until the target closing date"),
            FlagSeverity::Low,
            FlagState::Pending,
        ));
    }
}
