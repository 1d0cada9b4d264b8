//! Six-month liquidity-coverage model.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::super::domain::ExternalLoanDeclaration;
use super::super::prefill::ActiveLoanExposure;
use super::config::UnderwritingRules;

/// Itemized cash-reserve requirement against months of combined exposure
/// plus fixed closing costs. Every term is a deterministic function of its
/// inputs; `required` is the sum in the order the fields are declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityCoverage {
    pub modeled_interest: f64,
    pub service_fee: f64,
    pub document_prep_fee: f64,
    pub closing_cost_estimate: f64,
    pub with_us_exposure: f64,
    pub external_exposure: f64,
    pub origination_fee: f64,
    pub prepaid_interest: f64,
    pub required: f64,
    pub available: f64,
    pub remaining: f64,
    pub coverage_ratio: Option<f64>,
    pub is_enough: bool,
}

/// UTC day count from the target closing date to the first day of the
/// following calendar month.
pub fn days_until_next_month(closing: NaiveDate) -> i64 {
    let (year, month) = if closing.month() == 12 {
        (closing.year() + 1, 1)
    } else {
        (closing.year(), closing.month() + 1)
    };
    let first_of_next =
        NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is always valid");
    (first_of_next - closing).num_days()
}

/// Six-month exposure on loans with outside lenders. Precedence is fixed:
/// declared total amount, then declared monthly interest, then a heuristic
/// estimate scaled by the configured factor.
pub(crate) fn external_exposure(
    declarations: &[ExternalLoanDeclaration],
    loan_amount: f64,
    rules: &UnderwritingRules,
) -> f64 {
    declarations
        .iter()
        .map(|declaration| {
            let monthly = if let Some(total) = declaration.total_amount.filter(|t| *t > 0.0) {
                total * rules.assumed_annual_interest_rate / 12.0
            } else if let Some(monthly) = declaration.monthly_interest.filter(|m| *m > 0.0) {
                monthly
            } else {
                loan_amount * rules.external_exposure_factor * rules.assumed_annual_interest_rate
                    / 12.0
            };
            monthly * rules.liquidity_months
        })
        .sum()
}

pub fn liquidity_coverage(
    loan_amount: f64,
    available_liquidity: f64,
    target_closing: Option<NaiveDate>,
    with_us_loans: &[ActiveLoanExposure],
    external_loans: &[ExternalLoanDeclaration],
    rules: &UnderwritingRules,
) -> LiquidityCoverage {
    let modeled_interest =
        loan_amount * rules.assumed_annual_interest_rate / 12.0 * rules.liquidity_months;

    let with_us_exposure: f64 = with_us_loans
        .iter()
        .map(|exposure| exposure.monthly_payment * rules.liquidity_months)
        .sum();

    let external = external_exposure(external_loans, loan_amount, rules);

    let origination_fee = loan_amount / 100.0 * rules.origination_fee_percent;

    let prepaid_interest = match target_closing {
        Some(closing) => {
            let per_diem = loan_amount * rules.prepaid_interest_rate
                / rules.prepaid_interest_day_basis;
            per_diem * days_until_next_month(closing) as f64
        }
        None => 0.0,
    };

    let required = modeled_interest
        + rules.service_fee
        + rules.document_prep_fee
        + rules.closing_cost_estimate
        + with_us_exposure
        + external
        + origination_fee
        + prepaid_interest;

    let remaining = available_liquidity - required;
    let coverage_ratio = if required > 0.0 {
        Some(available_liquidity / required)
    } else {
        None
    };

    LiquidityCoverage {
        modeled_interest,
        service_fee: rules.service_fee,
        document_prep_fee: rules.document_prep_fee,
        closing_cost_estimate: rules.closing_cost_estimate,
        with_us_exposure,
        external_exposure: external,
        origination_fee,
        prepaid_interest,
        required,
        available: available_liquidity,
        remaining,
        coverage_ratio,
        is_enough: remaining >= 0.0,
    }
}
