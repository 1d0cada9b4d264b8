use serde::{Deserialize, Serialize};

/// Policy dials for the risk and decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingRules {
    pub max_ltv: f64,
    pub max_ltc: f64,
    pub min_credit_score: u16,
    pub min_liquidity_to_loan_ratio: f64,
    pub max_other_mortgage_loans: u32,
    /// Months of carrying cost the borrower must cover.
    pub liquidity_months: f64,
    pub assumed_annual_interest_rate: f64,
    pub service_fee: f64,
    pub document_prep_fee: f64,
    pub closing_cost_estimate: f64,
    /// Percent of amount/100, e.g. 5.0 for five points.
    pub origination_fee_percent: f64,
    pub prepaid_interest_rate: f64,
    pub prepaid_interest_day_basis: f64,
    /// Scales the loan amount into an assumed external principal when a
    /// borrower declares an outside lender but no figures.
    pub external_exposure_factor: f64,
    pub short_closing_timeline_days: i64,
    pub hard_decline_credit_score: u16,
    pub hard_decline_ltv: f64,
}

impl Default for UnderwritingRules {
    fn default() -> Self {
        Self {
            max_ltv: 0.70,
            max_ltc: 0.85,
            min_credit_score: 660,
            min_liquidity_to_loan_ratio: 0.10,
            max_other_mortgage_loans: 5,
            liquidity_months: 6.0,
            assumed_annual_interest_rate: 0.12,
            service_fee: 950.0,
            document_prep_fee: 250.0,
            closing_cost_estimate: 6_000.0,
            origination_fee_percent: 5.0,
            prepaid_interest_rate: 0.13,
            prepaid_interest_day_basis: 360.0,
            external_exposure_factor: 0.5,
            short_closing_timeline_days: 14,
            hard_decline_credit_score: 580,
            hard_decline_ltv: 0.85,
        }
    }
}
