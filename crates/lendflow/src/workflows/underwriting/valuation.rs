//! Valuation input trail.
//!
//! Every externally or manually supplied valuation lands as an immutable,
//! newest-first audit entry; the current valuation view is always the base
//! purchase record merged with the latest entry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    LoanApplication, ValuationFields, ValuationSource, ValuationTrailEntry, WorkflowError,
    WorkflowStage,
};

fn editable(stage: WorkflowStage) -> bool {
    matches!(
        stage,
        WorkflowStage::UnderwritingReview | WorkflowStage::Approved
    )
}

/// Append a valuation snapshot. Allowed only while the loan is in an
/// underwriting state; everything else is a conflict.
pub fn record(
    loan: &mut LoanApplication,
    source: ValuationSource,
    fields: ValuationFields,
    now: DateTime<Utc>,
) -> Result<ValuationTrailEntry, WorkflowError> {
    if !editable(loan.current_stage) {
        return Err(WorkflowError::Conflict(format!(
            "valuation inputs are read-only while the loan is in {}",
            loan.current_stage.label()
        )));
    }

    let entry = ValuationTrailEntry {
        id: format!("vt-{:04}", loan.valuation_trail.len() + 1),
        updated_at: now,
        updated_by: source,
        fields,
    };
    loan.valuation_trail.insert(0, entry.clone());
    Ok(entry)
}

/// Base purchase details overlaid with the latest trail entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationView {
    pub property_address: Option<String>,
    pub purchase_price: Option<f64>,
    pub rehab_budget: Option<f64>,
    pub after_repair_value: Option<f64>,
    pub market_value: Option<f64>,
    pub monthly_rent: Option<f64>,
    pub annual_taxes: Option<f64>,
    pub annual_insurance: Option<f64>,
    pub last_updated_by: Option<ValuationSource>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

pub fn current_view(loan: &LoanApplication) -> ValuationView {
    let latest = loan.valuation_trail.first();
    let fields = latest.map(|entry| &entry.fields);

    ValuationView {
        property_address: loan.purchase.property_address.clone(),
        purchase_price: loan.purchase.purchase_price,
        rehab_budget: loan.purchase.rehab_budget,
        after_repair_value: fields
            .and_then(|f| f.after_repair_value)
            .or(loan.purchase.after_repair_value),
        market_value: fields.and_then(|f| f.market_value),
        monthly_rent: fields.and_then(|f| f.monthly_rent),
        annual_taxes: fields.and_then(|f| f.annual_taxes),
        annual_insurance: fields.and_then(|f| f.annual_insurance),
        last_updated_by: latest.map(|entry| entry.updated_by),
        last_updated_at: latest.map(|entry| entry.updated_at),
    }
}
