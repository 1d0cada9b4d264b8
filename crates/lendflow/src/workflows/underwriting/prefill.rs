//! Underwriting prefill resolver.
//!
//! Works out, once per request, which attestations from a borrower's prior
//! applications may satisfy the current loan's conditions. Every category is
//! reported as an explicit `Reuse` value so downstream code never re-derives
//! "on file" booleans ad hoc.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    LiquidityDocument, LlcDocument, LoanApplication, LoanId, PastProject, ReferralContact,
    WorkflowStage,
};
use super::identity::{
    document_fresh, fuzzy_match, normalize_email, normalize_name, validate_ownership,
    FRESHNESS_WINDOW_DAYS,
};

/// Reusability of one data category from a prior application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reuse<T> {
    /// Usable as-is; `on_file` is when the value was attested.
    Fresh { value: T, on_file: DateTime<Utc> },
    /// Exists on file but has aged out of the reuse window.
    Stale,
    /// Never collected for this borrower.
    Absent,
}

impl<T> Reuse<T> {
    pub fn can_reuse(&self) -> bool {
        matches!(self, Reuse::Fresh { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Reuse::Fresh { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// An active loan "with us" and its monthly carrying cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLoanExposure {
    pub loan_id: LoanId,
    pub monthly_payment: f64,
    /// True when no payment was declared and the amount is an estimate at
    /// the assumed annual rate.
    pub estimated: bool,
}

/// Resolved prefill state for one loan, computed once and passed down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefillSnapshot {
    pub source: Option<LoanId>,
    pub source_created_at: Option<DateTime<Utc>>,
    pub credit_score: Reuse<u16>,
    pub liquidity_amount: Reuse<f64>,
    pub liquidity_documents: Reuse<Vec<LiquidityDocument>>,
    pub llc_documents: Reuse<Vec<LlcDocument>>,
    pub referral: Reuse<ReferralContact>,
    pub past_projects: Reuse<Vec<PastProject>>,
    pub active_loans: Vec<ActiveLoanExposure>,
    pub llc_names: Vec<String>,
}

impl PrefillSnapshot {
    pub fn empty() -> Self {
        Self {
            source: None,
            source_created_at: None,
            credit_score: Reuse::Absent,
            liquidity_amount: Reuse::Absent,
            liquidity_documents: Reuse::Absent,
            llc_documents: Reuse::Absent,
            referral: Reuse::Absent,
            past_projects: Reuse::Absent,
            active_loans: Vec::new(),
            llc_names: Vec::new(),
        }
    }
}

/// Resolve reuse across the borrower's application history.
///
/// `applications` is the full set for the borrower (the current loan may be
/// included; it is ignored as a prior). `assumed_annual_rate` feeds the
/// payment estimate for active loans with no declared payment.
pub fn resolve(
    loan: &LoanApplication,
    applications: &[LoanApplication],
    assumed_annual_rate: f64,
    now: DateTime<Utc>,
) -> PrefillSnapshot {
    let email = normalize_email(&loan.borrower.email);
    let mut others: Vec<&LoanApplication> = applications
        .iter()
        .filter(|other| other.id != loan.id && normalize_email(&other.borrower.email) == email)
        .collect();
    others.sort_by_key(|other| other.created_at);

    let mut snapshot = PrefillSnapshot::empty();
    snapshot.active_loans = active_loan_exposures(&others, assumed_annual_rate);
    snapshot.llc_names = resolve_llc_names(loan, &others);

    let Some(prior) = others.last().copied() else {
        return snapshot;
    };
    snapshot.source = Some(prior.id.clone());
    snapshot.source_created_at = Some(prior.created_at);

    let within_window = now - prior.created_at <= Duration::days(FRESHNESS_WINDOW_DAYS);

    snapshot.credit_score = windowed(prior.declared_credit_score(), prior, within_window);
    snapshot.liquidity_amount = windowed(prior.declared_liquidity(), prior, within_window);

    // Liquidity *documents* are judged against today, not against the prior
    // application, and must still pass ownership validation for the current
    // borrower and LLC.
    snapshot.liquidity_documents = resolve_liquidity_documents(loan, prior, now);

    // Entity and identity data is durable; no freshness requirement.
    if let Some(conditions) = &prior.conditions {
        let llc_docs: Vec<LlcDocument> = conditions
            .llc_documents
            .iter()
            .chain(prior.llc_documents.iter())
            .cloned()
            .collect();
        if !llc_docs.is_empty() {
            snapshot.llc_documents = Reuse::Fresh {
                value: llc_docs,
                on_file: prior.created_at,
            };
        }
        snapshot.referral = Reuse::Fresh {
            value: conditions.referral.clone(),
            on_file: conditions.submitted_at,
        };
        if !conditions.past_projects.is_empty() {
            snapshot.past_projects = Reuse::Fresh {
                value: conditions.past_projects.clone(),
                on_file: conditions.submitted_at,
            };
        }
    } else if !prior.llc_documents.is_empty() {
        snapshot.llc_documents = Reuse::Fresh {
            value: prior.llc_documents.clone(),
            on_file: prior.created_at,
        };
    }

    snapshot
}

fn windowed<T>(value: Option<T>, prior: &LoanApplication, within_window: bool) -> Reuse<T> {
    match value {
        Some(value) if within_window => Reuse::Fresh {
            value,
            on_file: prior.created_at,
        },
        Some(_) => Reuse::Stale,
        None => Reuse::Absent,
    }
}

fn resolve_liquidity_documents(
    loan: &LoanApplication,
    prior: &LoanApplication,
    now: DateTime<Utc>,
) -> Reuse<Vec<LiquidityDocument>> {
    let Some(conditions) = &prior.conditions else {
        return Reuse::Absent;
    };
    if conditions.liquidity_documents.is_empty() {
        return Reuse::Absent;
    }

    let reusable: Vec<LiquidityDocument> = conditions
        .liquidity_documents
        .iter()
        .filter(|doc| document_fresh(doc, now))
        .filter(|doc| {
            validate_ownership(doc, &loan.borrower, loan.llc_name.as_deref()).is_empty()
        })
        .cloned()
        .collect();

    if reusable.is_empty() {
        return Reuse::Stale;
    }
    let on_file = reusable
        .iter()
        .map(|doc| doc.uploaded_at)
        .max()
        .unwrap_or(prior.created_at);
    Reuse::Fresh {
        value: reusable,
        on_file,
    }
}

fn active_loan_exposures(
    others: &[&LoanApplication],
    assumed_annual_rate: f64,
) -> Vec<ActiveLoanExposure> {
    others
        .iter()
        .filter(|other| other.current_stage.index() >= WorkflowStage::Funding.index())
        .map(|other| {
            let declared = other
                .intake
                .form_data
                .as_ref()
                .and_then(|form| form.declared_monthly_payment)
                .filter(|payment| *payment > 0.0);
            match declared {
                Some(payment) => ActiveLoanExposure {
                    loan_id: other.id.clone(),
                    monthly_payment: payment,
                    estimated: false,
                },
                None => ActiveLoanExposure {
                    loan_id: other.id.clone(),
                    monthly_payment: other.amount * assumed_annual_rate / 12.0,
                    estimated: true,
                },
            }
        })
        .collect()
}

/// De-duplicated LLC names the borrower has ever used, with the entry
/// matching the current application's declared name listed first.
fn resolve_llc_names(loan: &LoanApplication, others: &[&LoanApplication]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    let candidates = loan
        .llc_name
        .iter()
        .chain(others.iter().rev().filter_map(|other| other.llc_name.as_ref()));
    for name in candidates {
        let key = normalize_name(name);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        names.push(name.clone());
    }

    if let Some(declared) = &loan.llc_name {
        if let Some(position) = names.iter().position(|name| fuzzy_match(name, declared)) {
            let preferred = names.remove(position);
            names.insert(0, preferred);
        }
    }

    names
}
