//! Quick-decision adjudication over the derived metrics and flag list.

use serde::{Deserialize, Serialize};

use super::config::UnderwritingRules;
use super::flags::{FlagSeverity, RiskFlag};
use super::liquidity::LiquidityCoverage;
use super::DecisionInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickDecision {
    Approve,
    Conditional,
    Decline,
}

impl QuickDecision {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Conditional => "Conditional",
            Self::Decline => "Decline",
        }
    }
}

pub(crate) fn decide(
    inputs: &DecisionInputs,
    ltv: Option<f64>,
    coverage: &LiquidityCoverage,
    flags: &[RiskFlag],
    rules: &UnderwritingRules,
) -> (QuickDecision, Vec<String>, Vec<String>) {
    let mut reasons = Vec::new();

    match inputs.credit_score {
        Some(score) if score < rules.hard_decline_credit_score => reasons.push(format!(
            "credit score {score} is below the hard-decline floor of {}",
            rules.hard_decline_credit_score
        )),
        Some(score) if score < rules.min_credit_score => reasons.push(format!(
            "credit score {score} is below the {} minimum",
            rules.min_credit_score
        )),
        Some(score) => reasons.push(format!("credit score {score} meets policy")),
        None => reasons.push("credit score has not been collected".to_string()),
    }

    match ltv {
        Some(value) if value > rules.hard_decline_ltv => reasons.push(format!(
            "LTV {:.1}% is beyond the hard-decline ceiling of {:.1}%",
            value * 100.0,
            rules.hard_decline_ltv * 100.0
        )),
        Some(value) if value > rules.max_ltv => reasons.push(format!(
            "LTV {:.1}% exceeds the {:.1}% policy maximum",
            value * 100.0,
            rules.max_ltv * 100.0
        )),
        Some(value) => reasons.push(format!("LTV {:.1}% is within policy", value * 100.0)),
        None => reasons.push("LTV cannot be computed yet".to_string()),
    }

    if coverage.is_enough {
        reasons.push(format!(
            "liquidity covers the {:.2} reserve requirement",
            coverage.required
        ));
    } else {
        reasons.push(format!(
            "liquidity falls {:.2} short of the reserve requirement",
            -coverage.remaining
        ));
    }
    reasons.truncate(3);

    let mut conditions: Vec<String> = Vec::new();
    for flag in flags {
        if !conditions.contains(&flag.label) {
            conditions.push(flag.label.clone());
        }
    }

    let hard_credit = inputs
        .credit_score
        .map(|score| score < rules.hard_decline_credit_score)
        .unwrap_or(false);
    let hard_ltv = ltv.map(|value| value > rules.hard_decline_ltv).unwrap_or(false);
    let high_flags = flags
        .iter()
        .filter(|flag| flag.severity == FlagSeverity::High)
        .count();

    let decision = if hard_credit || hard_ltv || high_flags >= 2 {
        QuickDecision::Decline
    } else if !flags.is_empty() {
        QuickDecision::Conditional
    } else {
        QuickDecision::Approve
    };

    (decision, reasons, conditions)
}
