//! Deterministic HITL decision policy for the replay simulator, spec.md
//! §4.K step 2: "a deterministic policy (fixed seed derived from a
//! decision key)" standing in for the real system's human reviewers.
//!
//! `run_replay_simulation.py` delegates this to `ml.replay_hitl_policy`,
//! which was not part of the retrieved source; the decision rules below
//! are authored fresh from the spec's description, reusing the same
//! FNV-1a stable hash already established in `partition::content_hash`
//! and `shelfops_forecasting::arena`'s canary routing (never `rand`,
//! since replay output must be byte-identical across runs).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoAction {
    Approve,
    Edit,
    Reject,
}

impl PoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoAction::Approve => "approve",
            PoAction::Edit => "edit",
            PoAction::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoDecisionOutcome {
    pub action: PoAction,
    pub reason_code: String,
    pub final_quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionDecisionOutcome {
    pub action: PromotionDecision,
    pub reason_code: String,
}

fn stable_hash(input: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for byte in input.as_bytes() {
        h ^= *byte as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Reviews the highest-error rows of a replay day. Forecasts within
/// tolerance are auto-approved; large misses are edited to the observed
/// demand or rejected outright, with the hash bucket breaking ties in the
/// ambiguous middle band so the split stays fixed across runs instead of
/// always favoring one action.
pub fn decide_po_action(forecast_qty: f64, actual_qty: f64, suggested_qty: i64, decision_key: &str) -> PoDecisionOutcome {
    let relative_error = if actual_qty > 0.0 {
        (forecast_qty - actual_qty).abs() / actual_qty
    } else if forecast_qty > 0.0 {
        1.0
    } else {
        0.0
    };

    if relative_error <= 0.15 {
        return PoDecisionOutcome { action: PoAction::Approve, reason_code: "forecast_within_tolerance".to_string(), final_quantity: suggested_qty };
    }

    let bucket = stable_hash(decision_key) % 100;
    if relative_error <= 0.5 || bucket >= 50 {
        let final_quantity = actual_qty.round().max(1.0) as i64;
        PoDecisionOutcome { action: PoAction::Edit, reason_code: "adjusted_to_observed_demand".to_string(), final_quantity }
    } else {
        PoDecisionOutcome { action: PoAction::Reject, reason_code: "forecast_error_too_high".to_string(), final_quantity: 0 }
    }
}

/// Reviews a candidate version once it clears the non-regression gate.
/// A gate failure is always rejected; a pass still gets overridden for
/// versions carrying meaningful stockout risk, in the same fixed fraction
/// of cases a human reviewer's judgment call would catch.
pub fn decide_model_promotion(gate_passed: bool, candidate_mape_nonzero: f64, candidate_stockout_miss_rate: f64, decision_key: &str) -> PromotionDecisionOutcome {
    if !gate_passed {
        return PromotionDecisionOutcome { action: PromotionDecision::Reject, reason_code: "non_regression_gate_failed".to_string() };
    }

    let bucket = stable_hash(decision_key) % 100;
    if candidate_stockout_miss_rate > 0.05 && bucket < 10 {
        return PromotionDecisionOutcome { action: PromotionDecision::Reject, reason_code: "reviewer_stockout_concern".to_string() };
    }

    let reason_code = if candidate_mape_nonzero <= 10.0 { "gate_passed_strong" } else { "gate_passed" };
    PromotionDecisionOutcome { action: PromotionDecision::Approve, reason_code: reason_code.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accurate_forecast_is_approved() {
        let outcome = decide_po_action(100.0, 98.0, 100, "day::store::product");
        assert_eq!(outcome.action, PoAction::Approve);
    }

    #[test]
    fn same_decision_key_is_deterministic() {
        let first = decide_po_action(50.0, 200.0, 50, "2024-01-01::s1::p1");
        let second = decide_po_action(50.0, 200.0, 50, "2024-01-01::s1::p1");
        assert_eq!(first.action, second.action);
        assert_eq!(first.final_quantity, second.final_quantity);
    }

    #[test]
    fn gate_failure_always_rejects_regardless_of_key() {
        let outcome = decide_model_promotion(false, 5.0, 0.0, "model::replay_v1");
        assert_eq!(outcome.action, PromotionDecision::Reject);
        assert_eq!(outcome.reason_code, "non_regression_gate_failed");
    }

    #[test]
    fn zero_stockout_risk_never_triggers_reviewer_override() {
        for i in 0..50 {
            let outcome = decide_model_promotion(true, 15.0, 0.0, &format!("model::replay_v{i}"));
            assert_eq!(outcome.action, PromotionDecision::Approve);
        }
    }
}
