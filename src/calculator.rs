//! Projected cashback for a prospective amount under a rule's cap state.

use serde::Serialize;

use crate::ledger::CapState;
use crate::models::{Limit, Rule};

/// Which ceiling cut the raw cashback down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapKind {
    Transaction,
    Category,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub raw: f64,
    pub cashback: f64,
    pub binding: Option<CapKind>,
}

/// The per-transaction ceiling for `amount`, switching to the secondary cap
/// once the amount reaches its threshold.
pub fn transaction_cap(rule: &Rule, amount: f64) -> Limit {
    match rule.secondary_transaction {
        Some(secondary) if secondary.min_amount > 0.0 && amount >= secondary.min_amount => secondary.cap,
        _ => rule.cap_per_transaction,
    }
}

pub fn project_detail(amount: f64, rule: &Rule, state: &CapState) -> Projection {
    let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
    let raw = amount * state.effective_rate;

    let ceilings = [
        (CapKind::Transaction, transaction_cap(rule, amount)),
        (CapKind::Category, state.remaining_category_cap),
        (CapKind::Monthly, state.card.remaining_monthly_cap),
    ];

    let mut cashback = raw;
    let mut binding = None;
    for (kind, limit) in ceilings {
        let clamped = limit.clamp(cashback);
        if clamped < cashback {
            cashback = clamped;
            binding = Some(kind);
        }
    }

    Projection {
        raw,
        cashback: cashback.max(0.0),
        binding,
    }
}

/// Cashback `amount` would earn: raw rate, then each cap as an independent ceiling.
pub fn project(amount: f64, rule: &Rule, state: &CapState) -> f64 {
    project_detail(amount, rule, state).cashback
}
