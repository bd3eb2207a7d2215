//! Cap bookkeeping for one card in one cycle: which tier applies, how much
//! monthly and category headroom is left, and whether the minimum spend is met.

use serde::Serialize;

use crate::cycle::CycleKey;
use crate::models::{Card, CategorySummary, Limit, MonthlySummary, Rule};

/// Resolved once per card and cycle, then threaded into every downstream figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Tier1,
    Tier2,
}

/// Tier 2 unlocks on two-tier cards once cycle spend reaches the threshold.
pub fn resolve_tier(card: &Card, spend: f64) -> Tier {
    match card.tier2_min_spend {
        Some(min) if card.is_two_tier() && min > 0.0 && spend >= min => Tier::Tier2,
        _ => Tier::Tier1,
    }
}

/// Card-wide cap state for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCapState {
    pub cycle: CycleKey,
    pub tier: Tier,
    pub spend: f64,
    pub cashback: f64,
    pub effective_monthly_limit: Limit,
    pub remaining_monthly_cap: Limit,
    pub is_monthly_cap_reached: bool,
    pub min_spend_met: bool,
}

impl CardCapState {
    pub fn tier2_active(&self) -> bool {
        self.tier == Tier::Tier2
    }
}

/// Cap state of one rule on one card for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapState {
    #[serde(flatten)]
    pub card: CardCapState,
    pub effective_rate: f64,
    pub category_limit: Limit,
    pub category_cashback: f64,
    pub remaining_category_cap: Limit,
    pub is_category_cap_reached: bool,
}

impl CapState {
    pub fn is_capped(&self) -> bool {
        self.is_category_cap_reached || self.card.is_monthly_cap_reached
    }
}

/// Cycle override when set, else the tier's card limit.
pub fn effective_monthly_limit(card: &Card, tier: Tier, summary: Option<&MonthlySummary>) -> Limit {
    if let Some(value) = summary.and_then(|s| s.monthly_cashback_limit).filter(|v| *v > 0.0) {
        return Limit::Capped(value);
    }
    match tier {
        Tier::Tier2 => card.tier2_limit.unwrap_or(card.overall_monthly_limit),
        Tier::Tier1 => card.overall_monthly_limit,
    }
}

pub fn min_spend_met(card: &Card, spend: f64) -> bool {
    match card.minimum_monthly_spend {
        Some(min) if min > 0.0 => spend >= min,
        _ => true,
    }
}

/// A missing summary means the cycle has not started: zero spend, zero cashback.
pub fn card_cap_state(card: &Card, cycle: CycleKey, summary: Option<&MonthlySummary>) -> CardCapState {
    let spend = summary.map_or(0.0, |s| s.spend);
    let cashback = summary.map_or(0.0, |s| s.cashback);
    let tier = resolve_tier(card, spend);
    let limit = effective_monthly_limit(card, tier, summary);
    let remaining = limit.remaining_after(cashback);

    CardCapState {
        cycle,
        tier,
        spend,
        cashback,
        effective_monthly_limit: limit,
        remaining_monthly_cap: remaining,
        is_monthly_cap_reached: remaining.is_exhausted(),
        min_spend_met: min_spend_met(card, spend),
    }
}

/// A tier-2 rate of zero or less counts as unset.
pub fn effective_rate(rule: &Rule, tier: Tier) -> f64 {
    match tier {
        Tier::Tier2 => rule.tier2_rate.filter(|r| *r > 0.0).unwrap_or(rule.rate),
        Tier::Tier1 => rule.rate,
    }
}

/// Cycle override when set, else the tier's rule limit.
pub fn effective_category_limit(rule: &Rule, tier: Tier, summary: Option<&CategorySummary>) -> Limit {
    if let Some(value) = summary.and_then(|s| s.category_limit).filter(|v| *v > 0.0) {
        return Limit::Capped(value);
    }
    match tier {
        Tier::Tier2 => rule.tier2_category_limit.unwrap_or(rule.category_limit),
        Tier::Tier1 => rule.category_limit,
    }
}

pub fn cap_state(rule: &Rule, card_state: CardCapState, summary: Option<&CategorySummary>) -> CapState {
    let category_cashback = summary.map_or(0.0, |s| s.cashback);
    let limit = effective_category_limit(rule, card_state.tier, summary);
    let remaining = limit.remaining_after(category_cashback);

    CapState {
        card: card_state,
        effective_rate: effective_rate(rule, card_state.tier),
        category_limit: limit,
        category_cashback,
        remaining_category_cap: remaining,
        is_category_cap_reached: remaining.is_exhausted(),
    }
}

/// `part / whole` as a whole percentage, capped at 100.
pub fn percent_of(part: f64, whole: f64) -> u32 {
    if whole <= 0.0 {
        return 0;
    }
    ((part / whole) * 100.0).round().clamp(0.0, 100.0) as u32
}
