//! Ordering of competing (card, rule) candidates.
//!
//! [`rank`] orders candidates for one purchase. [`best_per_category`] groups
//! every pair by category label and keeps the strongest card per label, used
//! for proactive suggestions.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::calculator::CapKind;
use crate::ledger::Tier;
use crate::matcher::MatchKind;
use crate::models::Limit;

/// One (card, rule) pair evaluated against a purchase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub rank: usize,
    pub card_id: String,
    pub card_name: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_active: bool,
    pub match_kind: MatchKind,
    /// Tier-resolved rate
    pub rate: f64,
    pub tier: Tier,
    pub projected_cashback: Option<f64>,
    pub binding_cap: Option<CapKind>,
    pub remaining_category_cap: Limit,
    pub remaining_monthly_cap: Limit,
    pub is_category_cap_reached: bool,
    pub is_monthly_cap_reached: bool,
    pub min_spend_met: bool,
    /// Another rule on the same card also matched this query
    pub overlapping: bool,
}

impl RankedCandidate {
    pub fn is_capped(&self) -> bool {
        self.is_category_cap_reached || self.is_monthly_cap_reached
    }
}

/// `true` sorts first.
fn prefer(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

/// Active rule, then uncapped, then min spend met, then payout (with an
/// amount), then rate.
pub fn compare(a: &RankedCandidate, b: &RankedCandidate, with_amount: bool) -> Ordering {
    prefer(a.rule_active, b.rule_active)
        .then_with(|| prefer(!a.is_capped(), !b.is_capped()))
        .then_with(|| prefer(a.min_spend_met, b.min_spend_met))
        .then_with(|| {
            if with_amount {
                let pa = a.projected_cashback.unwrap_or(0.0);
                let pb = b.projected_cashback.unwrap_or(0.0);
                pb.total_cmp(&pa)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| b.rate.total_cmp(&a.rate))
}

/// Sorts in place and numbers the result from 1. Ties keep input order.
pub fn rank(mut candidates: Vec<RankedCandidate>, with_amount: bool) -> Vec<RankedCandidate> {
    candidates.sort_by(|a, b| compare(a, b, with_amount));
    for (i, c) in candidates.iter_mut().enumerate() {
        c.rank = i + 1;
    }
    candidates
}

/// A (card, rule) pair competing under one category label.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionCandidate {
    pub label: String,
    pub card_id: String,
    pub card_name: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rate: f64,
    pub tier1_rate: f64,
    pub tier2_rate: Option<f64>,
    /// Floored at zero
    pub remaining_category_cap: Limit,
    pub spending_needed: Limit,
    pub eligible: bool,
    pub min_spend_met: bool,
    pub is_boosted: bool,
    pub has_tier2: bool,
    pub tier2_min_spend: f64,
    pub current_spend: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(flatten)]
    pub choice: SuggestionCandidate,
    /// An ineligible card in the group beats the choice on rate or headroom
    pub has_better_challenger: bool,
}

fn rank_within_group(a: &SuggestionCandidate, b: &SuggestionCandidate) -> Ordering {
    b.rate
        .total_cmp(&a.rate)
        .then_with(|| b.remaining_category_cap.total_cmp(&a.remaining_category_cap))
}

fn pick(group: Vec<SuggestionCandidate>) -> Option<Suggestion> {
    let (mut eligible, mut ineligible): (Vec<_>, Vec<_>) = group.into_iter().partition(|c| c.eligible);
    eligible.sort_by(rank_within_group);
    ineligible.sort_by(rank_within_group);

    let best_ineligible = ineligible.into_iter().next();
    match eligible.into_iter().next() {
        Some(choice) => {
            let has_better_challenger = best_ineligible
                .as_ref()
                .is_some_and(|challenger| rank_within_group(challenger, &choice) == Ordering::Less);
            Some(Suggestion {
                choice,
                has_better_challenger,
            })
        }
        None => best_ineligible.map(|choice| Suggestion {
            choice,
            has_better_challenger: false,
        }),
    }
}

/// Best pick per label: eligible candidates win, an ineligible one only when
/// the group has nothing else. Groups are ordered eligible first, then by
/// rate and remaining headroom.
pub fn best_per_category(candidates: Vec<SuggestionCandidate>) -> Vec<Suggestion> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<SuggestionCandidate>> = HashMap::new();
    for candidate in candidates {
        if !groups.contains_key(&candidate.label) {
            order.push(candidate.label.clone());
        }
        groups.entry(candidate.label.clone()).or_default().push(candidate);
    }

    let mut suggestions: Vec<Suggestion> = order
        .into_iter()
        .filter_map(|label| groups.remove(&label))
        .filter_map(pick)
        .collect();

    suggestions.sort_by(|a, b| {
        prefer(a.choice.eligible, b.choice.eligible).then_with(|| rank_within_group(&a.choice, &b.choice))
    });
    suggestions
}
