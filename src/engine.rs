//! Query entry points over a [`Snapshot`].
//!
//! Every call recomputes from the snapshot and the `as_of` date it is given;
//! nothing is cached between calls and the snapshot is never modified.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::calculator::project_detail;
use crate::config::EngineConfig;
use crate::cycle::{
    CycleKey, DaysRemaining, cashback_cycle_key, days_left_in_cycle, days_remaining, payment_due_date,
    statement_date,
};
use crate::error::{EngineError, Result};
use crate::ledger::{self, CapState, CardCapState, card_cap_state, percent_of};
use crate::matcher::{TargetMethod, matches, resolve_merchant};
use crate::models::{Card, CardStatus, Limit, PaymentMethod, Rule};
use crate::payout::{
    CashbackSplit, PayoutDate, PayoutSchedule, PayoutStatus, cashback_split, payout_date, payout_status,
};
use crate::ranking::{self, RankedCandidate, Suggestion, SuggestionCandidate};
use crate::snapshot::Snapshot;

/// A prospective purchase.
#[derive(Debug, Clone)]
pub struct Query {
    pub category_code: Option<String>,
    pub merchant: Option<String>,
    pub amount: Option<f64>,
    pub method: Option<PaymentMethod>,
    pub as_of: NaiveDate,
}

impl Query {
    pub fn for_code(code: &str, as_of: NaiveDate) -> Self {
        Self {
            category_code: Some(code.to_string()),
            merchant: None,
            amount: None,
            method: None,
            as_of,
        }
    }

    pub fn for_merchant(merchant: &str, as_of: NaiveDate) -> Self {
        Self {
            category_code: None,
            merchant: Some(merchant.to_string()),
            amount: None,
            method: None,
            as_of,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapProgress {
    /// Monthly cap reached
    Maximized,
    /// Minimum spend still outstanding
    NeedsMinSpend,
    InProgress,
    /// No activity in the cycle yet
    Idle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCap {
    pub rule_id: String,
    pub rule_name: String,
    pub rule_active: bool,
    pub rate: f64,
    pub category_limit: Limit,
    pub category_cashback: f64,
    pub remaining_category_cap: Limit,
    pub is_category_cap_reached: bool,
}

/// Cap gauge for one card in one cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapStatus {
    pub card_id: String,
    pub card_name: String,
    #[serde(flatten)]
    pub state: CardCapState,
    pub used_cap_pct: u32,
    pub min_spend: Option<f64>,
    pub min_spend_pct: u32,
    pub tier2_spend_pct: u32,
    pub days_left: DaysRemaining,
    pub progress: CapProgress,
    pub categories: Vec<CategoryCap>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleInfo {
    pub card_id: String,
    pub cycle: CycleKey,
    pub statement_date: Option<NaiveDate>,
    pub payment_due_date: Option<NaiveDate>,
    pub days_to_statement: DaysRemaining,
    pub days_to_due: DaysRemaining,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutPlan {
    pub card_id: String,
    pub cycle: CycleKey,
    pub split: CashbackSplit,
    pub date: Option<PayoutDate>,
    pub status: PayoutStatus,
}

pub struct Engine<'a> {
    snapshot: &'a Snapshot,
    config: EngineConfig,
}

impl<'a> Engine<'a> {
    /// Uses the snapshot's own config, or the defaults.
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            config: snapshot.config.unwrap_or_default(),
        }
    }

    pub fn with_config(snapshot: &'a Snapshot, config: EngineConfig) -> Self {
        Self { snapshot, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Each rule belongs to one card, so the rule count is the (card, rule) pair count.
    fn check_size(&self) -> Result<()> {
        if self.snapshot.rules.len() > self.config.max_candidates {
            return Err(EngineError::TooManyCandidates {
                limit: self.config.max_candidates,
            });
        }
        self.snapshot.validate()
    }

    fn card_of(&self, rule: &Rule) -> Result<&'a Card> {
        self.snapshot.card(&rule.card_id).ok_or_else(|| EngineError::InvalidReference {
            rule_id: rule.id.clone(),
            card_id: rule.card_id.clone(),
        })
    }

    fn card_state(&self, card: &Card, cycle: CycleKey) -> CardCapState {
        card_cap_state(card, cycle, self.snapshot.monthly(&card.id, cycle))
    }

    fn rule_state(&self, card: &Card, rule: &Rule, card_state: CardCapState) -> CapState {
        let summary = self.snapshot.category(&card.id, &rule.name, card_state.cycle);
        let state = ledger::cap_state(rule, card_state, summary);
        trace!(card = %card.id, rule = %rule.id, ?state, "cap state");
        state
    }

    /// Ranks every active-card rule matching the query. An unknown or
    /// malformed category code gives an empty list, not an error.
    pub fn find_best_card(&self, query: &Query) -> Result<Vec<RankedCandidate>> {
        self.check_size()?;

        let history = query
            .merchant
            .as_deref()
            .and_then(|m| resolve_merchant(&self.snapshot.merchant_history, m));
        let code = match query.category_code.as_deref().or(history.map(|h| h.category_code.as_str())) {
            Some(code) => code.trim(),
            None => {
                debug!(merchant = ?query.merchant, "no category code for query");
                return Ok(Vec::new());
            }
        };
        let target = TargetMethod::resolve(query.method, history.and_then(|h| h.method));
        let amount = query.amount.filter(|a| a.is_finite() && *a > 0.0);

        let mut candidates = Vec::new();
        let mut card_states: HashMap<&str, CardCapState> = HashMap::new();
        for rule in &self.snapshot.rules {
            let Some(match_kind) = matches(rule, code, target) else {
                continue;
            };
            let card = self.card_of(rule)?;
            if !card.is_active() {
                continue;
            }
            let card_state = *card_states
                .entry(card.id.as_str())
                .or_insert_with(|| self.card_state(card, cashback_cycle_key(card, query.as_of)));
            let state = self.rule_state(card, rule, card_state);
            let projection = amount.map(|a| project_detail(a, rule, &state));

            candidates.push(RankedCandidate {
                rank: 0,
                card_id: card.id.clone(),
                card_name: card.name.clone(),
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                rule_active: rule.is_active(),
                match_kind,
                rate: state.effective_rate,
                tier: state.card.tier,
                projected_cashback: projection.map(|p| p.cashback),
                binding_cap: projection.and_then(|p| p.binding),
                remaining_category_cap: state.remaining_category_cap,
                remaining_monthly_cap: state.card.remaining_monthly_cap,
                is_category_cap_reached: state.is_category_cap_reached,
                is_monthly_cap_reached: state.card.is_monthly_cap_reached,
                min_spend_met: state.card.min_spend_met,
                overlapping: false,
            });
        }

        let mut per_card: HashMap<String, usize> = HashMap::new();
        for c in &candidates {
            *per_card.entry(c.card_id.clone()).or_default() += 1;
        }
        for c in candidates.iter_mut() {
            if per_card.get(&c.card_id).copied().unwrap_or(0) > 1 {
                c.overlapping = true;
            }
        }
        for (card_id, count) in per_card.iter().filter(|(_, n)| **n > 1) {
            warn!(card = %card_id, code, count, "several rules on one card match the same category code");
        }

        debug!(code, candidates = candidates.len(), with_amount = amount.is_some(), "ranking candidates");
        Ok(ranking::rank(candidates, amount.is_some()))
    }

    /// Cycle a spend on `as_of` lands in for a card.
    pub fn current_cycle(&self, card_id: &str, as_of: NaiveDate) -> Result<CycleKey> {
        let card = self.snapshot.require_card(card_id)?;
        Ok(cashback_cycle_key(card, as_of))
    }

    pub fn cap_status(&self, card_id: &str, cycle: CycleKey, as_of: NaiveDate) -> Result<CapStatus> {
        let card = self.snapshot.require_card(card_id)?;
        let state = self.card_state(card, cycle);

        let categories = self
            .snapshot
            .rules_for_card(&card.id)
            .map(|rule| {
                let rs = self.rule_state(card, rule, state);
                CategoryCap {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    rule_active: rule.is_active(),
                    rate: rs.effective_rate,
                    category_limit: rs.category_limit,
                    category_cashback: rs.category_cashback,
                    remaining_category_cap: rs.remaining_category_cap,
                    is_category_cap_reached: rs.is_category_cap_reached,
                }
            })
            .collect();

        let used_cap_pct = state
            .effective_monthly_limit
            .amount()
            .map_or(0, |limit| percent_of(state.cashback, limit));
        let min_spend = card.minimum_monthly_spend.filter(|m| *m > 0.0);
        let min_spend_pct = min_spend.map_or(100, |m| percent_of(state.spend, m));
        let tier2_spend_pct = card
            .tier2_min_spend
            .filter(|m| *m > 0.0)
            .map_or(0, |m| percent_of(state.spend, m));

        let progress = if state.is_monthly_cap_reached {
            CapProgress::Maximized
        } else if !state.min_spend_met {
            CapProgress::NeedsMinSpend
        } else if state.spend <= 0.0 && state.cashback <= 0.0 {
            CapProgress::Idle
        } else {
            CapProgress::InProgress
        };

        Ok(CapStatus {
            card_id: card.id.clone(),
            card_name: card.name.clone(),
            state,
            used_cap_pct,
            min_spend,
            min_spend_pct,
            tier2_spend_pct,
            days_left: days_left_in_cycle(card, cycle, as_of),
            progress,
            categories,
        })
    }

    /// Strongest card per category label, for proactive suggestions.
    ///
    /// Closed cards are left out. So are rates below the configured floor and
    /// rules whose category cap is already spent. A candidate is eligible when
    /// its minimum spend is met and both rule and card are active.
    pub fn best_per_category(&self, as_of: NaiveDate) -> Result<Vec<Suggestion>> {
        self.check_size()?;

        let mut candidates = Vec::new();
        let mut card_states: HashMap<&str, CardCapState> = HashMap::new();
        for rule in &self.snapshot.rules {
            let card = self.card_of(rule)?;
            if card.status == CardStatus::Closed {
                continue;
            }
            let card_state = *card_states
                .entry(card.id.as_str())
                .or_insert_with(|| self.card_state(card, cashback_cycle_key(card, as_of)));
            let state = self.rule_state(card, rule, card_state);

            let rate = state.effective_rate;
            if rate < self.config.min_suggestion_rate {
                continue;
            }
            let remaining = state.remaining_category_cap.floored();
            if remaining.is_exhausted() {
                continue;
            }

            let spending_needed = match remaining {
                Limit::Capped(left) if rate > 0.0 => Limit::Capped(left / rate),
                _ => Limit::Unlimited,
            };
            let improves = tier2_improves(rule);
            let has_tier2 = card.is_two_tier() && improves;

            for label in rule.suggestion_labels() {
                candidates.push(SuggestionCandidate {
                    label: label.to_string(),
                    card_id: card.id.clone(),
                    card_name: card.name.clone(),
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    rate,
                    tier1_rate: rule.rate,
                    tier2_rate: rule.tier2_rate,
                    remaining_category_cap: remaining,
                    spending_needed,
                    eligible: state.card.min_spend_met && rule.is_active() && card.is_active(),
                    min_spend_met: state.card.min_spend_met,
                    is_boosted: state.card.tier2_active() && improves,
                    has_tier2,
                    tier2_min_spend: card.tier2_min_spend.unwrap_or(0.0),
                    current_spend: state.card.spend,
                });
            }
        }

        debug!(candidates = candidates.len(), "grouping suggestions");
        Ok(ranking::best_per_category(candidates))
    }

    pub fn cycle_info(&self, card_id: &str, as_of: NaiveDate) -> Result<CycleInfo> {
        let card = self.snapshot.require_card(card_id)?;
        let cycle = cashback_cycle_key(card, as_of);
        let statement = statement_date(card, cycle);
        let due = statement.and_then(|s| payment_due_date(card, s));
        let days = |date: Option<NaiveDate>| {
            date.map_or_else(DaysRemaining::not_available, |d| days_remaining(d, as_of))
        };

        Ok(CycleInfo {
            card_id: card.id.clone(),
            cycle,
            statement_date: statement,
            payment_due_date: due,
            days_to_statement: days(statement),
            days_to_due: days(due),
        })
    }

    /// Payout of a cycle's earned cashback under the issuer's schedule.
    pub fn payout(
        &self,
        card_id: &str,
        cycle: CycleKey,
        schedule: PayoutSchedule,
        paid: f64,
        as_of: NaiveDate,
    ) -> Result<PayoutPlan> {
        let card = self.snapshot.require_card(card_id)?;
        let earned = self.snapshot.monthly(card_id, cycle).map_or(0.0, |s| s.cashback);
        let split = cashback_split(earned, card.overall_monthly_limit);
        let date = payout_date(cycle, schedule, card.statement_day, Some(card.payment_due_day));

        Ok(PayoutPlan {
            card_id: card.id.clone(),
            cycle,
            split,
            date,
            status: payout_status(split.total, paid, date, as_of),
        })
    }
}

/// Whether the rule's tier-2 values beat its tier-1 values.
fn tier2_improves(rule: &Rule) -> bool {
    let better_rate = rule.tier2_rate.is_some_and(|r| r > rule.rate);
    let better_limit = rule
        .tier2_category_limit
        .is_some_and(|l| l.total_cmp(&rule.category_limit).is_gt());
    better_rate || better_limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::CapKind;
    use crate::ledger::Tier;
    use crate::matcher::MatchKind;
    use crate::models::{
        CashbackType, CategorySummary, MerchantRecord, MethodScope, MonthlySummary, RuleStatus,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(s: &str) -> CycleKey {
        s.parse().unwrap()
    }

    fn card(id: &str, statement_day: u32) -> Card {
        Card {
            id: id.into(),
            name: format!("Card {id}"),
            status: CardStatus::Active,
            statement_day,
            payment_due_day: 10,
            use_statement_month_for_payments: false,
            overall_monthly_limit: Limit::Unlimited,
            minimum_monthly_spend: None,
            cashback_type: CashbackType::SingleTier,
            tier2_min_spend: None,
            tier2_limit: None,
        }
    }

    fn rule(id: &str, card_id: &str, name: &str, rate: f64, codes: &[&str]) -> Rule {
        Rule {
            id: id.into(),
            card_id: card_id.into(),
            name: name.into(),
            rate,
            tier2_rate: None,
            status: RuleStatus::Active,
            cap_per_transaction: Limit::Unlimited,
            secondary_transaction: None,
            category_limit: Limit::Unlimited,
            tier2_category_limit: None,
            category_codes: codes.iter().map(|s| s.to_string()).collect(),
            excluded_codes: vec![],
            is_default: false,
            methods: MethodScope::All,
            categories: vec![],
        }
    }

    fn monthly(card_id: &str, cycle: &str, spend: f64, cashback: f64) -> MonthlySummary {
        MonthlySummary {
            card_id: card_id.into(),
            cycle: key(cycle),
            spend,
            cashback,
            monthly_cashback_limit: None,
        }
    }

    fn snapshot(cards: Vec<Card>, rules: Vec<Rule>) -> Snapshot {
        Snapshot {
            cards,
            rules,
            ..Snapshot::default()
        }
    }

    fn ids(ranked: &[RankedCandidate]) -> Vec<&str> {
        ranked.iter().map(|c| c.rule_id.as_str()).collect()
    }

    #[test]
    fn test_find_best_card_ranks_by_rate() {
        let snap = snapshot(
            vec![card("a", 25), card("b", 25)],
            vec![
                rule("a-dining", "a", "Dining", 0.05, &["5812"]),
                rule("b-dining", "b", "Dining", 0.08, &["5812"]),
                rule("b-travel", "b", "Travel", 0.10, &["4511"]),
            ],
        );
        let ranked = Engine::new(&snap)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)))
            .unwrap();
        assert_eq!(ids(&ranked), vec!["b-dining", "a-dining"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].match_kind, MatchKind::Specific);
        assert!(ranked[0].projected_cashback.is_none());
    }

    #[test]
    fn test_unknown_code_is_empty() {
        let snap = snapshot(vec![card("a", 25)], vec![rule("r", "a", "Dining", 0.05, &["5812"])]);
        let engine = Engine::new(&snap);
        assert!(engine.find_best_card(&Query::for_code("9999", date(2025, 1, 10))).unwrap().is_empty());
        assert!(engine.find_best_card(&Query::for_code("dine", date(2025, 1, 10))).unwrap().is_empty());
    }

    #[test]
    fn test_inactive_cards_excluded() {
        let mut frozen = card("f", 25);
        frozen.status = CardStatus::Frozen;
        let mut closed = card("c", 25);
        closed.status = CardStatus::Closed;
        let snap = snapshot(
            vec![card("a", 25), frozen, closed],
            vec![
                rule("a-r", "a", "Dining", 0.01, &["5812"]),
                rule("f-r", "f", "Dining", 0.20, &["5812"]),
                rule("c-r", "c", "Dining", 0.30, &["5812"]),
            ],
        );
        let ranked = Engine::new(&snap)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)))
            .unwrap();
        assert_eq!(ids(&ranked), vec!["a-r"]);
    }

    #[test]
    fn test_inactive_rule_kept_but_last() {
        let mut paused = rule("paused", "a", "Old Dining", 0.20, &["5812"]);
        paused.status = RuleStatus::Inactive;
        let snap = snapshot(
            vec![card("a", 25), card("b", 25)],
            vec![paused, rule("live", "b", "Dining", 0.01, &["5812"])],
        );
        let ranked = Engine::new(&snap)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)))
            .unwrap();
        assert_eq!(ids(&ranked), vec!["live", "paused"]);
        assert!(!ranked[1].rule_active);
    }

    #[test]
    fn test_cap_clamped_projection() {
        let mut capped = card("a", 25);
        capped.overall_monthly_limit = Limit::Capped(500_000.0);
        let mut snap = snapshot(vec![capped], vec![rule("r", "a", "Dining", 0.05, &["5812"])]);
        snap.monthly_summaries.push(monthly("a", "202501", 10_000_000.0, 480_000.0));

        let ranked = Engine::new(&snap)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)).with_amount(1_000_000.0))
            .unwrap();
        assert_eq!(ranked[0].projected_cashback, Some(20_000.0));
        assert_eq!(ranked[0].binding_cap, Some(CapKind::Monthly));
        assert_eq!(ranked[0].remaining_monthly_cap, Limit::Capped(20_000.0));
    }

    #[test]
    fn test_amount_ranking_prefers_payout() {
        let mut small_cap = rule("capped", "a", "Dining", 0.10, &["5812"]);
        small_cap.cap_per_transaction = Limit::Capped(50_000.0);
        let snap = snapshot(
            vec![card("a", 25), card("b", 25)],
            vec![small_cap, rule("flat", "b", "Dining", 0.06, &["5812"])],
        );
        let engine = Engine::new(&snap);

        let with_amount = engine
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)).with_amount(2_000_000.0))
            .unwrap();
        assert_eq!(ids(&with_amount), vec!["flat", "capped"]);

        let without = engine.find_best_card(&Query::for_code("5812", date(2025, 1, 10))).unwrap();
        assert_eq!(ids(&without), vec!["capped", "flat"]);
    }

    #[test]
    fn test_cycle_key_follows_as_of() {
        let mut snap = snapshot(vec![card("a", 25)], vec![rule("r", "a", "Dining", 0.05, &["5812"])]);
        snap.category_summaries.push(CategorySummary {
            card_id: "a".into(),
            rule_name: "Dining".into(),
            cycle: key("202502"),
            cashback: 100.0,
            category_limit: Some(100.0),
        });
        let engine = Engine::new(&snap);

        let before = engine.find_best_card(&Query::for_code("5812", date(2025, 1, 20))).unwrap();
        assert!(!before[0].is_category_cap_reached);

        let after = engine.find_best_card(&Query::for_code("5812", date(2025, 1, 26))).unwrap();
        assert!(after[0].is_category_cap_reached);
    }

    #[test]
    fn test_merchant_lookup_and_method() {
        let mut online = rule("online", "a", "Online", 0.10, &["5311"]);
        online.methods = MethodScope::Only(vec![PaymentMethod::ECom]);
        let mut in_store = rule("store", "b", "Store", 0.05, &["5311"]);
        in_store.methods = MethodScope::Only(vec![PaymentMethod::Pos]);

        let mut snap = snapshot(vec![card("a", 25), card("b", 25)], vec![online, in_store]);
        snap.merchant_history.push(MerchantRecord {
            merchant: "Shopee".into(),
            category_code: "5311".into(),
            method: Some(PaymentMethod::ECom),
        });
        let engine = Engine::new(&snap);

        let from_history = engine.find_best_card(&Query::for_merchant("shopee", date(2025, 1, 10))).unwrap();
        assert_eq!(ids(&from_history), vec!["online"]);

        let explicit = engine
            .find_best_card(&Query::for_merchant("shopee", date(2025, 1, 10)).with_method(PaymentMethod::Pos))
            .unwrap();
        assert_eq!(ids(&explicit), vec!["store"]);

        let unknown = engine.find_best_card(&Query::for_merchant("grab", date(2025, 1, 10))).unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_overlapping_rules_kept() {
        let mut broad = rule("broad", "a", "Everything", 0.01, &[]);
        broad.is_default = true;
        let snap = snapshot(
            vec![card("a", 25)],
            vec![rule("dining", "a", "Dining", 0.05, &["5812"]), broad],
        );
        let ranked = Engine::new(&snap)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)))
            .unwrap();
        assert_eq!(ids(&ranked), vec!["dining", "broad"]);
        assert!(ranked.iter().all(|c| c.overlapping));
        assert_eq!(ranked[1].match_kind, MatchKind::Broad);
    }

    #[test]
    fn test_dangling_rule_errors() {
        let snap = snapshot(vec![card("a", 25)], vec![rule("r", "ghost", "Dining", 0.05, &["5812"])]);
        let err = Engine::new(&snap)
            .find_best_card(&Query::for_code("4511", date(2025, 1, 10)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidReference { .. }));
    }

    #[test]
    fn test_candidate_limit() {
        let snap = snapshot(
            vec![card("a", 25)],
            vec![
                rule("r1", "a", "Dining", 0.05, &["5812"]),
                rule("r2", "a", "Travel", 0.05, &["4511"]),
            ],
        );
        let config = EngineConfig {
            max_candidates: 1,
            ..EngineConfig::default()
        };
        let err = Engine::with_config(&snap, config)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)))
            .unwrap_err();
        assert!(matches!(err, EngineError::TooManyCandidates { limit: 1 }));
    }

    #[test]
    fn test_tier2_in_ranking() {
        let mut two_tier = card("a", 25);
        two_tier.cashback_type = CashbackType::TwoTier;
        two_tier.tier2_min_spend = Some(20_000_000.0);
        two_tier.overall_monthly_limit = Limit::Capped(300_000.0);
        two_tier.tier2_limit = Some(Limit::Capped(800_000.0));
        let mut r = rule("r", "a", "Dining", 0.05, &["5812"]);
        r.tier2_rate = Some(0.08);

        let mut snap = snapshot(vec![two_tier], vec![r]);
        snap.monthly_summaries.push(monthly("a", "202501", 25_000_000.0, 400_000.0));

        let ranked = Engine::new(&snap)
            .find_best_card(&Query::for_code("5812", date(2025, 1, 10)))
            .unwrap();
        assert_eq!(ranked[0].tier, Tier::Tier2);
        assert_eq!(ranked[0].rate, 0.08);
        assert!(!ranked[0].is_monthly_cap_reached);
        assert_eq!(ranked[0].remaining_monthly_cap, Limit::Capped(400_000.0));
    }

    #[test]
    fn test_cap_status() {
        let mut c = card("a", 25);
        c.overall_monthly_limit = Limit::Capped(500_000.0);
        c.minimum_monthly_spend = Some(5_000_000.0);
        let mut dining = rule("r", "a", "Dining", 0.05, &["5812"]);
        dining.category_limit = Limit::Capped(200_000.0);
        let mut snap = snapshot(vec![c], vec![dining]);
        snap.monthly_summaries.push(monthly("a", "202502", 2_500_000.0, 125_000.0));
        snap.category_summaries.push(CategorySummary {
            card_id: "a".into(),
            rule_name: "Dining".into(),
            cycle: key("202502"),
            cashback: 125_000.0,
            category_limit: None,
        });

        let status = Engine::new(&snap).cap_status("a", key("202502"), date(2025, 2, 20)).unwrap();
        assert_eq!(status.used_cap_pct, 25);
        assert_eq!(status.min_spend_pct, 50);
        assert_eq!(status.progress, CapProgress::NeedsMinSpend);
        assert_eq!(status.days_left.days, Some(5));
        assert_eq!(status.state.remaining_monthly_cap, Limit::Capped(375_000.0));
        assert_eq!(status.categories.len(), 1);
        assert_eq!(status.categories[0].remaining_category_cap, Limit::Capped(75_000.0));
    }

    #[test]
    fn test_cap_status_two_tier_progress() {
        let mut c = card("a", 25);
        c.cashback_type = CashbackType::TwoTier;
        c.tier2_min_spend = Some(10_000_000.0);
        c.overall_monthly_limit = Limit::Capped(300_000.0);
        c.tier2_limit = Some(Limit::Capped(800_000.0));
        let mut snap = snapshot(vec![c], vec![]);
        snap.monthly_summaries.push(monthly("a", "202501", 5_000_000.0, 100_000.0));

        let halfway = Engine::new(&snap).cap_status("a", key("202501"), date(2025, 1, 10)).unwrap();
        assert_eq!(halfway.tier2_spend_pct, 50);
        assert_eq!(halfway.state.tier, Tier::Tier1);
        assert_eq!(halfway.state.effective_monthly_limit, Limit::Capped(300_000.0));

        snap.monthly_summaries[0].spend = 12_000_000.0;
        let unlocked = Engine::new(&snap).cap_status("a", key("202501"), date(2025, 1, 10)).unwrap();
        assert_eq!(unlocked.tier2_spend_pct, 100);
        assert_eq!(unlocked.state.tier, Tier::Tier2);
        assert_eq!(unlocked.state.effective_monthly_limit, Limit::Capped(800_000.0));
        assert_eq!(unlocked.state.remaining_monthly_cap, Limit::Capped(700_000.0));
    }

    #[test]
    fn test_cap_status_progress() {
        let mut c = card("a", 25);
        c.overall_monthly_limit = Limit::Capped(100.0);
        let mut snap = snapshot(vec![c], vec![]);
        let engine_idle = Engine::new(&snap);
        let idle = engine_idle.cap_status("a", key("202501"), date(2025, 1, 1)).unwrap();
        assert_eq!(idle.progress, CapProgress::Idle);
        assert_eq!(idle.min_spend_pct, 100);

        snap.monthly_summaries.push(monthly("a", "202501", 1_000.0, 100.0));
        let maxed = Engine::new(&snap).cap_status("a", key("202501"), date(2025, 1, 1)).unwrap();
        assert_eq!(maxed.progress, CapProgress::Maximized);
        assert_eq!(maxed.used_cap_pct, 100);
    }

    #[test]
    fn test_cap_status_unknown_card() {
        let snap = snapshot(vec![], vec![]);
        let err = Engine::new(&snap).cap_status("zz", key("202501"), date(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownCard(_)));
    }

    #[test]
    fn test_best_per_category_challenger() {
        let mut needs_spend = card("b", 25);
        needs_spend.minimum_monthly_spend = Some(3_000_000.0);
        let snap = snapshot(
            vec![card("a", 25), needs_spend],
            vec![
                rule("a-dining", "a", "Dining", 0.05, &["5812"]),
                rule("b-dining", "b", "Dining", 0.10, &["5812"]),
            ],
        );
        let picks = Engine::new(&snap).best_per_category(date(2025, 1, 10)).unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].choice.rule_id, "a-dining");
        assert!(picks[0].has_better_challenger);
    }

    #[test]
    fn test_best_per_category_inactive_rule_is_challenger() {
        let mut paused = rule("b-dining", "b", "Dining", 0.10, &["5812"]);
        paused.status = RuleStatus::Inactive;
        let snap = snapshot(
            vec![card("a", 25), card("b", 25)],
            vec![rule("a-dining", "a", "Dining", 0.05, &["5812"]), paused],
        );
        let picks = Engine::new(&snap).best_per_category(date(2025, 1, 10)).unwrap();
        assert_eq!(picks[0].choice.rule_id, "a-dining");
        assert!(picks[0].has_better_challenger);
    }

    #[test]
    fn test_best_per_category_filters() {
        let mut closed = card("c", 25);
        closed.status = CardStatus::Closed;
        let mut spent = rule("spent", "a", "Grocery", 0.05, &["5411"]);
        spent.category_limit = Limit::Capped(100.0);
        let mut snap = snapshot(
            vec![card("a", 25), closed],
            vec![
                spent,
                rule("low", "a", "Fuel", 0.01, &["5541"]),
                rule("closed", "c", "Travel", 0.10, &["4511"]),
                rule("ok", "a", "Dining", 0.05, &["5812"]),
            ],
        );
        snap.category_summaries.push(CategorySummary {
            card_id: "a".into(),
            rule_name: "Grocery".into(),
            cycle: key("202501"),
            cashback: 100.0,
            category_limit: None,
        });
        let picks = Engine::new(&snap).best_per_category(date(2025, 1, 10)).unwrap();
        let rules: Vec<&str> = picks.iter().map(|p| p.choice.rule_id.as_str()).collect();
        assert_eq!(rules, vec!["ok"]);
    }

    #[test]
    fn test_best_per_category_labels_and_spending_needed() {
        let mut r = rule("r", "a", "Lifestyle", 0.05, &["5812", "5814"]);
        r.categories = vec!["Cafe".into(), "Restaurant".into()];
        r.category_limit = Limit::Capped(100_000.0);
        let snap = snapshot(vec![card("a", 25)], vec![r]);
        let picks = Engine::new(&snap).best_per_category(date(2025, 1, 10)).unwrap();
        assert_eq!(picks.len(), 2);
        assert!(picks.iter().all(|p| p.choice.spending_needed == Limit::Capped(100_000.0 / 0.05)));
        let labels: Vec<&str> = picks.iter().map(|p| p.choice.label.as_str()).collect();
        assert_eq!(labels, vec!["Cafe", "Restaurant"]);
    }

    #[test]
    fn test_best_per_category_tier_flags() {
        let mut c = card("a", 25);
        c.cashback_type = CashbackType::TwoTier;
        c.tier2_min_spend = Some(10_000_000.0);
        let mut r = rule("r", "a", "Dining", 0.05, &["5812"]);
        r.tier2_rate = Some(0.10);
        let mut snap = snapshot(vec![c], vec![r]);

        let before = Engine::new(&snap).best_per_category(date(2025, 1, 10)).unwrap();
        assert!(before[0].choice.has_tier2);
        assert!(!before[0].choice.is_boosted);
        assert_eq!(before[0].choice.rate, 0.05);

        snap.monthly_summaries.push(monthly("a", "202501", 12_000_000.0, 0.0));
        let after = Engine::new(&snap).best_per_category(date(2025, 1, 10)).unwrap();
        assert!(after[0].choice.is_boosted);
        assert_eq!(after[0].choice.rate, 0.10);
    }

    #[test]
    fn test_cycle_info() {
        let snap = snapshot(vec![card("a", 25)], vec![]);
        let info = Engine::new(&snap).cycle_info("a", date(2024, 12, 26)).unwrap();
        assert_eq!(info.cycle, key("202501"));
        assert_eq!(info.statement_date, Some(date(2025, 1, 25)));
        assert_eq!(info.payment_due_date, Some(date(2025, 2, 10)));
        assert_eq!(info.days_to_statement.days, Some(30));
    }

    #[test]
    fn test_payout_plan() {
        let mut c = card("a", 25);
        c.overall_monthly_limit = Limit::Capped(500.0);
        let mut snap = snapshot(vec![c], vec![]);
        snap.monthly_summaries.push(monthly("a", "202501", 0.0, 700.0));

        let plan = Engine::new(&snap)
            .payout("a", key("202501"), PayoutSchedule::M1, 0.0, date(2025, 4, 1))
            .unwrap();
        assert_eq!(plan.split.tier1, 500.0);
        assert_eq!(plan.split.tier2, 200.0);
        assert_eq!(plan.date, Some(PayoutDate::On(date(2025, 3, 10))));
        assert_eq!(plan.status, PayoutStatus::Overdue);
    }
}
