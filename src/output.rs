use tabled::Tabled;

use cashback_engine::cycle::DaysRemaining;
use cashback_engine::engine::{CapStatus, CategoryCap, CycleInfo, PayoutPlan};
use cashback_engine::ranking::{RankedCandidate, Suggestion};

fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn yes_no(flag: bool) -> String {
    if flag { "yes".into() } else { "no".into() }
}

fn days(d: &DaysRemaining) -> String {
    match d.days {
        Some(n) => format!("{n} days"),
        None => d.status.to_string(),
    }
}

fn date(d: Option<chrono::NaiveDate>) -> String {
    d.map_or_else(|| "N/A".to_string(), |d| d.to_string())
}

/// One line of the "best-card" output
#[derive(Tabled)]
pub struct RecommendationRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "Card")]
    pub card: String,
    #[tabled(rename = "Rule")]
    pub rule: String,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Cashback")]
    pub cashback: String,
    #[tabled(rename = "Cap Left")]
    pub cap_left: String,
    #[tabled(rename = "Notes")]
    pub notes: String,
}

impl From<&RankedCandidate> for RecommendationRow {
    fn from(c: &RankedCandidate) -> Self {
        let mut notes = Vec::new();
        if !c.rule_active {
            notes.push("rule inactive".to_string());
        }
        if c.is_category_cap_reached {
            notes.push("category cap reached".to_string());
        }
        if c.is_monthly_cap_reached {
            notes.push("monthly cap reached".to_string());
        }
        if !c.min_spend_met {
            notes.push("min spend not met".to_string());
        }
        if let Some(kind) = c.binding_cap {
            notes.push(format!("limited by {kind:?} cap"));
        }
        if c.overlapping {
            notes.push("overlapping rules".to_string());
        }

        Self {
            rank: c.rank,
            card: c.card_name.clone(),
            rule: c.rule_name.clone(),
            rate: pct(c.rate),
            cashback: c.projected_cashback.map_or_else(|| "-".to_string(), |v| format!("{v:.0}")),
            cap_left: c.remaining_category_cap.floored().to_string(),
            notes: notes.join(", "),
        }
    }
}

#[derive(Tabled)]
pub struct CapRow {
    #[tabled(rename = "Card")]
    pub card: String,
    #[tabled(rename = "Cycle")]
    pub cycle: String,
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Spend")]
    pub spend: String,
    #[tabled(rename = "Cashback")]
    pub cashback: String,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Left")]
    pub left: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Min Spend")]
    pub min_spend: String,
    #[tabled(rename = "Cycle Ends")]
    pub days_left: String,
    #[tabled(rename = "Status")]
    pub progress: String,
}

impl From<&CapStatus> for CapRow {
    fn from(s: &CapStatus) -> Self {
        let min_spend = match s.min_spend {
            Some(min) if s.state.min_spend_met => format!("met ({min:.0})"),
            Some(min) => format!("{:.0} / {min:.0} ({}%)", s.state.spend, s.min_spend_pct),
            None => "-".to_string(),
        };
        Self {
            card: s.card_name.clone(),
            cycle: s.state.cycle.to_string(),
            tier: format!("{:?}", s.state.tier),
            spend: format!("{:.0}", s.state.spend),
            cashback: format!("{:.0}", s.state.cashback),
            limit: s.state.effective_monthly_limit.to_string(),
            left: s.state.remaining_monthly_cap.floored().to_string(),
            used: format!("{}%", s.used_cap_pct),
            min_spend,
            days_left: days(&s.days_left),
            progress: format!("{:?}", s.progress),
        }
    }
}

#[derive(Tabled)]
pub struct CategoryCapRow {
    #[tabled(rename = "Rule")]
    pub rule: String,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Cashback")]
    pub cashback: String,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Left")]
    pub left: String,
    #[tabled(rename = "Active")]
    pub active: String,
}

impl From<&CategoryCap> for CategoryCapRow {
    fn from(c: &CategoryCap) -> Self {
        Self {
            rule: c.rule_name.clone(),
            rate: pct(c.rate),
            cashback: format!("{:.0}", c.category_cashback),
            limit: c.category_limit.to_string(),
            left: c.remaining_category_cap.floored().to_string(),
            active: yes_no(c.rule_active),
        }
    }
}

#[derive(Tabled)]
pub struct SuggestionRow {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Card")]
    pub card: String,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Cap Left")]
    pub cap_left: String,
    #[tabled(rename = "Spend To Max")]
    pub spending_needed: String,
    #[tabled(rename = "Eligible")]
    pub eligible: String,
    #[tabled(rename = "Notes")]
    pub notes: String,
}

impl From<&Suggestion> for SuggestionRow {
    fn from(s: &Suggestion) -> Self {
        let c = &s.choice;
        let mut notes = Vec::new();
        if c.is_boosted {
            notes.push("tier 2 rate active".to_string());
        } else if c.has_tier2 {
            if let Some(rate) = c.tier2_rate {
                let more = (c.tier2_min_spend - c.current_spend).max(0.0);
                notes.push(format!("spend {more:.0} more for {}", pct(rate)));
            }
        }
        if s.has_better_challenger {
            notes.push("better card once its min spend is met".to_string());
        }

        Self {
            category: c.label.clone(),
            card: c.card_name.clone(),
            rate: pct(c.rate),
            cap_left: c.remaining_category_cap.to_string(),
            spending_needed: match c.spending_needed.amount() {
                Some(v) => format!("{v:.0}"),
                None => "N/A".to_string(),
            },
            eligible: yes_no(c.eligible),
            notes: notes.join(", "),
        }
    }
}

#[derive(Tabled)]
pub struct CycleRow {
    #[tabled(rename = "Card")]
    pub card: String,
    #[tabled(rename = "Cycle")]
    pub cycle: String,
    #[tabled(rename = "Statement")]
    pub statement: String,
    #[tabled(rename = "Until Statement")]
    pub until_statement: String,
    #[tabled(rename = "Due")]
    pub due: String,
    #[tabled(rename = "Until Due")]
    pub until_due: String,
}

impl From<&CycleInfo> for CycleRow {
    fn from(i: &CycleInfo) -> Self {
        Self {
            card: i.card_id.clone(),
            cycle: i.cycle.to_string(),
            statement: date(i.statement_date),
            until_statement: days(&i.days_to_statement),
            due: date(i.payment_due_date),
            until_due: days(&i.days_to_due),
        }
    }
}

#[derive(Tabled)]
pub struct PayoutRow {
    #[tabled(rename = "Card")]
    pub card: String,
    #[tabled(rename = "Cycle")]
    pub cycle: String,
    #[tabled(rename = "Total")]
    pub total: String,
    #[tabled(rename = "Tier 1")]
    pub tier1: String,
    #[tabled(rename = "Tier 2")]
    pub tier2: String,
    #[tabled(rename = "Payout")]
    pub date: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&PayoutPlan> for PayoutRow {
    fn from(p: &PayoutPlan) -> Self {
        Self {
            card: p.card_id.clone(),
            cycle: p.cycle.to_string(),
            total: format!("{:.0}", p.split.total),
            tier1: format!("{:.0}", p.split.tier1),
            tier2: format!("{:.0}", p.split.tier2),
            date: p.date.map_or_else(|| "N/A".to_string(), |d| d.to_string()),
            status: p.status.to_string(),
        }
    }
}
