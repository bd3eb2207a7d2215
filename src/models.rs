use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cycle::CycleKey;

/// A cashback ceiling. `Unlimited` replaces the old "0 means no cap" convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Limit {
    Capped(f64),
    #[default]
    Unlimited,
}

impl Limit {
    /// Converts a stored number where `0` or less meant "no limit".
    pub fn from_legacy(value: f64) -> Self {
        if value > 0.0 {
            Limit::Capped(value)
        } else {
            Limit::Unlimited
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            Limit::Capped(v) => Some(*v),
            Limit::Unlimited => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Limit::Capped(_))
    }

    /// Headroom left after `used`. Not clamped: an overspent cap goes negative.
    pub fn remaining_after(&self, used: f64) -> Self {
        match self {
            Limit::Capped(v) => Limit::Capped(v - used),
            Limit::Unlimited => Limit::Unlimited,
        }
    }

    /// True once a finite headroom has dropped to zero or below.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Limit::Capped(v) if *v <= 0.0)
    }

    /// Ceiling `value` by this limit, treating a negative limit as zero.
    pub fn clamp(&self, value: f64) -> f64 {
        match self {
            Limit::Capped(v) => value.min(v.max(0.0)),
            Limit::Unlimited => value,
        }
    }

    /// Same limit with negative headroom floored at zero.
    pub fn floored(&self) -> Self {
        match self {
            Limit::Capped(v) => Limit::Capped(v.max(0.0)),
            Limit::Unlimited => Limit::Unlimited,
        }
    }

    /// Orders by headroom, `Unlimited` above every finite value.
    pub fn total_cmp(&self, other: &Limit) -> Ordering {
        match (self, other) {
            (Limit::Unlimited, Limit::Unlimited) => Ordering::Equal,
            (Limit::Unlimited, Limit::Capped(_)) => Ordering::Greater,
            (Limit::Capped(_), Limit::Unlimited) => Ordering::Less,
            (Limit::Capped(a), Limit::Capped(b)) => a.total_cmp(b),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Capped(v) => write!(f, "{v:.0}"),
            Limit::Unlimited => write!(f, "Unlimited"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CardStatus {
    #[default]
    Active,
    Frozen,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleStatus {
    #[default]
    Active,
    #[serde(other)]
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CashbackType {
    #[default]
    SingleTier,
    TwoTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "POS")]
    Pos,
    #[serde(rename = "eCom")]
    ECom,
    International,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Pos => "POS",
            PaymentMethod::ECom => "eCom",
            PaymentMethod::International => "International",
        };
        f.write_str(label)
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pos" => Ok(PaymentMethod::Pos),
            "ecom" | "e-com" | "online" => Ok(PaymentMethod::ECom),
            "international" | "intl" => Ok(PaymentMethod::International),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

/// Which payment methods a rule pays out on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodScope {
    #[default]
    All,
    Only(Vec<PaymentMethod>),
}

/// Per-transaction cap that takes over once the amount reaches `min_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryCap {
    pub min_amount: f64,
    pub cap: Limit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: CardStatus,
    /// Day of month the statement closes (1-31)
    pub statement_day: u32,
    /// Day of month payment is due (1-31)
    pub payment_due_day: u32,
    #[serde(default)]
    pub use_statement_month_for_payments: bool,
    #[serde(default)]
    pub overall_monthly_limit: Limit,
    #[serde(default)]
    pub minimum_monthly_spend: Option<f64>,
    #[serde(default)]
    pub cashback_type: CashbackType,
    #[serde(default)]
    pub tier2_min_spend: Option<f64>,
    /// `None` falls back to the overall limit when tier 2 is active
    #[serde(default)]
    pub tier2_limit: Option<Limit>,
}

impl Card {
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    pub fn is_two_tier(&self) -> bool {
        self.cashback_type == CashbackType::TwoTier
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub card_id: String,
    pub name: String,
    /// Base rate, 0.0 to 1.0
    pub rate: f64,
    #[serde(default)]
    pub tier2_rate: Option<f64>,
    #[serde(default)]
    pub status: RuleStatus,
    #[serde(default)]
    pub cap_per_transaction: Limit,
    #[serde(default)]
    pub secondary_transaction: Option<SecondaryCap>,
    #[serde(default)]
    pub category_limit: Limit,
    #[serde(default)]
    pub tier2_category_limit: Option<Limit>,
    #[serde(default)]
    pub category_codes: Vec<String>,
    #[serde(default)]
    pub excluded_codes: Vec<String>,
    /// Matches any code not explicitly excluded
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub methods: MethodScope,
    /// Finer labels used when grouping suggestions
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Rule {
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// Labels this rule competes under in suggestions; its own name when it has none.
    pub fn suggestion_labels(&self) -> Vec<&str> {
        if self.categories.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.categories.iter().map(String::as_str).collect()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub card_id: String,
    pub cycle: CycleKey,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub cashback: f64,
    /// Per-cycle override of the card's monthly cashback limit, used when > 0
    #[serde(default)]
    pub monthly_cashback_limit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub card_id: String,
    pub rule_name: String,
    pub cycle: CycleKey,
    #[serde(default)]
    pub cashback: f64,
    /// Per-cycle override of the rule's category limit, used when > 0
    #[serde(default)]
    pub category_limit: Option<f64>,
}

/// A merchant seen in past transactions, with the code and method it was charged under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRecord {
    pub merchant: String,
    pub category_code: String,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}
