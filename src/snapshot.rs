use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::cycle::CycleKey;
use crate::error::{EngineError, Result};
use crate::models::{Card, CategorySummary, MerchantRecord, MonthlySummary, Rule};

/// A consistent, read-only view of everything the engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub monthly_summaries: Vec<MonthlySummary>,
    #[serde(default)]
    pub category_summaries: Vec<CategorySummary>,
    #[serde(default)]
    pub merchant_history: Vec<MerchantRecord>,
    #[serde(default)]
    pub config: Option<EngineConfig>,
}

impl Snapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn require_card(&self, id: &str) -> Result<&Card> {
        self.card(id).ok_or_else(|| EngineError::UnknownCard(id.to_string()))
    }

    pub fn rules_for_card<'a>(&'a self, card_id: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.card_id == card_id)
    }

    pub fn monthly(&self, card_id: &str, cycle: CycleKey) -> Option<&MonthlySummary> {
        self.monthly_summaries
            .iter()
            .find(|s| s.card_id == card_id && s.cycle == cycle)
    }

    pub fn category(&self, card_id: &str, rule_name: &str, cycle: CycleKey) -> Option<&CategorySummary> {
        self.category_summaries
            .iter()
            .find(|s| s.card_id == card_id && s.rule_name == rule_name && s.cycle == cycle)
    }

    /// Every rule must point at a card in the snapshot.
    pub fn validate(&self) -> Result<()> {
        let cards: HashMap<&str, &Card> = self.cards.iter().map(|c| (c.id.as_str(), c)).collect();
        for rule in &self.rules {
            if !cards.contains_key(rule.card_id.as_str()) {
                return Err(EngineError::InvalidReference {
                    rule_id: rule.id.clone(),
                    card_id: rule.card_id.clone(),
                });
            }
        }
        Ok(())
    }
}
