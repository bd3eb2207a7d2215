use serde::{Deserialize, Serialize};

/// Tunables for a query run. Everything else comes from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Upper bound on rules evaluated per query
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Suggestions below this tier-resolved rate are skipped
    #[serde(default = "default_min_suggestion_rate")]
    pub min_suggestion_rate: f64,
}

fn default_max_candidates() -> usize {
    10_000
}

fn default_min_suggestion_rate() -> f64 {
    0.02
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            min_suggestion_rate: default_min_suggestion_rate(),
        }
    }
}
