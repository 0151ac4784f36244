//! Optional per-regime score weighting.
//!
//! A pure, total stage between veto evaluation and ranking: multiply each
//! regime's score by its configured weight, defaulting to 1.0 for any regime
//! absent from the mapping. Contributors and veto status are untouched.

use std::collections::BTreeMap;

use regime_common::Regime;
use serde::{Deserialize, Serialize};

use crate::scoring::RegimeScore;

/// Per-regime score multipliers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeWeights {
    multipliers: BTreeMap<Regime, f64>,
}

impl RegimeWeights {
    /// Neutral weighting (1.0 everywhere).
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn from_multipliers(multipliers: BTreeMap<Regime, f64>) -> Self {
        Self { multipliers }
    }

    pub fn set(&mut self, regime: Regime, weight: f64) {
        self.multipliers.insert(regime, weight);
    }

    /// The multiplier for a regime; 1.0 when unconfigured.
    pub fn weight_for(&self, regime: Regime) -> f64 {
        self.multipliers.get(&regime).copied().unwrap_or(1.0)
    }

    pub fn multipliers(&self) -> &BTreeMap<Regime, f64> {
        &self.multipliers
    }
}

/// Apply weights to a score list, leaving contributors intact.
pub fn apply_weights(scores: &[RegimeScore], weights: &RegimeWeights) -> Vec<RegimeScore> {
    scores
        .iter()
        .map(|s| RegimeScore {
            regime: s.regime,
            score: s.score * weights.weight_for(s.regime),
            contributors: s.contributors.clone(),
        })
        .collect()
}
