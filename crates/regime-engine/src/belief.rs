//! Belief distribution over regimes and classical evidence construction.
//!
//! `RegimeState` is a validated constructor, not a post-hoc assertion: a value
//! of this type cannot exist unless the distribution invariants hold, which
//! eliminates the constructed-but-invalid class of states entirely. A
//! construction failure signals a defect in an upstream producer and is fatal
//! to the call.

use std::collections::BTreeMap;

use regime_common::{EvidenceError, EvidenceOpinion, EvidenceSnapshot, Regime};
use serde::Serialize;

use crate::confidence::ConfidenceResult;
use crate::resolution::ResolutionResult;

/// Absolute tolerance on the belief sum.
pub const BELIEF_SUM_TOLERANCE: f64 = 1e-9;

/// Belief-distribution invariant violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BeliefStateError {
    #[error("belief mapping is empty")]
    EmptyBeliefs,

    #[error("anchor regime {anchor} is not a key in the belief mapping")]
    AnchorMissing { anchor: Regime },

    #[error("belief for {regime} is {value}, outside [0, 1] or non-finite")]
    OutOfRange { regime: Regime, value: f64 },

    #[error("beliefs sum to {sum}, not 1 within {BELIEF_SUM_TOLERANCE:e}")]
    NotNormalized { sum: f64 },
}

/// A normalized probability distribution over participating regimes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeState {
    beliefs: BTreeMap<Regime, f64>,
    anchor_regime: Regime,
}

impl RegimeState {
    /// Construct a belief state, enforcing all invariants:
    /// non-empty mapping, anchor present, every value finite in [0, 1],
    /// sum equal to 1 within [`BELIEF_SUM_TOLERANCE`].
    pub fn new(
        beliefs: BTreeMap<Regime, f64>,
        anchor_regime: Regime,
    ) -> Result<Self, BeliefStateError> {
        if beliefs.is_empty() {
            return Err(BeliefStateError::EmptyBeliefs);
        }
        if !beliefs.contains_key(&anchor_regime) {
            return Err(BeliefStateError::AnchorMissing {
                anchor: anchor_regime,
            });
        }
        for (&regime, &value) in &beliefs {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(BeliefStateError::OutOfRange { regime, value });
            }
        }
        let sum: f64 = beliefs.values().sum();
        if (sum - 1.0).abs() > BELIEF_SUM_TOLERANCE {
            return Err(BeliefStateError::NotNormalized { sum });
        }
        Ok(Self {
            beliefs,
            anchor_regime,
        })
    }

    /// Uniform distribution over all regimes, anchored at `anchor_regime`.
    pub fn uniform(anchor_regime: Regime) -> Self {
        let n = Regime::ALL.len() as f64;
        let beliefs = Regime::ALL.iter().map(|&r| (r, 1.0 / n)).collect();
        // Uniform over the closed enum always satisfies the invariants.
        Self::new(beliefs, anchor_regime).expect("uniform distribution is valid")
    }

    pub fn beliefs(&self) -> &BTreeMap<Regime, f64> {
        &self.beliefs
    }

    pub fn anchor_regime(&self) -> Regime {
        self.anchor_regime
    }

    pub fn belief_for(&self, regime: Regime) -> Option<f64> {
        self.beliefs.get(&regime).copied()
    }
}

/// Convert a resolution + confidence pair into a single-opinion snapshot for
/// cross-engine fusion.
///
/// Strength is fixed at 1.0: the classical engine speaks with one voice for
/// its winner. Confidence defaults to 0.0 when synthesis produced None, and a
/// resolution without a winner contributes an empty opinion set.
pub fn build_classical_evidence(
    resolution: &ResolutionResult,
    confidence: &ConfidenceResult,
    source: &str,
) -> Result<EvidenceSnapshot, EvidenceError> {
    let Some(winner) = &resolution.winner else {
        return Ok(EvidenceSnapshot::empty());
    };
    let opinion = EvidenceOpinion::new(
        winner.regime,
        1.0,
        confidence.confidence.unwrap_or(0.0),
        source,
    )?;
    Ok(EvidenceSnapshot::from_opinions(vec![opinion]))
}
