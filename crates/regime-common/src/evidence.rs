//! Evidence opinions for cross-engine fusion.
//!
//! Each sub-engine contributes zero or more `(regime, strength, confidence,
//! source)` opinions. The fusion composer downstream requires a deterministic
//! total order, so snapshots keep their opinions canonically sorted by
//! `(regime declaration index, source, -confidence, -strength)`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::Regime;

/// Malformed evidence values. Never clamped, always rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvidenceError {
    #[error("opinion strength {value} outside [0, 1] for source {src}")]
    StrengthOutOfBounds { src: String, value: f64 },

    #[error("opinion confidence {value} outside [0, 1] for source {src}")]
    ConfidenceOutOfBounds { src: String, value: f64 },

    #[error("opinion source is empty")]
    EmptySource,
}

fn in_unit_interval(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

/// A single engine's belief about one regime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceOpinion {
    regime: Regime,
    strength: f64,
    confidence: f64,
    source: String,
}

impl EvidenceOpinion {
    /// Create a validated opinion. Strength and confidence must be finite
    /// values in [0, 1].
    pub fn new(
        regime: Regime,
        strength: f64,
        confidence: f64,
        source: impl Into<String>,
    ) -> Result<Self, EvidenceError> {
        let source = source.into();
        if source.is_empty() {
            return Err(EvidenceError::EmptySource);
        }
        if !in_unit_interval(strength) {
            return Err(EvidenceError::StrengthOutOfBounds {
                src: source,
                value: strength,
            });
        }
        if !in_unit_interval(confidence) {
            return Err(EvidenceError::ConfidenceOutOfBounds {
                src: source,
                value: confidence,
            });
        }
        Ok(Self {
            regime,
            strength,
            confidence,
            source,
        })
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PartialEq for EvidenceOpinion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EvidenceOpinion {}

impl Ord for EvidenceOpinion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.regime
            .index()
            .cmp(&other.regime.index())
            .then_with(|| self.source.cmp(&other.source))
            // Higher confidence, then higher strength, sorts first.
            .then_with(|| other.confidence.total_cmp(&self.confidence))
            .then_with(|| other.strength.total_cmp(&self.strength))
    }
}

impl PartialOrd for EvidenceOpinion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A canonically ordered set of opinions from one or more engines.
///
/// Empty is a valid state: a run with no winner contributes no opinions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    opinions: Vec<EvidenceOpinion>,
}

impl EvidenceSnapshot {
    /// Empty snapshot (no winner, no opinions).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, sorting opinions into canonical order.
    pub fn from_opinions(mut opinions: Vec<EvidenceOpinion>) -> Self {
        opinions.sort();
        Self { opinions }
    }

    /// Opinions in canonical order.
    pub fn opinions(&self) -> &[EvidenceOpinion] {
        &self.opinions
    }

    pub fn is_empty(&self) -> bool {
        self.opinions.is_empty()
    }

    /// Fold another engine's opinions in, preserving canonical order.
    pub fn merge(&mut self, other: EvidenceSnapshot) {
        self.opinions.extend(other.opinions);
        self.opinions.sort();
    }
}
