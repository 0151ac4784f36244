//! Confidence synthesis from score spread, pillar agreement, and vetoes.
//!
//! Three caller-supplied numeric transforms shape the synthesis, so tuning
//! lives outside this stage:
//! - spread → [0, 1] contribution
//! - pillar agreement ratio → [0, 1] contribution
//! - veto presence → scalar multiplier
//!
//! Inputs are clamped to [0, 1] before hitting a transform and the combined
//! result is clamped again, keeping confidence bounded regardless of the
//! transforms plugged in. Confidence is None exactly when there is no winner;
//! it is never a sentinel zero.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::resolution::ResolutionResult;
use crate::scoring::RegimeScore;

/// Pillar namespaces the engine recognizes. Anything else is `unknown` and is
/// excluded from agreement math.
pub const KNOWN_PILLARS: [&str; 4] = ["market", "derivatives", "flow", "context"];

/// Pillar prefix of a dotted contributor identifier.
pub fn pillar_of(contributor: &str) -> &str {
    match contributor.split_once('.') {
        Some((pillar, _)) if KNOWN_PILLARS.contains(&pillar) => pillar,
        _ => "unknown",
    }
}

/// Cross-pillar agreement between winner and runner-up contributors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PillarAgreement {
    pub winner_pillars: BTreeSet<String>,
    pub runner_up_pillars: Option<BTreeSet<String>>,
    /// |winner ∩ runner-up| excluding `unknown`; None without a runner-up.
    pub overlap_count: Option<usize>,
    /// |winner ∪ runner-up| excluding `unknown`; None without a runner-up.
    pub union_count: Option<usize>,
    /// overlap / union; 0.0 on an empty union, None without a runner-up.
    pub overlap_ratio: Option<f64>,
}

fn pillar_set(score: &RegimeScore) -> BTreeSet<String> {
    score
        .contributors
        .iter()
        .map(|c| pillar_of(c).to_string())
        .collect()
}

impl PillarAgreement {
    /// Derive agreement from resolved winner/runner-up contributor sets.
    pub fn from_resolution(
        winner: Option<&RegimeScore>,
        runner_up: Option<&RegimeScore>,
    ) -> Self {
        let winner_pillars = winner.map(pillar_set).unwrap_or_default();
        let runner_up_pillars = runner_up.map(pillar_set);

        let (overlap_count, union_count, overlap_ratio) = match &runner_up_pillars {
            Some(runner) => {
                let known_winner: BTreeSet<&String> = winner_pillars
                    .iter()
                    .filter(|p| p.as_str() != "unknown")
                    .collect();
                let known_runner: BTreeSet<&String> =
                    runner.iter().filter(|p| p.as_str() != "unknown").collect();
                let overlap = known_winner.intersection(&known_runner).count();
                let union = known_winner.union(&known_runner).count();
                let ratio = if union == 0 {
                    0.0
                } else {
                    overlap as f64 / union as f64
                };
                (Some(overlap), Some(union), Some(ratio))
            }
            None => (None, None, None),
        };

        Self {
            winner_pillars,
            runner_up_pillars,
            overlap_count,
            union_count,
            overlap_ratio,
        }
    }
}

/// Component values that fed the final confidence, for audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub score_spread: Option<f64>,
    pub pillar_overlap_ratio: Option<f64>,
    pub veto_present: bool,
}

/// Synthesized confidence. `confidence` is None iff the resolution had no
/// winner; this is a hard invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub confidence: Option<f64>,
    pub breakdown: ConfidenceBreakdown,
    pub agreement: PillarAgreement,
}

/// Pluggable numeric transforms for confidence synthesis.
pub struct ConfidenceTransforms {
    /// Clamped score spread → [0, 1] contribution.
    pub spread: Box<dyn Fn(f64) -> f64 + Send + Sync>,
    /// Clamped pillar agreement ratio → [0, 1] contribution.
    pub pillar: Box<dyn Fn(f64) -> f64 + Send + Sync>,
    /// Veto presence → scalar multiplier.
    pub veto: Box<dyn Fn(bool) -> f64 + Send + Sync>,
    /// Relative weight of the spread contribution vs. the pillar contribution.
    pub spread_weight: f64,
}

impl ConfidenceTransforms {
    /// Production defaults: a spread of 0.25 score units is fully decisive,
    /// agreement passes through untouched, any veto shaves 15%.
    pub fn standard() -> Self {
        Self {
            spread: Box::new(|s| (s * 4.0).clamp(0.0, 1.0)),
            pillar: Box::new(|r| r),
            veto: Box::new(|present| if present { 0.85 } else { 1.0 }),
            spread_weight: 0.6,
        }
    }
}

impl Default for ConfidenceTransforms {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ConfidenceTransforms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidenceTransforms")
            .field("spread_weight", &self.spread_weight)
            .finish_non_exhaustive()
    }
}

#[inline]
fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Combine spread, pillar agreement, and veto presence into one confidence.
pub fn synthesize_confidence(
    resolution: &ResolutionResult,
    transforms: &ConfidenceTransforms,
) -> ConfidenceResult {
    let veto_present = resolution.vetoes.iter().any(|v| v.vetoed);
    let agreement = PillarAgreement::from_resolution(
        resolution.winner.as_ref(),
        resolution.runner_up.as_ref(),
    );

    if resolution.winner.is_none() {
        return ConfidenceResult {
            confidence: None,
            breakdown: ConfidenceBreakdown {
                score_spread: None,
                pillar_overlap_ratio: None,
                veto_present,
            },
            agreement,
        };
    }

    let inputs = &resolution.confidence_inputs;

    // With no runner-up there is no competition: the spread input falls back
    // to the winner's own score, and pillar agreement is treated as full.
    let spread_in = inputs
        .score_spread
        .or(inputs.top_score)
        .unwrap_or(0.0);
    let pillar_in = agreement.overlap_ratio.unwrap_or(1.0);

    let spread_component = clamp01((transforms.spread)(clamp01(spread_in)));
    let pillar_component = clamp01((transforms.pillar)(clamp01(pillar_in)));
    let veto_multiplier = (transforms.veto)(veto_present);

    let w = transforms.spread_weight.clamp(0.0, 1.0);
    let combined = w * spread_component + (1.0 - w) * pillar_component;
    let confidence = clamp01(combined * veto_multiplier);

    ConfidenceResult {
        confidence: Some(confidence),
        breakdown: ConfidenceBreakdown {
            score_spread: inputs.score_spread,
            pillar_overlap_ratio: agreement.overlap_ratio,
            veto_present,
        },
        agreement,
    }
}
