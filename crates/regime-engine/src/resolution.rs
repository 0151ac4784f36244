//! Deterministic ranking and winner selection.
//!
//! Regimes are ranked by score descending; ties break by regime declaration
//! index ascending, so ranking is a total order and bit-identical across runs.
//! The winner is the highest-ranked non-vetoed regime, the runner-up the next
//! non-vetoed one. "Every regime vetoed" and "no scores at all" are valid
//! terminal states (winner = None), never errors.

use std::collections::BTreeSet;

use regime_common::Regime;
use serde::{Deserialize, Serialize};

use crate::scoring::RegimeScore;
use crate::veto::VetoResult;

/// Raw numeric inputs for confidence synthesis, populated only where the
/// underlying scores exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInputs {
    pub top_score: Option<f64>,
    pub runner_up_score: Option<f64>,
    /// top − runner-up; None unless both exist.
    pub score_spread: Option<f64>,
    /// Distinct contributor identifiers shared between winner and runner-up.
    pub contributor_overlap_count: Option<usize>,
}

/// Outcome of ranked resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Highest-ranked non-vetoed regime. None iff every regime is vetoed or
    /// no scores exist.
    pub winner: Option<RegimeScore>,
    /// Next non-vetoed regime after the winner. None iff fewer than two
    /// eligible regimes remain.
    pub runner_up: Option<RegimeScore>,
    /// Full ranking, vetoed regimes included, for audit.
    pub ranked: Vec<RegimeScore>,
    /// Veto verdicts as produced by the registry.
    pub vetoes: Vec<VetoResult>,
    pub confidence_inputs: ConfidenceInputs,
}

/// Rank scores by (score descending, declaration index ascending).
pub fn rank_scores(scores: &[RegimeScore]) -> Vec<RegimeScore> {
    let mut ranked = scores.to_vec();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.regime.index().cmp(&b.regime.index()))
    });
    ranked
}

fn vetoed_set(vetoes: &[VetoResult]) -> BTreeSet<Regime> {
    vetoes
        .iter()
        .filter(|v| v.vetoed)
        .map(|v| v.regime)
        .collect()
}

fn overlap_count(a: &RegimeScore, b: &RegimeScore) -> usize {
    let a_set: BTreeSet<&String> = a.contributors.iter().collect();
    let b_set: BTreeSet<&String> = b.contributors.iter().collect();
    a_set.intersection(&b_set).count()
}

/// Resolve winner and runner-up from scores and veto verdicts.
pub fn resolve(scores: &[RegimeScore], vetoes: &[VetoResult]) -> ResolutionResult {
    let ranked = rank_scores(scores);
    let vetoed = vetoed_set(vetoes);

    let mut eligible = ranked.iter().filter(|s| !vetoed.contains(&s.regime));
    let winner = eligible.next().cloned();
    let runner_up = eligible.next().cloned();

    let top_score = winner.as_ref().map(|w| w.score);
    let runner_up_score = runner_up.as_ref().map(|r| r.score);
    let score_spread = match (top_score, runner_up_score) {
        (Some(top), Some(run)) => Some(top - run),
        _ => None,
    };
    let contributor_overlap_count = match (&winner, &runner_up) {
        (Some(w), Some(r)) => Some(overlap_count(w, r)),
        _ => None,
    };

    ResolutionResult {
        winner,
        runner_up,
        ranked,
        vetoes: vetoes.to_vec(),
        confidence_inputs: ConfidenceInputs {
            top_score,
            runner_up_score,
            score_spread,
            contributor_overlap_count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(regime: Regime, value: f64, contributors: &[&str]) -> RegimeScore {
        RegimeScore {
            regime,
            score: value,
            contributors: contributors.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_ranking_is_score_descending() {
        let ranked = rank_scores(&[
            score(Regime::ChopBalanced, 0.2, &[]),
            score(Regime::SqueezeUp, 0.9, &[]),
            score(Regime::TrendBuildUp, 0.5, &[]),
        ]);
        let regimes: Vec<Regime> = ranked.iter().map(|s| s.regime).collect();
        assert_eq!(
            regimes,
            vec![Regime::SqueezeUp, Regime::TrendBuildUp, Regime::ChopBalanced]
        );
    }

    #[test]
    fn test_ties_break_by_declaration_index() {
        let ranked = rank_scores(&[
            score(Regime::TrendExhaustion, 0.5, &[]),
            score(Regime::ChopBalanced, 0.5, &[]),
            score(Regime::SqueezeDown, 0.5, &[]),
        ]);
        let regimes: Vec<Regime> = ranked.iter().map(|s| s.regime).collect();
        assert_eq!(
            regimes,
            vec![
                Regime::ChopBalanced,
                Regime::SqueezeDown,
                Regime::TrendExhaustion
            ]
        );
    }

    #[test]
    fn test_winner_skips_vetoed_regimes() {
        let scores = vec![
            score(Regime::SqueezeUp, 0.9, &[]),
            score(Regime::TrendBuildUp, 0.7, &[]),
            score(Regime::ChopBalanced, 0.3, &[]),
        ];
        let vetoes = vec![VetoResult::veto(Regime::SqueezeUp, "FUNDING_CONTRA")];

        let result = resolve(&scores, &vetoes);
        assert_eq!(result.winner.as_ref().unwrap().regime, Regime::TrendBuildUp);
        assert_eq!(
            result.runner_up.as_ref().unwrap().regime,
            Regime::ChopBalanced
        );
        // Audit ranking still contains the vetoed regime, ranked first.
        assert_eq!(result.ranked[0].regime, Regime::SqueezeUp);
    }

    #[test]
    fn test_all_vetoed_yields_no_winner() {
        let scores = vec![score(Regime::SqueezeUp, 0.9, &[])];
        let vetoes = vec![VetoResult::veto(Regime::SqueezeUp, "FUNDING_CONTRA")];

        let result = resolve(&scores, &vetoes);
        assert!(result.winner.is_none());
        assert!(result.runner_up.is_none());
        assert_eq!(result.confidence_inputs, ConfidenceInputs::default());
    }

    #[test]
    fn test_empty_scores_yield_no_winner_without_error() {
        let result = resolve(&[], &[]);
        assert!(result.winner.is_none());
        assert!(result.runner_up.is_none());
        assert!(result.ranked.is_empty());
    }

    #[test]
    fn test_single_eligible_regime_has_no_runner_up() {
        let scores = vec![score(Regime::ChopBalanced, 0.4, &[])];
        let result = resolve(&scores, &[]);
        assert!(result.winner.is_some());
        assert!(result.runner_up.is_none());
        assert_eq!(result.confidence_inputs.top_score, Some(0.4));
        assert_eq!(result.confidence_inputs.score_spread, None);
        assert_eq!(result.confidence_inputs.contributor_overlap_count, None);
    }

    #[test]
    fn test_confidence_inputs_derive_spread_and_overlap() {
        let scores = vec![
            score(
                Regime::TrendBuildUp,
                0.8,
                &["market.trend_slope", "flow.cvd_slope", "flow.cvd_slope"],
            ),
            score(
                Regime::LiquidationUp,
                0.5,
                &["flow.cvd_slope", "derivatives.liquidation_notional_short"],
            ),
        ];
        let result = resolve(&scores, &[]);
        let inputs = &result.confidence_inputs;
        assert_eq!(inputs.top_score, Some(0.8));
        assert_eq!(inputs.runner_up_score, Some(0.5));
        assert!((inputs.score_spread.unwrap() - 0.3).abs() < 1e-12);
        // Distinct shared identifiers: flow.cvd_slope only.
        assert_eq!(inputs.contributor_overlap_count, Some(1));
    }
}
