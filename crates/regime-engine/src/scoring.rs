//! Per-regime scoring from a feature snapshot.
//!
//! Each regime has exactly one scorer: a pure function of snapshot fields that
//! is independent of every other regime's score. A scorer reports every feature
//! it consulted, in consultation order, as dotted `pillar.feature` contributor
//! identifiers.
//!
//! Missing inputs propagate: when a load-bearing feature carries the explicit
//! missing marker the scorer abstains (score 0) instead of substituting a
//! numeric default. The consulted identifiers are still reported so the gap is
//! auditable downstream.
//!
//! ## Factor map
//!
//! | Regime            | Load-bearing factors                                   |
//! |-------------------|--------------------------------------------------------|
//! | CHOP_BALANCED     | low ATR, flat slope, compression, balanced takers      |
//! | CHOP_STOPHUNT     | wick asymmetry, absorption, small VWAP deviation       |
//! | LIQUIDATION_UP    | short-liquidation notional, CVD up, ATR burst          |
//! | LIQUIDATION_DOWN  | long-liquidation notional, CVD down, ATR burst         |
//! | SQUEEZE_UP        | compression → upward expansion, crowded shorts, OI out |
//! | SQUEEZE_DOWN      | compression → downward expansion, crowded longs        |
//! | TREND_BUILD_UP    | slope, CVD, OI inflow, taker buys, leader confirm      |
//! | TREND_BUILD_DOWN  | mirrored                                               |
//! | TREND_EXHAUSTION  | stretched slope met by absorption and CVD divergence   |

use regime_common::{FeatureValue, Regime, RegimeInputSnapshot};
use serde::{Deserialize, Serialize};

/// A regime's score plus the features that drove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeScore {
    pub regime: Regime,
    pub score: f64,
    /// Dotted `pillar.feature` identifiers, in consultation order. Duplicates
    /// are collapsed downstream (explainability), not here.
    pub contributors: Vec<String>,
}

impl RegimeScore {
    fn abstain(regime: Regime, contributors: Vec<String>) -> Self {
        Self {
            regime,
            score: 0.0,
            contributors,
        }
    }
}

/// Records each feature read so contributor order mirrors consultation order.
struct FeatureProbe {
    contributors: Vec<String>,
}

impl FeatureProbe {
    fn new() -> Self {
        Self {
            contributors: Vec::new(),
        }
    }

    fn read(&mut self, id: &str, value: FeatureValue) -> Option<f64> {
        self.contributors.push(id.to_string());
        value.value()
    }

    fn finish(self, regime: Regime, score: Option<f64>) -> RegimeScore {
        match score {
            Some(score) => RegimeScore {
                regime,
                score: clamp01(score),
                contributors: self.contributors,
            },
            None => RegimeScore::abstain(regime, self.contributors),
        }
    }
}

#[inline]
fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Positive part, clamped to [0, 1].
#[inline]
fn pos01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Score every regime. Returns exactly one entry per variant, in declaration
/// order.
pub fn score_all(snapshot: &RegimeInputSnapshot) -> Vec<RegimeScore> {
    vec![
        score_chop_balanced(snapshot),
        score_chop_stophunt(snapshot),
        score_liquidation_up(snapshot),
        score_liquidation_down(snapshot),
        score_squeeze_up(snapshot),
        score_squeeze_down(snapshot),
        score_trend_build_up(snapshot),
        score_trend_build_down(snapshot),
        score_trend_exhaustion(snapshot),
    ]
}

fn score_chop_balanced(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let atr = probe.read("market.atr_zscore", snapshot.market.atr_zscore);
    let slope = probe.read("market.trend_slope", snapshot.market.trend_slope);
    let compression = probe.read("market.compression_ratio", snapshot.market.compression_ratio);
    let imbalance = probe.read("flow.aggressor_imbalance", snapshot.flow.aggressor_imbalance);

    let score = match (atr, slope, compression, imbalance) {
        (Some(atr), Some(slope), Some(compression), Some(imbalance)) => Some(
            0.35 * (1.0 - pos01(atr))
                + 0.25 * (1.0 - clamp01(slope.abs()))
                + 0.25 * clamp01(compression)
                + 0.15 * (1.0 - clamp01(imbalance.abs())),
        ),
        _ => None,
    };
    probe.finish(Regime::ChopBalanced, score)
}

fn score_chop_stophunt(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let wick = probe.read("market.wick_asymmetry", snapshot.market.wick_asymmetry);
    let absorption = probe.read("flow.absorption_score", snapshot.flow.absorption_score);
    let vwap = probe.read("market.vwap_deviation", snapshot.market.vwap_deviation);

    let score = match (wick, absorption, vwap) {
        (Some(wick), Some(absorption), Some(vwap)) => Some(
            0.40 * clamp01(wick.abs())
                + 0.35 * clamp01(absorption)
                + 0.25 * (1.0 - clamp01(vwap.abs())),
        ),
        _ => None,
    };
    probe.finish(Regime::ChopStophunt, score)
}

fn score_liquidation_up(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let liq_short = probe.read(
        "derivatives.liquidation_notional_short",
        snapshot.derivatives.liquidation_notional_short,
    );
    let cvd = probe.read("flow.cvd_slope", snapshot.flow.cvd_slope);
    let atr = probe.read("market.atr_zscore", snapshot.market.atr_zscore);

    let score = match (liq_short, cvd, atr) {
        (Some(liq_short), Some(cvd), Some(atr)) => Some(
            0.45 * clamp01(liq_short) + 0.30 * pos01(cvd) + 0.25 * pos01(atr - 1.0),
        ),
        _ => None,
    };
    probe.finish(Regime::LiquidationUp, score)
}

fn score_liquidation_down(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let liq_long = probe.read(
        "derivatives.liquidation_notional_long",
        snapshot.derivatives.liquidation_notional_long,
    );
    let cvd = probe.read("flow.cvd_slope", snapshot.flow.cvd_slope);
    let atr = probe.read("market.atr_zscore", snapshot.market.atr_zscore);

    let score = match (liq_long, cvd, atr) {
        (Some(liq_long), Some(cvd), Some(atr)) => Some(
            0.45 * clamp01(liq_long) + 0.30 * pos01(-cvd) + 0.25 * pos01(atr - 1.0),
        ),
        _ => None,
    };
    probe.finish(Regime::LiquidationDown, score)
}

fn score_squeeze_up(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let compression = probe.read("market.compression_ratio", snapshot.market.compression_ratio);
    let expansion = probe.read("market.range_expansion", snapshot.market.range_expansion);
    let funding = probe.read("derivatives.funding_zscore", snapshot.derivatives.funding_zscore);
    let oi_delta = probe.read(
        "derivatives.open_interest_delta",
        snapshot.derivatives.open_interest_delta,
    );

    let score = match (compression, expansion, funding, oi_delta) {
        (Some(compression), Some(expansion), Some(funding), Some(oi_delta)) => Some(
            // Crowded shorts covering: negative funding, OI draining out.
            0.30 * clamp01(compression)
                + 0.30 * pos01(expansion)
                + 0.20 * pos01(-funding)
                + 0.20 * pos01(-oi_delta),
        ),
        _ => None,
    };
    probe.finish(Regime::SqueezeUp, score)
}

fn score_squeeze_down(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let compression = probe.read("market.compression_ratio", snapshot.market.compression_ratio);
    let expansion = probe.read("market.range_expansion", snapshot.market.range_expansion);
    let funding = probe.read("derivatives.funding_zscore", snapshot.derivatives.funding_zscore);
    let oi_delta = probe.read(
        "derivatives.open_interest_delta",
        snapshot.derivatives.open_interest_delta,
    );

    let score = match (compression, expansion, funding, oi_delta) {
        (Some(compression), Some(expansion), Some(funding), Some(oi_delta)) => Some(
            0.30 * clamp01(compression)
                + 0.30 * pos01(-expansion)
                + 0.20 * pos01(funding)
                + 0.20 * pos01(-oi_delta),
        ),
        _ => None,
    };
    probe.finish(Regime::SqueezeDown, score)
}

fn score_trend_build_up(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let slope = probe.read("market.trend_slope", snapshot.market.trend_slope);
    let cvd = probe.read("flow.cvd_slope", snapshot.flow.cvd_slope);
    let oi_delta = probe.read(
        "derivatives.open_interest_delta",
        snapshot.derivatives.open_interest_delta,
    );
    let imbalance = probe.read("flow.aggressor_imbalance", snapshot.flow.aggressor_imbalance);
    // Context confirmation is optional: a missing leader reading weakens the
    // score but does not force an abstain.
    let leader = probe.read("context.leader_return", snapshot.context.leader_return);

    let score = match (slope, cvd, oi_delta, imbalance) {
        (Some(slope), Some(cvd), Some(oi_delta), Some(imbalance)) => Some(
            0.30 * pos01(slope)
                + 0.25 * pos01(cvd)
                + 0.20 * pos01(oi_delta)
                + 0.15 * pos01(imbalance)
                + 0.10 * leader.map(pos01).unwrap_or(0.0),
        ),
        _ => None,
    };
    probe.finish(Regime::TrendBuildUp, score)
}

fn score_trend_build_down(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let slope = probe.read("market.trend_slope", snapshot.market.trend_slope);
    let cvd = probe.read("flow.cvd_slope", snapshot.flow.cvd_slope);
    let oi_delta = probe.read(
        "derivatives.open_interest_delta",
        snapshot.derivatives.open_interest_delta,
    );
    let imbalance = probe.read("flow.aggressor_imbalance", snapshot.flow.aggressor_imbalance);
    let leader = probe.read("context.leader_return", snapshot.context.leader_return);

    let score = match (slope, cvd, oi_delta, imbalance) {
        (Some(slope), Some(cvd), Some(oi_delta), Some(imbalance)) => Some(
            0.30 * pos01(-slope)
                + 0.25 * pos01(-cvd)
                + 0.20 * pos01(oi_delta)
                + 0.15 * pos01(-imbalance)
                + 0.10 * leader.map(|l| pos01(-l)).unwrap_or(0.0),
        ),
        _ => None,
    };
    probe.finish(Regime::TrendBuildDown, score)
}

fn score_trend_exhaustion(snapshot: &RegimeInputSnapshot) -> RegimeScore {
    let mut probe = FeatureProbe::new();
    let slope = probe.read("market.trend_slope", snapshot.market.trend_slope);
    let absorption = probe.read("flow.absorption_score", snapshot.flow.absorption_score);
    let cvd = probe.read("flow.cvd_slope", snapshot.flow.cvd_slope);
    let basis = probe.read("derivatives.basis_zscore", snapshot.derivatives.basis_zscore);

    let score = match (slope, absorption, cvd, basis) {
        (Some(slope), Some(absorption), Some(cvd), Some(basis)) => {
            // CVD pushing against a stretched slope is the divergence signal.
            let divergence = if slope == 0.0 {
                0.0
            } else {
                pos01(-(slope.signum() * cvd))
            };
            Some(
                0.30 * clamp01(slope.abs())
                    + 0.30 * clamp01(absorption)
                    + 0.25 * divergence
                    + 0.15 * pos01(basis.abs() - 1.0),
            )
        }
        _ => None,
    };
    probe.finish(Regime::TrendExhaustion, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_common::{
        ContextFeatures, DerivativesFeatures, FlowFeatures, MarketFeatures, WINDOW_MS,
    };

    fn snapshot_with(
        market: MarketFeatures,
        derivatives: DerivativesFeatures,
        flow: FlowFeatures,
        context: ContextFeatures,
    ) -> RegimeInputSnapshot {
        RegimeInputSnapshot::new("BTCUSDT", WINDOW_MS, market, derivatives, flow, context).unwrap()
    }

    fn dense_snapshot() -> RegimeInputSnapshot {
        snapshot_with(
            MarketFeatures {
                atr_zscore: 0.4.into(),
                range_expansion: 0.1.into(),
                trend_slope: 0.05.into(),
                vwap_deviation: 0.2.into(),
                wick_asymmetry: 0.1.into(),
                compression_ratio: 0.8.into(),
            },
            DerivativesFeatures {
                funding_zscore: 0.1.into(),
                open_interest_delta: 0.0.into(),
                basis_zscore: 0.2.into(),
                liquidation_notional_long: 0.0.into(),
                liquidation_notional_short: 0.0.into(),
            },
            FlowFeatures {
                cvd_slope: 0.05.into(),
                aggressor_imbalance: 0.05.into(),
                absorption_score: 0.2.into(),
                bid_depth_ratio: 1.0.into(),
            },
            ContextFeatures {
                leader_return: 0.0.into(),
                cross_asset_corr: 0.5.into(),
                risk_appetite: 0.1.into(),
            },
        )
    }

    #[test]
    fn test_score_all_covers_every_regime_in_declaration_order() {
        let scores = score_all(&dense_snapshot());
        assert_eq!(scores.len(), 9);
        for (i, score) in scores.iter().enumerate() {
            assert_eq!(score.regime.index(), i);
        }
    }

    #[test]
    fn test_scores_are_clamped_to_unit_interval() {
        let scores = score_all(&dense_snapshot());
        for score in scores {
            assert!(
                (0.0..=1.0).contains(&score.score),
                "{} out of range: {}",
                score.regime,
                score.score
            );
        }
    }

    #[test]
    fn test_missing_required_feature_abstains_with_zero() {
        // Everything missing: every scorer must abstain, never default.
        let snapshot = RegimeInputSnapshot::empty("BTCUSDT", WINDOW_MS).unwrap();
        for score in score_all(&snapshot) {
            assert_eq!(score.score, 0.0, "{} did not abstain", score.regime);
            assert!(!score.contributors.is_empty());
        }
    }

    #[test]
    fn test_contributors_follow_consultation_order() {
        let scores = score_all(&dense_snapshot());
        let chop = &scores[Regime::ChopBalanced.index()];
        assert_eq!(
            chop.contributors,
            vec![
                "market.atr_zscore",
                "market.trend_slope",
                "market.compression_ratio",
                "flow.aggressor_imbalance",
            ]
        );
    }

    #[test]
    fn test_quiet_compressed_market_favors_chop_balanced() {
        let scores = score_all(&dense_snapshot());
        let ranked_top = scores
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert_eq!(ranked_top.regime, Regime::ChopBalanced);
    }

    #[test]
    fn test_short_liquidation_cascade_scores_liquidation_up() {
        let snapshot = snapshot_with(
            MarketFeatures {
                atr_zscore: 2.5.into(),
                trend_slope: 0.8.into(),
                ..Default::default()
            },
            DerivativesFeatures {
                liquidation_notional_short: 0.9.into(),
                liquidation_notional_long: 0.05.into(),
                ..Default::default()
            },
            FlowFeatures {
                cvd_slope: 0.7.into(),
                ..Default::default()
            },
            ContextFeatures::default(),
        );

        let scores = score_all(&snapshot);
        let liq_up = &scores[Regime::LiquidationUp.index()];
        let liq_down = &scores[Regime::LiquidationDown.index()];
        assert!(liq_up.score > 0.7);
        assert!(liq_up.score > liq_down.score);
    }

    #[test]
    fn test_trend_build_up_tolerates_missing_context() {
        let snapshot = snapshot_with(
            MarketFeatures {
                trend_slope: 0.9.into(),
                ..Default::default()
            },
            DerivativesFeatures {
                open_interest_delta: 0.6.into(),
                ..Default::default()
            },
            FlowFeatures {
                cvd_slope: 0.8.into(),
                aggressor_imbalance: 0.5.into(),
                ..Default::default()
            },
            ContextFeatures::default(),
        );

        let score = &score_all(&snapshot)[Regime::TrendBuildUp.index()];
        // Leader reading missing: term contributes nothing but the scorer
        // still produces a score, and the gap stays auditable.
        assert!(score.score > 0.5);
        assert!(score
            .contributors
            .iter()
            .any(|c| c == "context.leader_return"));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let snapshot = dense_snapshot();
        assert_eq!(score_all(&snapshot), score_all(&snapshot));
    }
}
