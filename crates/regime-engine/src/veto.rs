//! Veto rules: rule-driven disqualification of regimes from winning.
//!
//! Rules are independent, pure functions of (snapshot, unweighted scores).
//! Each may veto zero or more regimes with short, human-auditable reason
//! codes. The registry is built at startup and passed into the pipeline; there
//! is no global rule state, so test fixtures can swap rule sets freely.
//!
//! A regime absent from the veto list, or present with `vetoed = false`, is
//! simply not vetoed. Consumers must not assume every regime receives an
//! explicit entry.

use regime_common::{Regime, RegimeInputSnapshot};
use serde::{Deserialize, Serialize};

use crate::scoring::RegimeScore;

/// Funding z-score beyond which a squeeze claim is contradicted.
const FUNDING_CONTRA_THRESHOLD: f64 = 1.5;

/// Absorption score beyond which trend-building flow is considered absorbed.
const ABSORPTION_VETO_THRESHOLD: f64 = 1.5;

/// One rule's verdict on one regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VetoResult {
    pub regime: Regime,
    pub vetoed: bool,
    /// Reason codes, accumulated in rule-registration order.
    pub reasons: Vec<String>,
}

impl VetoResult {
    pub fn veto(regime: Regime, reason: &str) -> Self {
        Self {
            regime,
            vetoed: true,
            reasons: vec![reason.to_string()],
        }
    }

    /// Explicitly cleared: equivalent to the regime being absent entirely.
    pub fn clear(regime: Regime) -> Self {
        Self {
            regime,
            vetoed: false,
            reasons: Vec::new(),
        }
    }
}

/// A single veto rule. Implementations must be pure and order-independent in
/// effect.
pub trait VetoRule: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Inspect the snapshot and current scores; return zero or more verdicts.
    fn evaluate(&self, snapshot: &RegimeInputSnapshot, scores: &[RegimeScore]) -> Vec<VetoResult>;
}

/// A startup-constructed list of veto rules.
pub struct VetoRegistry {
    rules: Vec<Box<dyn VetoRule>>,
}

impl VetoRegistry {
    /// Empty registry (nothing is ever vetoed).
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registry with the built-in production rules.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FundingContraSqueezeRule));
        registry.register(Box::new(LiquidationDataRule));
        registry.register(Box::new(AbsorbedTrendRule));
        registry.register(Box::new(StaleContextRule));
        registry
    }

    /// Append a rule. Registration order determines reason accumulation order.
    pub fn register(&mut self, rule: Box<dyn VetoRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule and merge verdicts per regime.
    ///
    /// Multiple rules may target the same regime; their reasons accumulate in
    /// registration order, and any `vetoed = true` verdict keeps the regime
    /// vetoed. Output order is first-appearance order, so it is deterministic
    /// for a fixed registry.
    pub fn evaluate(
        &self,
        snapshot: &RegimeInputSnapshot,
        scores: &[RegimeScore],
    ) -> Vec<VetoResult> {
        let mut merged: Vec<VetoResult> = Vec::new();
        for rule in &self.rules {
            for verdict in rule.evaluate(snapshot, scores) {
                match merged.iter_mut().find(|m| m.regime == verdict.regime) {
                    Some(existing) => {
                        existing.vetoed |= verdict.vetoed;
                        existing.reasons.extend(verdict.reasons);
                    }
                    None => merged.push(verdict),
                }
            }
        }
        merged
    }
}

impl Default for VetoRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn score_for(scores: &[RegimeScore], regime: Regime) -> f64 {
    scores
        .iter()
        .find(|s| s.regime == regime)
        .map(|s| s.score)
        .unwrap_or(0.0)
}

/// A squeeze needs the crowd on the wrong side. Strongly positive funding
/// contradicts SQUEEZE_UP (shorts are not crowded); strongly negative funding
/// contradicts SQUEEZE_DOWN.
pub struct FundingContraSqueezeRule;

impl VetoRule for FundingContraSqueezeRule {
    fn name(&self) -> &'static str {
        "funding_contra_squeeze"
    }

    fn evaluate(&self, snapshot: &RegimeInputSnapshot, _scores: &[RegimeScore]) -> Vec<VetoResult> {
        let Some(funding) = snapshot.derivatives.funding_zscore.value() else {
            return Vec::new();
        };
        let mut verdicts = Vec::new();
        if funding > FUNDING_CONTRA_THRESHOLD {
            verdicts.push(VetoResult::veto(Regime::SqueezeUp, "FUNDING_CONTRA"));
        }
        if funding < -FUNDING_CONTRA_THRESHOLD {
            verdicts.push(VetoResult::veto(Regime::SqueezeDown, "FUNDING_CONTRA"));
        }
        verdicts
    }
}

/// A liquidation-cascade call without liquidation data is unfalsifiable; veto
/// the side whose notional reading is missing.
pub struct LiquidationDataRule;

impl VetoRule for LiquidationDataRule {
    fn name(&self) -> &'static str {
        "liquidation_data"
    }

    fn evaluate(&self, snapshot: &RegimeInputSnapshot, _scores: &[RegimeScore]) -> Vec<VetoResult> {
        let mut verdicts = Vec::new();
        if snapshot
            .derivatives
            .liquidation_notional_short
            .is_missing()
        {
            verdicts.push(VetoResult::veto(Regime::LiquidationUp, "LIQ_DATA_MISSING"));
        }
        if snapshot.derivatives.liquidation_notional_long.is_missing() {
            verdicts.push(VetoResult::veto(
                Regime::LiquidationDown,
                "LIQ_DATA_MISSING",
            ));
        }
        verdicts
    }
}

/// Trend-building flow that is being absorbed by passive liquidity is not
/// building a trend. Only fires when the trend scorer actually produced
/// signal, so a quiet tape cannot accumulate spurious vetoes.
pub struct AbsorbedTrendRule;

impl VetoRule for AbsorbedTrendRule {
    fn name(&self) -> &'static str {
        "absorbed_trend"
    }

    fn evaluate(&self, snapshot: &RegimeInputSnapshot, scores: &[RegimeScore]) -> Vec<VetoResult> {
        let Some(absorption) = snapshot.flow.absorption_score.value() else {
            return Vec::new();
        };
        if absorption <= ABSORPTION_VETO_THRESHOLD {
            return Vec::new();
        }
        let mut verdicts = Vec::new();
        if score_for(scores, Regime::TrendBuildUp) > 0.0 {
            verdicts.push(VetoResult::veto(Regime::TrendBuildUp, "TREND_ABSORBED"));
        }
        if score_for(scores, Regime::TrendBuildDown) > 0.0 {
            verdicts.push(VetoResult::veto(Regime::TrendBuildDown, "TREND_ABSORBED"));
        }
        verdicts
    }
}

/// Trend claims want cross-asset confirmation; with the entire context pillar
/// missing, veto the trend family.
pub struct StaleContextRule;

impl VetoRule for StaleContextRule {
    fn name(&self) -> &'static str {
        "stale_context"
    }

    fn evaluate(&self, snapshot: &RegimeInputSnapshot, _scores: &[RegimeScore]) -> Vec<VetoResult> {
        let ctx = &snapshot.context;
        let all_missing = ctx.leader_return.is_missing()
            && ctx.cross_asset_corr.is_missing()
            && ctx.risk_appetite.is_missing();
        if !all_missing {
            return Vec::new();
        }
        vec![
            VetoResult::veto(Regime::TrendBuildUp, "CONTEXT_STALE"),
            VetoResult::veto(Regime::TrendBuildDown, "CONTEXT_STALE"),
            VetoResult::veto(Regime::TrendExhaustion, "CONTEXT_STALE"),
        ]
    }
}
