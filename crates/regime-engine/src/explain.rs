//! Explainability: the human-facing half of a classification.
//!
//! Translates the winner's contributors into driver labels, veto reasons into
//! invalidation labels, and attaches the regime's static permissions. Every
//! label table falls back to the verbatim identifier for unknown keys, keeps
//! first-seen order, and drops duplicates.
//!
//! Validation is all-at-once: a missing winner, empty drivers, empty
//! invalidations, and empty permissions are collected into a single error so
//! an operator sees the complete damage, not the first field that happened to
//! be checked.

use regime_common::Regime;
use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceResult;
use crate::resolution::ResolutionResult;
use crate::veto::VetoResult;

/// The final, fully explained classification for one (symbol, timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeOutput {
    pub symbol: String,
    pub timestamp_ms: i64,
    pub regime: Regime,
    /// Non-optional: outputs are only produced when a winner exists.
    pub confidence: f64,
    pub drivers: Vec<String>,
    pub invalidations: Vec<String>,
    pub permissions: Vec<String>,
}

/// Explainability incompleteness. Fatal: the pipeline aborts rather than
/// emitting a partially explained output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("explainability output incomplete: missing {}", missing.join(", "))]
pub struct ExplainabilityValidationError {
    /// Every missing field, not just the first.
    pub missing: Vec<&'static str>,
}

/// Human label for a contributor identifier, when one is on file.
fn contributor_label(contributor: &str) -> Option<&'static str> {
    let label = match contributor {
        "market.atr_zscore" => "Market ATR z-score",
        "market.range_expansion" => "Market range expansion",
        "market.trend_slope" => "Market trend slope",
        "market.vwap_deviation" => "Market VWAP deviation",
        "market.wick_asymmetry" => "Market wick asymmetry",
        "market.compression_ratio" => "Market range compression",
        "derivatives.funding_zscore" => "Funding rate z-score",
        "derivatives.open_interest_delta" => "Open interest delta",
        "derivatives.basis_zscore" => "Perp basis z-score",
        "derivatives.liquidation_notional_long" => "Long liquidation notional",
        "derivatives.liquidation_notional_short" => "Short liquidation notional",
        "flow.cvd_slope" => "Flow CVD slope",
        "flow.aggressor_imbalance" => "Taker aggressor imbalance",
        "flow.absorption_score" => "Passive absorption",
        "flow.bid_depth_ratio" => "Bid depth ratio",
        "context.leader_return" => "Leader return",
        "context.cross_asset_corr" => "Cross-asset correlation",
        "context.risk_appetite" => "Risk appetite",
        _ => return None,
    };
    Some(label)
}

/// Human label for a veto reason code, when one is on file.
fn reason_label(reason: &str) -> Option<&'static str> {
    let label = match reason {
        "FUNDING_CONTRA" => "Funding positioned against the squeeze",
        "LIQ_DATA_MISSING" => "Liquidation data missing",
        "TREND_ABSORBED" => "Trend flow absorbed by passive liquidity",
        "CONTEXT_STALE" => "Cross-asset context stale",
        _ => return None,
    };
    Some(label)
}

/// Baseline conditions that would invalidate each regime call. These keep the
/// invalidation list non-empty by construction; veto-derived labels are
/// appended after them.
fn baseline_invalidations(regime: Regime) -> &'static [&'static str] {
    match regime {
        Regime::ChopBalanced => &["Range expansion beyond the compression band"],
        Regime::ChopStophunt => &["Follow-through beyond the swept level"],
        Regime::LiquidationUp => &["Short liquidation flow drying up"],
        Regime::LiquidationDown => &["Long liquidation flow drying up"],
        Regime::SqueezeUp => &["Funding normalizing", "Open interest rebuilding"],
        Regime::SqueezeDown => &["Funding normalizing", "Open interest rebuilding"],
        Regime::TrendBuildUp => &["CVD slope reversal", "Open interest unwind"],
        Regime::TrendBuildDown => &["CVD slope reversal", "Open interest unwind"],
        Regime::TrendExhaustion => &["Fresh impulse in the trend direction"],
    }
}

fn push_unique(out: &mut Vec<String>, label: String) {
    if !out.contains(&label) {
        out.push(label);
    }
}

/// Map contributors to driver labels: first-seen order, duplicates dropped,
/// verbatim fallback for identifiers not in the table.
pub fn drivers_from_contributors<S: AsRef<str>>(contributors: &[S]) -> Vec<String> {
    let mut drivers = Vec::new();
    for contributor in contributors {
        let contributor = contributor.as_ref();
        let label = contributor_label(contributor)
            .map(str::to_string)
            .unwrap_or_else(|| contributor.to_string());
        push_unique(&mut drivers, label);
    }
    drivers
}

/// Invalidation labels for a winning regime: the regime's static baseline,
/// then every reason from every vetoed regime, mapped with the same
/// fallback/dedup/order rules as drivers.
pub fn invalidations_from_vetoes(winner: Regime, vetoes: &[VetoResult]) -> Vec<String> {
    let mut invalidations: Vec<String> = baseline_invalidations(winner)
        .iter()
        .map(|s| s.to_string())
        .collect();
    for veto in vetoes.iter().filter(|v| v.vetoed) {
        for reason in &veto.reasons {
            let label = reason_label(reason)
                .map(str::to_string)
                .unwrap_or_else(|| reason.clone());
            push_unique(&mut invalidations, label);
        }
    }
    invalidations
}

/// Static per-regime permission list. Currently the regime's own name; the
/// extension point for future multi-permission regimes.
pub fn permissions_for_regime(regime: Regime) -> Vec<String> {
    vec![regime.as_str().to_string()]
}

/// Validate the four mandatory output parts, collecting every missing field.
pub fn validate_output_parts(
    winner: Option<Regime>,
    drivers: &[String],
    invalidations: &[String],
    permissions: &[String],
) -> Result<(), ExplainabilityValidationError> {
    let mut missing = Vec::new();
    if winner.is_none() {
        missing.push("winner");
    }
    if drivers.is_empty() {
        missing.push("drivers");
    }
    if invalidations.is_empty() {
        missing.push("invalidations");
    }
    if permissions.is_empty() {
        missing.push("permissions");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExplainabilityValidationError { missing })
    }
}

/// Assemble and validate the final output for a resolved winner.
pub fn build_output(
    symbol: &str,
    timestamp_ms: i64,
    resolution: &ResolutionResult,
    confidence: &ConfidenceResult,
) -> Result<RegimeOutput, ExplainabilityValidationError> {
    let winner = resolution.winner.as_ref();
    let drivers = winner
        .map(|w| drivers_from_contributors(&w.contributors))
        .unwrap_or_default();
    let invalidations = winner
        .map(|w| invalidations_from_vetoes(w.regime, &resolution.vetoes))
        .unwrap_or_default();
    let permissions = winner
        .map(|w| permissions_for_regime(w.regime))
        .unwrap_or_default();

    validate_output_parts(
        winner.map(|w| w.regime),
        &drivers,
        &invalidations,
        &permissions,
    )?;

    // The no-winner case failed validation above; confidence is guaranteed
    // present whenever a winner exists.
    let winner = winner.expect("validated winner");
    Ok(RegimeOutput {
        symbol: symbol.to_string(),
        timestamp_ms,
        regime: winner.regime,
        confidence: confidence.confidence.unwrap_or(0.0),
        drivers,
        invalidations,
        permissions,
    })
}
