//! Core types shared across the regime engine.
//!
//! CRITICAL: every snapshot feature is a `FeatureValue`, never a bare number.
//! A missing input must stay visibly missing all the way through the pipeline;
//! consumers treat it as "cannot compute", not as zero.

use serde::{Deserialize, Serialize};

/// Fixed classification window in milliseconds.
///
/// Snapshot timestamps must be exact multiples of this value. The feed builder
/// owns alignment; the validated constructor here is the last line of defense.
pub const WINDOW_MS: i64 = 180_000;

/// One of nine mutually exclusive market-condition classifications.
///
/// Declaration order is a stable tie-break key for score ranking and for the
/// canonical evidence ordering. Never reorder variants without a version bump.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    ChopBalanced,
    ChopStophunt,
    LiquidationUp,
    LiquidationDown,
    SqueezeUp,
    SqueezeDown,
    TrendBuildUp,
    TrendBuildDown,
    TrendExhaustion,
}

impl Regime {
    /// All regimes in declaration order.
    pub const ALL: [Regime; 9] = [
        Regime::ChopBalanced,
        Regime::ChopStophunt,
        Regime::LiquidationUp,
        Regime::LiquidationDown,
        Regime::SqueezeUp,
        Regime::SqueezeDown,
        Regime::TrendBuildUp,
        Regime::TrendBuildDown,
        Regime::TrendExhaustion,
    ];

    /// Declaration index, used as the ranking tie-break.
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Wire/display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::ChopBalanced => "CHOP_BALANCED",
            Regime::ChopStophunt => "CHOP_STOPHUNT",
            Regime::LiquidationUp => "LIQUIDATION_UP",
            Regime::LiquidationDown => "LIQUIDATION_DOWN",
            Regime::SqueezeUp => "SQUEEZE_UP",
            Regime::SqueezeDown => "SQUEEZE_DOWN",
            Regime::TrendBuildUp => "TREND_BUILD_UP",
            Regime::TrendBuildDown => "TREND_BUILD_DOWN",
            Regime::TrendExhaustion => "TREND_EXHAUSTION",
        }
    }

    /// Parse a wire name back into a regime.
    pub fn from_str(s: &str) -> Option<Self> {
        Regime::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A snapshot feature: a real value or an explicit "missing" marker.
///
/// Missing is never conflated with zero. Feature accessors return
/// `Option<f64>` so scorers are forced to handle the gap.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum FeatureValue {
    Value(f64),
    #[default]
    Missing,
}

impl FeatureValue {
    /// The value, if present.
    #[inline]
    pub fn value(&self) -> Option<f64> {
        match self {
            FeatureValue::Value(v) => Some(*v),
            FeatureValue::Missing => None,
        }
    }

    /// Whether the feature is the explicit missing marker.
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Value(v)
    }
}

impl From<Option<f64>> for FeatureValue {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) => FeatureValue::Value(v),
            None => FeatureValue::Missing,
        }
    }
}

impl From<FeatureValue> for Option<f64> {
    fn from(v: FeatureValue) -> Self {
        v.value()
    }
}

/// Price/volatility structure features.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketFeatures {
    /// ATR z-score vs. trailing baseline.
    pub atr_zscore: FeatureValue,
    /// Signed range expansion vs. the prior window (positive = up).
    pub range_expansion: FeatureValue,
    /// Normalized close-to-close trend slope.
    pub trend_slope: FeatureValue,
    /// Deviation of last price from session VWAP, in ATR units.
    pub vwap_deviation: FeatureValue,
    /// Signed wick asymmetry (positive = long lower wicks).
    pub wick_asymmetry: FeatureValue,
    /// Range compression ratio vs. trailing windows (1.0 = fully compressed).
    pub compression_ratio: FeatureValue,
}

/// Perp/derivatives positioning features.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivativesFeatures {
    /// Funding rate z-score (positive = longs paying).
    pub funding_zscore: FeatureValue,
    /// Normalized open-interest delta over the window.
    pub open_interest_delta: FeatureValue,
    /// Perp-spot basis z-score.
    pub basis_zscore: FeatureValue,
    /// Normalized long-liquidation notional over the window.
    pub liquidation_notional_long: FeatureValue,
    /// Normalized short-liquidation notional over the window.
    pub liquidation_notional_short: FeatureValue,
}

/// Order-flow features.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowFeatures {
    /// Cumulative volume delta slope over the window.
    pub cvd_slope: FeatureValue,
    /// Taker aggressor imbalance (-1..+1, positive = buy pressure).
    pub aggressor_imbalance: FeatureValue,
    /// Passive absorption score (high = aggressive flow absorbed).
    pub absorption_score: FeatureValue,
    /// Bid/ask resting depth ratio.
    pub bid_depth_ratio: FeatureValue,
}

/// Cross-asset context features.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextFeatures {
    /// Market-leader return over the window, in ATR units.
    pub leader_return: FeatureValue,
    /// Rolling cross-asset correlation (-1..+1).
    pub cross_asset_corr: FeatureValue,
    /// Composite risk-appetite gauge (-1..+1).
    pub risk_appetite: FeatureValue,
}

/// Input contract violations for snapshot construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("timestamp {timestamp_ms} is not a multiple of the {WINDOW_MS}ms window")]
    MisalignedTimestamp { timestamp_ms: i64 },

    #[error("snapshot symbol is empty")]
    EmptySymbol,
}

/// Raw wire form of a snapshot, pre-validation.
#[derive(Debug, Clone, Deserialize)]
struct RawRegimeInputSnapshot {
    symbol: String,
    timestamp_ms: i64,
    #[serde(default)]
    market: MarketFeatures,
    #[serde(default)]
    derivatives: DerivativesFeatures,
    #[serde(default)]
    flow: FlowFeatures,
    #[serde(default)]
    context: ContextFeatures,
}

/// Immutable per-(symbol, timestamp) input to the classifier.
///
/// Constructed only through [`RegimeInputSnapshot::new`], which enforces the
/// window-alignment contract. Deserialization goes through the same gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRegimeInputSnapshot")]
pub struct RegimeInputSnapshot {
    symbol: String,
    timestamp_ms: i64,
    pub market: MarketFeatures,
    pub derivatives: DerivativesFeatures,
    pub flow: FlowFeatures,
    pub context: ContextFeatures,
}

impl RegimeInputSnapshot {
    /// Create a validated snapshot.
    pub fn new(
        symbol: impl Into<String>,
        timestamp_ms: i64,
        market: MarketFeatures,
        derivatives: DerivativesFeatures,
        flow: FlowFeatures,
        context: ContextFeatures,
    ) -> Result<Self, SnapshotError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(SnapshotError::EmptySymbol);
        }
        if timestamp_ms % WINDOW_MS != 0 {
            return Err(SnapshotError::MisalignedTimestamp { timestamp_ms });
        }
        Ok(Self {
            symbol,
            timestamp_ms,
            market,
            derivatives,
            flow,
            context,
        })
    }

    /// Snapshot with every feature missing, for sparse feeds and tests.
    pub fn empty(symbol: impl Into<String>, timestamp_ms: i64) -> Result<Self, SnapshotError> {
        Self::new(
            symbol,
            timestamp_ms,
            MarketFeatures::default(),
            DerivativesFeatures::default(),
            FlowFeatures::default(),
            ContextFeatures::default(),
        )
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

impl TryFrom<RawRegimeInputSnapshot> for RegimeInputSnapshot {
    type Error = SnapshotError;

    fn try_from(raw: RawRegimeInputSnapshot) -> Result<Self, Self::Error> {
        RegimeInputSnapshot::new(
            raw.symbol,
            raw.timestamp_ms,
            raw.market,
            raw.derivatives,
            raw.flow,
            raw.context,
        )
    }
}
