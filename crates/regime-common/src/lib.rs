//! Shared contracts for the regime classification engine.
//!
//! This crate contains:
//! - The closed `Regime` enum (declaration order is a stable tie-break key)
//! - The explicit-missing `FeatureValue` sentinel
//! - Immutable input snapshot records (market, derivatives, flow, context)
//! - Evidence opinion/snapshot types with a deterministic total order

pub mod evidence;
pub mod types;

pub use evidence::{EvidenceError, EvidenceOpinion, EvidenceSnapshot};
pub use types::{
    ContextFeatures, DerivativesFeatures, FeatureValue, FlowFeatures, MarketFeatures, Regime,
    RegimeInputSnapshot, SnapshotError, WINDOW_MS,
};
