//! Per-symbol hysteresis debouncer.
//!
//! The resolved regime can be noisy call to call. Public consumers need a
//! stable regime that only changes after sustained agreement, with confidence
//! discounted while a flip attempt is pending, and a gap safety valve that
//! forgets stale candidate history when updates stop arriving.
//!
//! State is kept per symbol in a keyed store. Updates for different symbols
//! are independent; updates for the same symbol must be serialized by the
//! caller (the orchestrator owns per-symbol ordering).
//!
//! ## Transitions
//!
//! - Incoming regime equals stable (or no stable yet and confidence clears
//!   `min_confidence_for_flip`): accept immediately, clear candidate tracking.
//! - Incoming differs, confidence ≥ threshold: advance (or reset) the
//!   candidate; on reaching `min_persistence_updates` confirmations, commit
//!   the flip with `flipped = true` on that call only.
//! - Confidence below threshold: candidate untouched; the previous stable
//!   output is re-emitted with
//!   `effective = max(confidence · decay^candidate_count, floor)`.
//! - A timestamp gap strictly greater than `max_update_gap_ms` resets the
//!   candidate unconditionally (`reset_due_to_gap = true`) before the update
//!   is evaluated.

use dashmap::DashMap;
use regime_common::{Regime, WINDOW_MS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::explain::RegimeOutput;

/// Thresholds governing flip behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    /// Consecutive confirmations required before the stable regime flips.
    pub min_persistence_updates: u32,

    /// Confidence a differing resolution needs to advance a flip attempt.
    pub min_confidence_for_flip: f64,

    /// Per-pending-update decay applied while a flip attempt stalls.
    pub decay_factor: f64,

    /// Floor under the decayed effective confidence.
    pub min_confidence_floor: f64,

    /// Maximum tolerated gap between updates before candidate history is
    /// forgotten. A gap of exactly this value does NOT reset.
    pub max_update_gap_ms: i64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            min_persistence_updates: 3,
            min_confidence_for_flip: 0.60,
            decay_factor: 0.85,
            min_confidence_floor: 0.20,
            max_update_gap_ms: 2 * WINDOW_MS,
        }
    }
}

/// Per-symbol debouncer state, mutated only by [`Debouncer::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HysteresisState {
    /// Last confirmed output, if any.
    pub stable_output: Option<RegimeOutput>,
    /// Regime currently accumulating confirmations toward a flip.
    pub candidate_regime: Option<Regime>,
    /// Confirmations accumulated toward a flip.
    pub candidate_count: u32,
    /// Timestamp of the last update, for gap detection.
    pub last_timestamp: Option<i64>,
}

/// Audit record of one debouncer update, suitable for logging and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HysteresisTransition {
    pub stable_regime: Option<Regime>,
    pub candidate_regime: Option<Regime>,
    pub candidate_count: u32,
    /// True whenever a candidate is accumulating after this update.
    pub transition_active: bool,
    /// True on the exact call that commits a flip, false otherwise.
    pub flipped: bool,
    pub reset_due_to_gap: bool,
}

/// The debouncer's verdict for one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HysteresisDecision {
    /// The externally visible output: the incoming one when accepted, the
    /// previous stable one while a flip is pending or rejected.
    pub output: RegimeOutput,
    pub effective_confidence: f64,
    pub transition: HysteresisTransition,
}

/// Per-symbol hysteresis debouncer over a keyed state store.
#[derive(Debug)]
pub struct Debouncer {
    config: HysteresisConfig,
    states: DashMap<String, HysteresisState>,
}

impl Debouncer {
    pub fn new(config: HysteresisConfig) -> Self {
        Self {
            config,
            states: DashMap::new(),
        }
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    /// Snapshot of one symbol's state, for inspection and persistence.
    pub fn state_for(&self, symbol: &str) -> Option<HysteresisState> {
        self.states.get(symbol).map(|s| s.clone())
    }

    /// Seed a symbol's state, e.g. when restoring from a replayed log.
    pub fn restore(&self, symbol: impl Into<String>, state: HysteresisState) {
        self.states.insert(symbol.into(), state);
    }

    fn decayed(&self, confidence: f64, candidate_count: u32) -> f64 {
        let decayed = confidence * self.config.decay_factor.powi(candidate_count as i32);
        decayed.max(self.config.min_confidence_floor)
    }

    /// Run one update through the state machine and return the stable decision.
    pub fn apply(&self, incoming: RegimeOutput) -> HysteresisDecision {
        let mut entry = self.states.entry(incoming.symbol.clone()).or_default();
        let state = entry.value_mut();

        let mut reset_due_to_gap = false;
        if let Some(last) = state.last_timestamp {
            if incoming.timestamp_ms - last > self.config.max_update_gap_ms {
                debug!(
                    symbol = %incoming.symbol,
                    gap_ms = incoming.timestamp_ms - last,
                    "update gap exceeded tolerance, forgetting candidate history"
                );
                state.candidate_regime = None;
                state.candidate_count = 0;
                reset_due_to_gap = true;
            }
        }
        state.last_timestamp = Some(incoming.timestamp_ms);

        let confidence = incoming.confidence;
        let stable = state.stable_output.clone();

        let (output, effective_confidence, flipped) = match stable {
            None => {
                if confidence >= self.config.min_confidence_for_flip {
                    state.stable_output = Some(incoming.clone());
                    state.candidate_regime = None;
                    state.candidate_count = 0;
                    (incoming, confidence, false)
                } else {
                    // Nothing confirmed yet and nothing better to show: emit
                    // the incoming output provisionally without adopting it.
                    (incoming, confidence, false)
                }
            }
            Some(stable) if stable.regime == incoming.regime => {
                state.candidate_regime = None;
                state.candidate_count = 0;
                state.stable_output = Some(incoming.clone());
                (incoming, confidence, false)
            }
            Some(stable) => {
                if confidence >= self.config.min_confidence_for_flip {
                    if state.candidate_regime == Some(incoming.regime) {
                        state.candidate_count += 1;
                    } else {
                        state.candidate_regime = Some(incoming.regime);
                        state.candidate_count = 1;
                    }
                    if state.candidate_count >= self.config.min_persistence_updates {
                        debug!(
                            symbol = %incoming.symbol,
                            from = %stable.regime,
                            to = %incoming.regime,
                            "committing regime flip"
                        );
                        state.stable_output = Some(incoming.clone());
                        state.candidate_regime = None;
                        state.candidate_count = 0;
                        (incoming, confidence, true)
                    } else {
                        let effective = self.decayed(confidence, state.candidate_count);
                        (stable, effective, false)
                    }
                } else {
                    let effective = self.decayed(confidence, state.candidate_count);
                    (stable, effective, false)
                }
            }
        };

        let transition = HysteresisTransition {
            stable_regime: state.stable_output.as_ref().map(|o| o.regime),
            candidate_regime: state.candidate_regime,
            candidate_count: state.candidate_count,
            transition_active: state.candidate_count > 0,
            flipped,
            reset_due_to_gap,
        };

        HysteresisDecision {
            output,
            effective_confidence,
            transition,
        }
    }
}
