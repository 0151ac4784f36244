//! Integration tests for the hysteresis debouncer.
//!
//! The debouncer is the only stateful component: these tests pin the flip,
//! decay, and gap-reset semantics over realistic multi-window sequences.

use regime_common::{Regime, WINDOW_MS};
use regime_engine::{permissions_for_regime, Debouncer, HysteresisConfig, RegimeOutput};

// ============================================================================
// Fixtures
// ============================================================================

fn output(symbol: &str, window: i64, regime: Regime, confidence: f64) -> RegimeOutput {
    RegimeOutput {
        symbol: symbol.to_string(),
        timestamp_ms: window * WINDOW_MS,
        regime,
        confidence,
        drivers: vec!["Market trend slope".to_string()],
        invalidations: vec!["CVD slope reversal".to_string()],
        permissions: permissions_for_regime(regime),
    }
}

fn config() -> HysteresisConfig {
    HysteresisConfig {
        min_persistence_updates: 3,
        min_confidence_for_flip: 0.60,
        decay_factor: 0.85,
        min_confidence_floor: 0.20,
        max_update_gap_ms: 2 * WINDOW_MS,
    }
}

// ============================================================================
// Flip discipline
// ============================================================================

#[test]
fn test_noisy_sequence_never_flips_without_persistence() {
    let debouncer = Debouncer::new(config());
    debouncer.apply(output("BTC", 1, Regime::ChopBalanced, 0.9));

    // The resolved regime changes every window but never repeats three times
    // in a row: the stable output must never move.
    let noise = [
        Regime::SqueezeUp,
        Regime::SqueezeUp,
        Regime::TrendBuildUp,
        Regime::TrendBuildUp,
        Regime::SqueezeDown,
        Regime::LiquidationUp,
        Regime::SqueezeUp,
    ];
    for (i, regime) in noise.iter().enumerate() {
        let decision = debouncer.apply(output("BTC", 2 + i as i64, *regime, 0.9));
        assert_eq!(decision.output.regime, Regime::ChopBalanced, "call {i}");
        assert!(!decision.transition.flipped, "call {i}");
    }
}

#[test]
fn test_sustained_agreement_flips_exactly_once() {
    let debouncer = Debouncer::new(config());
    debouncer.apply(output("BTC", 1, Regime::ChopBalanced, 0.9));

    let mut flip_windows = Vec::new();
    for window in 2..=7 {
        let decision = debouncer.apply(output("BTC", window, Regime::TrendBuildUp, 0.8));
        if decision.transition.flipped {
            flip_windows.push(window);
        }
    }

    // Count reaches min_persistence_updates on the third agreeing window.
    assert_eq!(flip_windows, vec![4]);
    let state = debouncer.state_for("BTC").unwrap();
    assert_eq!(
        state.stable_output.unwrap().regime,
        Regime::TrendBuildUp
    );
}

#[test]
fn test_low_confidence_stalls_a_flip_and_decays_output() {
    let cfg = config();
    let debouncer = Debouncer::new(cfg.clone());
    debouncer.apply(output("BTC", 1, Regime::ChopBalanced, 0.9));
    debouncer.apply(output("BTC", 2, Regime::TrendBuildUp, 0.8));
    debouncer.apply(output("BTC", 3, Regime::TrendBuildUp, 0.8));

    // Confidence collapses below the flip threshold: candidate frozen at 2,
    // previous stable re-emitted with the decayed confidence.
    let decision = debouncer.apply(output("BTC", 4, Regime::TrendBuildUp, 0.5));
    assert_eq!(decision.output.regime, Regime::ChopBalanced);
    assert_eq!(decision.transition.candidate_count, 2);
    assert!(decision.transition.transition_active);
    let expected = (0.5 * cfg.decay_factor.powi(2)).max(cfg.min_confidence_floor);
    assert!((decision.effective_confidence - expected).abs() < 1e-12);

    // Confidence recovers: one more confirmation completes the flip.
    let decision = debouncer.apply(output("BTC", 5, Regime::TrendBuildUp, 0.8));
    assert!(decision.transition.flipped);
    assert_eq!(decision.output.regime, Regime::TrendBuildUp);
}

// ============================================================================
// Gap safety valve
// ============================================================================

#[test]
fn test_data_outage_discards_partial_flip() {
    let debouncer = Debouncer::new(config());
    debouncer.apply(output("BTC", 1, Regime::ChopBalanced, 0.9));
    debouncer.apply(output("BTC", 2, Regime::TrendBuildUp, 0.8));
    debouncer.apply(output("BTC", 3, Regime::TrendBuildUp, 0.8));

    // Silence past the tolerance, then the same candidate returns. The stale
    // two confirmations must not count toward the flip.
    let decision = debouncer.apply(output("BTC", 7, Regime::TrendBuildUp, 0.8));
    assert!(decision.transition.reset_due_to_gap);
    assert_eq!(decision.transition.candidate_count, 1);
    assert!(!decision.transition.flipped);

    // Flip still requires the full persistence run after the reset.
    debouncer.apply(output("BTC", 8, Regime::TrendBuildUp, 0.8));
    let decision = debouncer.apply(output("BTC", 9, Regime::TrendBuildUp, 0.8));
    assert!(decision.transition.flipped);
}

#[test]
fn test_regular_cadence_is_not_a_gap() {
    let debouncer = Debouncer::new(config());
    debouncer.apply(output("BTC", 1, Regime::ChopBalanced, 0.9));

    for window in 2..=5 {
        let decision = debouncer.apply(output("BTC", window, Regime::ChopBalanced, 0.8));
        assert!(!decision.transition.reset_due_to_gap);
    }
}

// ============================================================================
// Cross-symbol isolation
// ============================================================================

#[test]
fn test_flip_on_one_symbol_leaves_others_untouched() {
    let debouncer = Debouncer::new(config());
    debouncer.apply(output("BTC", 1, Regime::ChopBalanced, 0.9));
    debouncer.apply(output("ETH", 1, Regime::ChopBalanced, 0.9));

    for window in 2..=4 {
        debouncer.apply(output("BTC", window, Regime::TrendBuildUp, 0.8));
    }

    let btc = debouncer.state_for("BTC").unwrap();
    let eth = debouncer.state_for("ETH").unwrap();
    assert_eq!(btc.stable_output.unwrap().regime, Regime::TrendBuildUp);
    assert_eq!(eth.stable_output.unwrap().regime, Regime::ChopBalanced);
}
