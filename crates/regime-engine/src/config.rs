//! Engine configuration.
//!
//! Loads from a TOML file into raw serde structs, then converts into runtime
//! config with a `validate()` pass that rejects nonsense instead of clamping
//! it. Every section has defaults, so an absent file or an empty table yields
//! the production configuration.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use regime_common::Regime;
use serde::Deserialize;

use crate::confidence::ConfidenceTransforms;
use crate::hysteresis::HysteresisConfig;
use crate::routing::RoutingConfig;
use crate::weighting::RegimeWeights;

/// Tuning knobs behind the pluggable confidence transforms.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfidenceTuning {
    /// Score spread considered fully decisive.
    pub decisive_spread: f64,
    /// Relative weight of the spread component vs. pillar agreement.
    pub spread_weight: f64,
    /// Multiplier applied when any veto is present.
    pub veto_penalty: f64,
}

impl Default for ConfidenceTuning {
    fn default() -> Self {
        Self {
            decisive_spread: 0.25,
            spread_weight: 0.6,
            veto_penalty: 0.85,
        }
    }
}

impl ConfidenceTuning {
    /// Materialize the transform set this tuning describes.
    pub fn transforms(&self) -> ConfidenceTransforms {
        let decisive = self.decisive_spread;
        let penalty = self.veto_penalty;
        ConfidenceTransforms {
            spread: Box::new(move |s| (s / decisive).clamp(0.0, 1.0)),
            pillar: Box::new(|r| r),
            veto: Box::new(move |present| if present { penalty } else { 1.0 }),
            spread_weight: self.spread_weight,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub hysteresis: HysteresisConfig,
    pub routing: RoutingConfig,
    pub confidence: ConfidenceTuning,
    /// Per-regime score multipliers by wire name, e.g. `CHOP_BALANCED = 0.9`.
    pub weights: BTreeMap<String, f64>,
}

impl EngineConfig {
    /// Load from a TOML file and validate.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the weight table into typed regime weights.
    pub fn regime_weights(&self) -> Result<RegimeWeights> {
        let mut weights = RegimeWeights::neutral();
        for (name, &value) in &self.weights {
            let Some(regime) = Regime::from_str(name) else {
                bail!("unknown regime {name:?} in [weights]");
            };
            weights.set(regime, value);
        }
        Ok(weights)
    }

    /// Reject out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        let h = &self.hysteresis;
        if h.min_persistence_updates == 0 {
            bail!("hysteresis.min_persistence_updates must be at least 1");
        }
        if !(0.0..=1.0).contains(&h.min_confidence_for_flip) {
            bail!(
                "hysteresis.min_confidence_for_flip must be in [0, 1], got {}",
                h.min_confidence_for_flip
            );
        }
        if !(0.0..=1.0).contains(&h.decay_factor) || h.decay_factor == 0.0 {
            bail!(
                "hysteresis.decay_factor must be in (0, 1], got {}",
                h.decay_factor
            );
        }
        if h.min_confidence_floor > h.min_confidence_for_flip {
            bail!(
                "hysteresis.min_confidence_floor ({}) exceeds min_confidence_for_flip ({})",
                h.min_confidence_floor,
                h.min_confidence_for_flip
            );
        }
        if h.max_update_gap_ms <= 0 {
            bail!("hysteresis.max_update_gap_ms must be positive");
        }

        let r = &self.routing;
        if r.matrix_pct > 100 {
            bail!("routing.matrix_pct must be at most 100, got {}", r.matrix_pct);
        }
        if r.matrix_pct as u16 + r.dual_run_pct as u16 > 100 {
            bail!(
                "routing.matrix_pct + routing.dual_run_pct must be at most 100, got {}",
                r.matrix_pct as u16 + r.dual_run_pct as u16
            );
        }

        let c = &self.confidence;
        if c.decisive_spread <= 0.0 {
            bail!("confidence.decisive_spread must be positive");
        }
        if !(0.0..=1.0).contains(&c.spread_weight) {
            bail!(
                "confidence.spread_weight must be in [0, 1], got {}",
                c.spread_weight
            );
        }
        if !(0.0..=1.0).contains(&c.veto_penalty) {
            bail!(
                "confidence.veto_penalty must be in [0, 1], got {}",
                c.veto_penalty
            );
        }

        for (name, &value) in &self.weights {
            if Regime::from_str(name).is_none() {
                bail!("unknown regime {name:?} in [weights]");
            }
            if !value.is_finite() || value < 0.0 {
                bail!("weight for {name} must be finite and non-negative, got {value}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_toml_sections_override_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [hysteresis]
            min_persistence_updates = 5
            min_confidence_for_flip = 0.7
            decay_factor = 0.9
            min_confidence_floor = 0.1
            max_update_gap_ms = 540000

            [routing]
            matrix_pct = 10
            dual_run_pct = 20

            [weights]
            CHOP_BALANCED = 0.9
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.hysteresis.min_persistence_updates, 5);
        assert_eq!(config.routing.dual_run_pct, 20);
        let weights = config.regime_weights().unwrap();
        assert_eq!(weights.weight_for(Regime::ChopBalanced), 0.9);
        assert_eq!(weights.weight_for(Regime::SqueezeUp), 1.0);
    }

    #[test]
    fn test_validate_rejects_zero_persistence() {
        let mut config = EngineConfig::default();
        config.hysteresis.min_persistence_updates = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_percentages_over_100() {
        let mut config = EngineConfig::default();
        config.routing.matrix_pct = 80;
        config.routing.dual_run_pct = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_floor_above_flip_threshold() {
        let mut config = EngineConfig::default();
        config.hysteresis.min_confidence_floor = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_weight_regime() {
        let mut config = EngineConfig::default();
        config.weights.insert("NOT_A_REGIME".to_string(), 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_confidence_tuning_builds_bounded_transforms() {
        let tuning = ConfidenceTuning::default();
        let transforms = tuning.transforms();
        assert_eq!((transforms.spread)(0.25), 1.0);
        assert_eq!((transforms.spread)(0.125), 0.5);
        assert_eq!((transforms.veto)(true), 0.85);
        assert_eq!((transforms.veto)(false), 1.0);
    }
}
