//! Staged-rollout routing between evidence interpreters.
//!
//! Selects, per symbol, between legacy evidence generation and the matrix
//! interpreter. Selection is reproducible: an explicit allow-list wins when
//! non-empty; otherwise a stable hash of the symbol is reduced to a 0..100
//! bucket and compared against the rollout percentages, so a symbol always
//! lands on the same side of the rollout for a fixed configuration, across
//! calls and across process restarts.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Which interpreter(s) run for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Classical single-opinion evidence only.
    LegacyOnly,
    /// Emit legacy evidence, compute matrix evidence for comparison logging.
    DualRun,
    /// Matrix interpreter evidence only.
    MatrixEnabled,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::LegacyOnly => "legacy_only",
            RoutingMode::DualRun => "dual_run",
            RoutingMode::MatrixEnabled => "matrix_enabled",
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rollout configuration for the matrix interpreter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Symbols routed to the matrix interpreter unconditionally. When
    /// non-empty, the percentage rollout is bypassed entirely.
    pub allowlist: Vec<String>,
    /// Percentage of the symbol space routed to `matrix_enabled` (0-100).
    pub matrix_pct: u8,
    /// Percentage routed to `dual_run`, stacked after `matrix_pct` (0-100).
    pub dual_run_pct: u8,
}

impl RoutingConfig {
    /// Everything on the legacy path.
    pub fn legacy_only() -> Self {
        Self::default()
    }

    /// Route a symbol. Pure function of (config, symbol).
    pub fn route_for(&self, symbol: &str) -> RoutingMode {
        if !self.allowlist.is_empty() {
            return if self.allowlist.iter().any(|s| s == symbol) {
                RoutingMode::MatrixEnabled
            } else {
                RoutingMode::LegacyOnly
            };
        }
        let bucket = rollout_bucket(symbol);
        if bucket < self.matrix_pct {
            RoutingMode::MatrixEnabled
        } else if bucket < self.matrix_pct.saturating_add(self.dual_run_pct) {
            RoutingMode::DualRun
        } else {
            RoutingMode::LegacyOnly
        }
    }
}

/// Stable 0..100 bucket for a symbol: Keccak-256 of the symbol bytes, first
/// eight bytes as a big-endian u64, reduced modulo 100.
pub fn rollout_bucket(symbol: &str) -> u8 {
    let digest = Keccak256::digest(symbol.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}
