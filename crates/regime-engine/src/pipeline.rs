//! The engine facade: one snapshot in, one fully resolved run out.
//!
//! Wires scoring → veto → weighting → resolution → confidence synthesis →
//! explainability, and builds the evidence snapshot for cross-engine fusion
//! through whichever interpreter the routing matrix selects for the symbol.
//!
//! The whole chain is a pure, synchronous computation with no shared mutable
//! state: one engine instance can classify different symbols concurrently
//! without coordination. "No winner" is a valid terminal state, never an
//! error.

use regime_common::{EvidenceError, EvidenceOpinion, EvidenceSnapshot, RegimeInputSnapshot};
use tracing::debug;

use crate::belief::build_classical_evidence;
use crate::confidence::{synthesize_confidence, ConfidenceResult, ConfidenceTransforms};
use crate::config::EngineConfig;
use crate::explain::{build_output, ExplainabilityValidationError, RegimeOutput};
use crate::resolution::{resolve, ResolutionResult};
use crate::routing::{RoutingConfig, RoutingMode};
use crate::scoring::{score_all, RegimeScore};
use crate::veto::{VetoRegistry, VetoResult};
use crate::weighting::{apply_weights, RegimeWeights};

/// Evidence source tag for the classical interpreter.
pub const CLASSICAL_SOURCE: &str = "classical_regime";

/// Evidence source tag for the matrix interpreter.
pub const MATRIX_SOURCE: &str = "matrix_regime";

/// Fatal pipeline failures. Absence of a winner is not among them.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Explainability(#[from] ExplainabilityValidationError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),
}

/// Everything one classification produced, audit trail included.
#[derive(Debug, Clone)]
pub struct ClassifierRun {
    /// Unweighted scores, one per regime, declaration order.
    pub scores: Vec<RegimeScore>,
    pub vetoes: Vec<VetoResult>,
    pub resolution: ResolutionResult,
    pub confidence: ConfidenceResult,
    /// None iff the resolution produced no winner.
    pub output: Option<RegimeOutput>,
    pub routing_mode: RoutingMode,
    pub evidence: EvidenceSnapshot,
}

/// Deterministic regime classifier.
pub struct RegimeEngine {
    vetoes: VetoRegistry,
    weights: RegimeWeights,
    transforms: ConfidenceTransforms,
    routing: RoutingConfig,
}

impl RegimeEngine {
    pub fn new(
        vetoes: VetoRegistry,
        weights: RegimeWeights,
        transforms: ConfidenceTransforms,
        routing: RoutingConfig,
    ) -> Self {
        Self {
            vetoes,
            weights,
            transforms,
            routing,
        }
    }

    /// Default rules, neutral weights, standard transforms, legacy routing.
    pub fn with_defaults() -> Self {
        Self::new(
            VetoRegistry::with_defaults(),
            RegimeWeights::neutral(),
            ConfidenceTransforms::standard(),
            RoutingConfig::legacy_only(),
        )
    }

    /// Build an engine from a validated config.
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            VetoRegistry::with_defaults(),
            config.regime_weights()?,
            config.confidence.transforms(),
            config.routing.clone(),
        ))
    }

    /// Classify one snapshot.
    pub fn classify(&self, snapshot: &RegimeInputSnapshot) -> Result<ClassifierRun, EngineError> {
        let scores = score_all(snapshot);
        let vetoes = self.vetoes.evaluate(snapshot, &scores);
        let weighted = apply_weights(&scores, &self.weights);
        let resolution = resolve(&weighted, &vetoes);
        let confidence = synthesize_confidence(&resolution, &self.transforms);

        let output = match &resolution.winner {
            Some(winner) => {
                debug!(
                    symbol = snapshot.symbol(),
                    regime = %winner.regime,
                    confidence = confidence.confidence,
                    "resolved regime"
                );
                Some(build_output(
                    snapshot.symbol(),
                    snapshot.timestamp_ms(),
                    &resolution,
                    &confidence,
                )?)
            }
            None => {
                debug!(symbol = snapshot.symbol(), "no eligible regime");
                None
            }
        };

        let routing_mode = self.routing.route_for(snapshot.symbol());
        let evidence = self.build_evidence(routing_mode, &resolution, &confidence)?;

        Ok(ClassifierRun {
            scores,
            vetoes,
            resolution,
            confidence,
            output,
            routing_mode,
            evidence,
        })
    }

    fn build_evidence(
        &self,
        mode: RoutingMode,
        resolution: &ResolutionResult,
        confidence: &ConfidenceResult,
    ) -> Result<EvidenceSnapshot, EngineError> {
        match mode {
            RoutingMode::LegacyOnly => {
                Ok(build_classical_evidence(resolution, confidence, CLASSICAL_SOURCE)?)
            }
            RoutingMode::MatrixEnabled => Ok(build_matrix_evidence(resolution, confidence)?),
            RoutingMode::DualRun => {
                // Emit legacy evidence; run the matrix interpreter alongside
                // for comparison logging only.
                let legacy =
                    build_classical_evidence(resolution, confidence, CLASSICAL_SOURCE)?;
                let matrix = build_matrix_evidence(resolution, confidence)?;
                debug!(
                    legacy_opinions = legacy.opinions().len(),
                    matrix_opinions = matrix.opinions().len(),
                    "dual-run evidence comparison"
                );
                Ok(legacy)
            }
        }
    }
}

/// The matrix interpreter: instead of a single full-strength opinion, emit one
/// opinion per eligible regime with strength proportional to its score
/// relative to the winner's.
pub fn build_matrix_evidence(
    resolution: &ResolutionResult,
    confidence: &ConfidenceResult,
) -> Result<EvidenceSnapshot, EvidenceError> {
    let Some(winner) = &resolution.winner else {
        return Ok(EvidenceSnapshot::empty());
    };
    if winner.score <= 0.0 {
        let opinion = EvidenceOpinion::new(
            winner.regime,
            1.0,
            confidence.confidence.unwrap_or(0.0),
            MATRIX_SOURCE,
        )?;
        return Ok(EvidenceSnapshot::from_opinions(vec![opinion]));
    }

    let vetoed: Vec<_> = resolution
        .vetoes
        .iter()
        .filter(|v| v.vetoed)
        .map(|v| v.regime)
        .collect();
    let shared_confidence = confidence.confidence.unwrap_or(0.0);

    let mut opinions = Vec::new();
    for ranked in &resolution.ranked {
        if vetoed.contains(&ranked.regime) || ranked.score <= 0.0 {
            continue;
        }
        let strength = (ranked.score / winner.score).clamp(0.0, 1.0);
        opinions.push(EvidenceOpinion::new(
            ranked.regime,
            strength,
            shared_confidence,
            MATRIX_SOURCE,
        )?);
    }
    Ok(EvidenceSnapshot::from_opinions(opinions))
}
