//! Deterministic market regime classification engine.
//!
//! Classifies market microstructure into one of nine discrete regimes from a
//! periodic feature snapshot, then stabilizes the classification over time so
//! downstream consumers see a temporally coherent signal instead of tick-level
//! jitter.
//!
//! ## Pipeline
//!
//! snapshot → scoring → veto → weighting → resolution → confidence →
//! explainability → `RegimeOutput`; resolution + confidence also feed evidence
//! construction for cross-engine fusion. The `RegimeOutput` stream feeds the
//! per-symbol hysteresis debouncer, whose decision is the externally visible,
//! temporally stable regime.
//!
//! ## Modules
//!
//! - `scoring`: one pure scorer per regime with consultation-ordered contributors
//! - `veto`: startup-constructed registry of independent veto rules
//! - `weighting`: per-regime score multipliers
//! - `resolution`: deterministic ranking and winner selection
//! - `confidence`: pluggable-transform confidence synthesis
//! - `explain`: drivers/invalidations/permissions assembly and validation
//! - `belief`: validated belief distribution and classical evidence
//! - `hysteresis`: per-symbol debouncer state machine
//! - `routing`: staged-rollout evidence routing
//! - `record`: decision-log records, JSONL boundary, replay preparation
//! - `pipeline`: the engine facade wiring the stages together

pub mod belief;
pub mod config;
pub mod confidence;
pub mod explain;
pub mod hysteresis;
pub mod pipeline;
pub mod record;
pub mod resolution;
pub mod routing;
pub mod scoring;
pub mod veto;
pub mod weighting;

pub use belief::{build_classical_evidence, BeliefStateError, RegimeState};
pub use confidence::{
    synthesize_confidence, ConfidenceBreakdown, ConfidenceResult, ConfidenceTransforms,
    PillarAgreement,
};
pub use config::{ConfidenceTuning, EngineConfig};
pub use explain::{
    build_output, drivers_from_contributors, invalidations_from_vetoes, permissions_for_regime,
    ExplainabilityValidationError, RegimeOutput,
};
pub use hysteresis::{
    Debouncer, HysteresisConfig, HysteresisDecision, HysteresisState, HysteresisTransition,
};
pub use pipeline::{
    build_matrix_evidence, ClassifierRun, EngineError, RegimeEngine, CLASSICAL_SOURCE,
    MATRIX_SOURCE,
};
pub use record::{
    prepare_replay, read_decision_log, DecisionLogRecord, DecisionLogWriter, RecordError,
    SCHEMA_VERSION,
};
pub use resolution::{rank_scores, resolve, ConfidenceInputs, ResolutionResult};
pub use routing::{rollout_bucket, RoutingConfig, RoutingMode};
pub use scoring::{score_all, RegimeScore};
pub use veto::{VetoRegistry, VetoResult, VetoRule};
pub use weighting::{apply_weights, RegimeWeights};
