//! Append-only decision-log records and the replay boundary.
//!
//! One JSON line per debounced decision, carrying both the truth (the raw
//! resolved output) and the stabilized selection, plus the full transition
//! audit record so a backtest can replay the debouncer's behavior exactly.
//!
//! Replay preparation groups records by symbol and enforces per-symbol
//! timestamp monotonicity: exact-timestamp repeats and out-of-order records
//! behind the max-seen-so-far are dropped. Backtests depend on this contract
//! being reproduced exactly.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use regime_common::Regime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::explain::RegimeOutput;
use crate::hysteresis::{HysteresisDecision, HysteresisTransition};

/// Bump when the record layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors at the log boundary.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("decision log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record on line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// One appended decision, truth and selection side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogRecord {
    pub schema_version: u32,
    /// Composite identity: `"{symbol}:{timestamp}"`.
    pub record_id: String,
    pub symbol: String,
    pub timestamp_ms: i64,
    /// The raw resolved regime before debouncing.
    pub truth_regime: Regime,
    pub truth_confidence: f64,
    pub drivers: Vec<String>,
    pub invalidations: Vec<String>,
    pub permissions: Vec<String>,
    /// The externally visible regime after debouncing.
    pub selected_regime: Regime,
    pub effective_confidence: f64,
    pub transition: HysteresisTransition,
}

impl DecisionLogRecord {
    /// Build a record from the raw output and the debouncer's decision.
    pub fn from_decision(truth: &RegimeOutput, decision: &HysteresisDecision) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            record_id: format!("{}:{}", truth.symbol, truth.timestamp_ms),
            symbol: truth.symbol.clone(),
            timestamp_ms: truth.timestamp_ms,
            truth_regime: truth.regime,
            truth_confidence: truth.confidence,
            drivers: truth.drivers.clone(),
            invalidations: truth.invalidations.clone(),
            permissions: truth.permissions.clone(),
            selected_regime: decision.output.regime,
            effective_confidence: decision.effective_confidence,
            transition: decision.transition.clone(),
        }
    }
}

/// Append-only JSONL writer for decision records.
pub struct DecisionLogWriter {
    file: Mutex<File>,
}

impl DecisionLogWriter {
    /// Open (or create) a decision log. A fresh file gets a commented header
    /// identifying the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let file_exists = path.exists();

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = Self {
            file: Mutex::new(file),
        };
        if !file_exists {
            writer.write_header()?;
        }
        Ok(writer)
    }

    fn write_header(&self) -> Result<(), RecordError> {
        let mut file = self.file.lock().unwrap();
        writeln!(file, "# regime decision log")?;
        writeln!(file, "# schema_version: {}", SCHEMA_VERSION)?;
        writeln!(
            file,
            "# generated: {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        )?;
        Ok(())
    }

    /// Append one record as a JSON line.
    pub fn append(&self, record: &DecisionLogRecord) -> Result<(), RecordError> {
        let line = serde_json::to_string(record).expect("record serialization is infallible");
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Read a decision log back, skipping `#` header/comment lines and blanks.
pub fn read_decision_log(path: impl AsRef<Path>) -> Result<Vec<DecisionLogRecord>, RecordError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| RecordError::Malformed {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Group records by symbol and enforce per-symbol timestamp monotonicity.
///
/// Records are scanned in arrival order; a record whose timestamp is not
/// strictly greater than the symbol's max-seen-so-far is dropped. This removes
/// exact-timestamp repeats and out-of-order stragglers in one pass and leaves
/// every per-symbol stream sorted ascending.
pub fn prepare_replay(
    records: Vec<DecisionLogRecord>,
) -> BTreeMap<String, Vec<DecisionLogRecord>> {
    let mut grouped: BTreeMap<String, Vec<DecisionLogRecord>> = BTreeMap::new();
    for record in records {
        let stream = grouped.entry(record.symbol.clone()).or_default();
        match stream.last() {
            Some(last) if record.timestamp_ms <= last.timestamp_ms => {
                debug!(
                    record_id = %record.record_id,
                    max_seen = last.timestamp_ms,
                    "dropping stale or duplicate record"
                );
            }
            _ => stream.push(record),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_common::WINDOW_MS;

    fn record(symbol: &str, window: i64) -> DecisionLogRecord {
        let timestamp_ms = window * WINDOW_MS;
        DecisionLogRecord {
            schema_version: SCHEMA_VERSION,
            record_id: format!("{}:{}", symbol, timestamp_ms),
            symbol: symbol.to_string(),
            timestamp_ms,
            truth_regime: Regime::ChopBalanced,
            truth_confidence: 0.7,
            drivers: vec!["Market ATR z-score".to_string()],
            invalidations: vec!["Range expansion beyond the compression band".to_string()],
            permissions: vec!["CHOP_BALANCED".to_string()],
            selected_regime: Regime::ChopBalanced,
            effective_confidence: 0.7,
            transition: HysteresisTransition {
                stable_regime: Some(Regime::ChopBalanced),
                candidate_regime: None,
                candidate_count: 0,
                transition_active: false,
                flipped: false,
                reset_due_to_gap: false,
            },
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("regime-record-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_record_id_is_symbol_colon_timestamp() {
        let r = record("BTCUSDT", 3);
        assert_eq!(r.record_id, format!("BTCUSDT:{}", 3 * WINDOW_MS));
    }

    #[test]
    fn test_jsonl_write_read_round_trip() {
        let path = temp_path("roundtrip.jsonl");
        let _ = std::fs::remove_file(&path);

        let writer = DecisionLogWriter::open(&path).unwrap();
        writer.append(&record("BTCUSDT", 1)).unwrap();
        writer.append(&record("ETHUSDT", 1)).unwrap();
        drop(writer);

        let records = read_decision_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record("BTCUSDT", 1));
        assert_eq!(records[1].symbol, "ETHUSDT");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_header_lines_are_skipped_on_read() {
        let path = temp_path("header.jsonl");
        let _ = std::fs::remove_file(&path);

        let writer = DecisionLogWriter::open(&path).unwrap();
        writer.append(&record("BTCUSDT", 1)).unwrap();
        drop(writer);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# regime decision log"));
        assert_eq!(read_decision_log(&path).unwrap().len(), 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let path = temp_path("malformed.jsonl");
        std::fs::write(&path, "# header\nnot json\n").unwrap();

        let err = read_decision_log(&path).unwrap_err();
        match err {
            RecordError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_replay_groups_by_symbol_sorted_ascending() {
        let records = vec![
            record("ETHUSDT", 1),
            record("BTCUSDT", 1),
            record("BTCUSDT", 2),
            record("ETHUSDT", 2),
        ];
        let grouped = prepare_replay(records);
        assert_eq!(grouped.len(), 2);
        let btc: Vec<i64> = grouped["BTCUSDT"].iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(btc, vec![WINDOW_MS, 2 * WINDOW_MS]);
    }

    #[test]
    fn test_replay_drops_exact_repeats_and_stragglers() {
        let records = vec![
            record("BTCUSDT", 1),
            record("BTCUSDT", 3),
            record("BTCUSDT", 3), // exact repeat
            record("BTCUSDT", 2), // behind max-seen
            record("BTCUSDT", 4),
        ];
        let grouped = prepare_replay(records);
        let windows: Vec<i64> = grouped["BTCUSDT"]
            .iter()
            .map(|r| r.timestamp_ms / WINDOW_MS)
            .collect();
        assert_eq!(windows, vec![1, 3, 4]);
    }

    #[test]
    fn test_replay_dedup_is_per_symbol() {
        let records = vec![
            record("BTCUSDT", 2),
            record("ETHUSDT", 1), // earlier than BTC's max, different stream
        ];
        let grouped = prepare_replay(records);
        assert_eq!(grouped["BTCUSDT"].len(), 1);
        assert_eq!(grouped["ETHUSDT"].len(), 1);
    }
}
