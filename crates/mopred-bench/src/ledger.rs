//! Metrics ledger.
//!
//! Append-only store of one row per `(window, variant)`. Rows iterate in key
//! order, window first, then variant in the fixed order
//! `static, static_multimodal, incremental, incremental_multimodal`.
//!
//! Exports:
//! - **CSV**: fixed header, null metrics as empty cells
//! - **JSON lines**: one row per line, null metrics as `null`
//! - **Score traces**: labels and scores behind each row, for auditing

use crate::error::LedgerError;
use mopred_core::{FeatureSet, WindowMetrics, csv};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const METRICS_CSV_HEADER: &str =
    "window,variant,accuracy,precision,recall,f1,auprc,brier,n_samples,n_positive";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Static,
    Incremental,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Static,
    StaticMultimodal,
    Incremental,
    IncrementalMultimodal,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Static,
        Variant::StaticMultimodal,
        Variant::Incremental,
        Variant::IncrementalMultimodal,
    ];

    pub fn of(kind: ModelKind, set: FeatureSet) -> Self {
        match (kind, set) {
            (ModelKind::Static, FeatureSet::Basic) => Variant::Static,
            (ModelKind::Static, FeatureSet::Multimodal) => Variant::StaticMultimodal,
            (ModelKind::Incremental, FeatureSet::Basic) => Variant::Incremental,
            (ModelKind::Incremental, FeatureSet::Multimodal) => Variant::IncrementalMultimodal,
        }
    }

    pub fn kind(self) -> ModelKind {
        match self {
            Variant::Static | Variant::StaticMultimodal => ModelKind::Static,
            Variant::Incremental | Variant::IncrementalMultimodal => ModelKind::Incremental,
        }
    }

    pub fn feature_set(self) -> FeatureSet {
        match self {
            Variant::Static | Variant::Incremental => FeatureSet::Basic,
            Variant::StaticMultimodal | Variant::IncrementalMultimodal => FeatureSet::Multimodal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Static => "static",
            Variant::StaticMultimodal => "static_multimodal",
            Variant::Incremental => "incremental",
            Variant::IncrementalMultimodal => "incremental_multimodal",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricRow {
    pub window: usize,
    pub variant: Variant,
    #[serde(flatten)]
    pub metrics: WindowMetrics,
}

impl MetricRow {
    pub fn new(window: usize, variant: Variant, metrics: WindowMetrics) -> Self {
        Self {
            window,
            variant,
            metrics,
        }
    }

    fn csv_line(&self) -> String {
        let m = &self.metrics;
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.window,
            self.variant,
            csv::optional_float(m.accuracy),
            csv::optional_float(m.precision),
            csv::optional_float(m.recall),
            csv::optional_float(m.f1),
            csv::optional_float(m.auprc),
            csv::optional_float(m.brier),
            m.n_samples,
            m.n_positive,
        )
    }
}

/// Labels and scores that produced one scored row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScoreTrace {
    pub window: usize,
    pub variant: Variant,
    pub y_true: Vec<u8>,
    pub y_score: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct MetricsLedger {
    rows: BTreeMap<(usize, Variant), MetricRow>,
}

impl MetricsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, row: MetricRow) -> Result<(), LedgerError> {
        let key = (row.window, row.variant);
        if self.rows.contains_key(&key) {
            return Err(LedgerError::DuplicateRow {
                window: row.window,
                variant: row.variant,
            });
        }
        self.rows.insert(key, row);
        Ok(())
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = MetricRow>) -> Result<(), LedgerError> {
        rows.into_iter().try_for_each(|row| self.append(row))
    }

    pub fn get(&self, window: usize, variant: Variant) -> Option<&MetricRow> {
        self.rows.get(&(window, variant))
    }

    pub fn rows(&self) -> impl Iterator<Item = &MetricRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct windows with at least one row.
    pub fn window_count(&self) -> usize {
        let mut windows: Vec<usize> = self.rows.keys().map(|(w, _)| *w).collect();
        windows.dedup();
        windows.len()
    }

    pub fn write_csv<W: Write>(&self, out: &mut W) -> Result<(), LedgerError> {
        writeln!(out, "{METRICS_CSV_HEADER}")?;
        for row in self.rows() {
            writeln!(out, "{}", row.csv_line())?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_json_lines<W: Write>(&self, out: &mut W) -> Result<(), LedgerError> {
        for row in self.rows() {
            serde_json::to_writer(&mut *out, row)?;
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv_to_path(&self, path: impl AsRef<Path>) -> Result<(), LedgerError> {
        self.write_csv(&mut create(path.as_ref())?)
    }

    pub fn write_json_lines_to_path(&self, path: impl AsRef<Path>) -> Result<(), LedgerError> {
        self.write_json_lines(&mut create(path.as_ref())?)
    }

    pub fn summary(&self) -> LedgerSummary {
        let variants = Variant::ALL
            .iter()
            .map(|&variant| {
                let rows: Vec<&WindowMetrics> = self
                    .rows()
                    .filter(|r| r.variant == variant)
                    .map(|r| &r.metrics)
                    .collect();
                VariantSummary {
                    variant,
                    rows: rows.len(),
                    scored_windows: rows.iter().filter(|m| m.accuracy.is_some()).count(),
                    mean_accuracy: mean(rows.iter().map(|m| m.accuracy)),
                    mean_precision: mean(rows.iter().map(|m| m.precision)),
                    mean_recall: mean(rows.iter().map(|m| m.recall)),
                    mean_f1: mean(rows.iter().map(|m| m.f1)),
                    mean_auprc: mean(rows.iter().map(|m| m.auprc)),
                    mean_brier: mean(rows.iter().map(|m| m.brier)),
                }
            })
            .collect();

        let f1_wins = FeatureSet::ALL
            .iter()
            .map(|&set| {
                let mut wins = F1Wins {
                    feature_set: set,
                    ..Default::default()
                };
                let static_variant = Variant::of(ModelKind::Static, set);
                let incremental_variant = Variant::of(ModelKind::Incremental, set);
                for row in self.rows().filter(|r| r.variant == static_variant) {
                    let other = self.get(row.window, incremental_variant);
                    let (Some(s), Some(i)) = (row.metrics.f1, other.and_then(|o| o.metrics.f1)) else {
                        continue;
                    };
                    if i > s {
                        wins.incremental += 1;
                    } else if s > i {
                        wins.static_model += 1;
                    } else {
                        wins.ties += 1;
                    }
                }
                wins
            })
            .collect();

        LedgerSummary { variants, f1_wins }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, LedgerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

pub fn write_score_traces(path: impl AsRef<Path>, traces: &[ScoreTrace]) -> Result<(), LedgerError> {
    let mut out = create(path.as_ref())?;
    for trace in traces {
        serde_json::to_writer(&mut out, trace)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Mean over present values; `None` if there are none.
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values.flatten().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VariantSummary {
    pub variant: Variant,
    pub rows: usize,
    pub scored_windows: usize,
    pub mean_accuracy: Option<f64>,
    pub mean_precision: Option<f64>,
    pub mean_recall: Option<f64>,
    pub mean_f1: Option<f64>,
    pub mean_auprc: Option<f64>,
    pub mean_brier: Option<f64>,
}

/// Per-window F1 head-to-head for one feature set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct F1Wins {
    pub feature_set: FeatureSet,
    pub incremental: usize,
    pub static_model: usize,
    pub ties: usize,
}

impl Default for F1Wins {
    fn default() -> Self {
        Self {
            feature_set: FeatureSet::Basic,
            incremental: 0,
            static_model: 0,
            ties: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LedgerSummary {
    pub variants: Vec<VariantSummary>,
    pub f1_wins: Vec<F1Wins>,
}

impl LedgerSummary {
    pub fn variant(&self, variant: Variant) -> Option<&VariantSummary> {
        self.variants.iter().find(|v| v.variant == variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(f1: f64) -> WindowMetrics {
        WindowMetrics {
            accuracy: Some(0.5),
            precision: Some(0.5),
            recall: Some(0.5),
            f1: Some(f1),
            auprc: None,
            brier: None,
            n_samples: 4,
            n_positive: 1,
        }
    }

    #[test]
    fn test_variant_order_and_names() {
        let mut shuffled = vec![
            Variant::IncrementalMultimodal,
            Variant::Static,
            Variant::Incremental,
            Variant::StaticMultimodal,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Variant::ALL);
        assert_eq!(Variant::of(ModelKind::Incremental, FeatureSet::Multimodal).as_str(), "incremental_multimodal");
        for v in Variant::ALL {
            assert_eq!(Variant::of(v.kind(), v.feature_set()), v);
        }
    }

    #[test]
    fn test_duplicate_rows_are_rejected() {
        let mut ledger = MetricsLedger::new();
        ledger.append(MetricRow::new(0, Variant::Static, WindowMetrics::default())).unwrap();
        let err = ledger
            .append(MetricRow::new(0, Variant::Static, scored(1.0)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateRow { window: 0, variant: Variant::Static }));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(0, Variant::Static).unwrap().metrics, WindowMetrics::default());
    }

    #[test]
    fn test_rows_iterate_in_key_order() {
        let mut ledger = MetricsLedger::new();
        for window in [2, 0, 1] {
            for v in Variant::ALL.iter().rev() {
                ledger.append(MetricRow::new(window, *v, WindowMetrics::default())).unwrap();
            }
        }
        let keys: Vec<(usize, Variant)> = ledger.rows().map(|r| (r.window, r.variant)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(ledger.window_count(), 3);
    }

    #[test]
    fn test_csv_null_cells_are_empty() {
        let mut ledger = MetricsLedger::new();
        ledger
            .append(MetricRow::new(0, Variant::Static, WindowMetrics::null(&[0, 1, 0])))
            .unwrap();
        ledger.append(MetricRow::new(1, Variant::Static, scored(0.25))).unwrap();

        let mut buf = Vec::new();
        ledger.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], METRICS_CSV_HEADER);
        assert_eq!(lines[1], "0,static,,,,,,,3,1");
        assert_eq!(lines[2], "1,static,0.500000,0.500000,0.500000,0.250000,,,4,1");
    }

    #[test]
    fn test_json_lines_use_null() {
        let mut ledger = MetricsLedger::new();
        ledger
            .append(MetricRow::new(3, Variant::IncrementalMultimodal, WindowMetrics::null(&[])))
            .unwrap();
        let mut buf = Vec::new();
        ledger.write_json_lines(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["window"], 3);
        assert_eq!(value["variant"], "incremental_multimodal");
        assert!(value["f1"].is_null());
        assert_eq!(value["n_samples"], 0);
    }

    #[test]
    fn test_summary_means_and_wins() {
        let mut ledger = MetricsLedger::new();
        ledger.append(MetricRow::new(0, Variant::Static, WindowMetrics::null(&[1]))).unwrap();
        ledger.append(MetricRow::new(0, Variant::Incremental, WindowMetrics::null(&[1]))).unwrap();
        ledger.append(MetricRow::new(1, Variant::Static, scored(0.4))).unwrap();
        ledger.append(MetricRow::new(1, Variant::Incremental, scored(0.6))).unwrap();
        ledger.append(MetricRow::new(2, Variant::Static, scored(0.8))).unwrap();
        ledger.append(MetricRow::new(2, Variant::Incremental, scored(0.8))).unwrap();

        let summary = ledger.summary();
        let s = summary.variant(Variant::Static).unwrap();
        assert_eq!((s.rows, s.scored_windows), (3, 2));
        assert!((s.mean_f1.unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(s.mean_auprc, None);
        assert_eq!(summary.variant(Variant::StaticMultimodal).unwrap().mean_f1, None);

        let basic = &summary.f1_wins[0];
        assert_eq!(basic.feature_set, FeatureSet::Basic);
        assert_eq!((basic.incremental, basic.static_model, basic.ties), (1, 0, 1));
    }

    #[test]
    fn test_score_traces_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("scores.jsonl");
        let traces = vec![ScoreTrace {
            window: 1,
            variant: Variant::Incremental,
            y_true: vec![0, 1],
            y_score: vec![0.1, 0.9],
        }];
        write_score_traces(&path, &traces).unwrap();
        let line = std::fs::read_to_string(&path).unwrap();
        let parsed: ScoreTrace = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed, traces[0]);
    }
}
