use std::fs;
use std::path::Path;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// The 13 scalars logged per training run, parsed from the last line of the
/// trainer's `results.csv`. The file has 14 columns; column 0 is the epoch
/// counter and is unused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train_box_loss: f64,
    pub train_cls_loss: f64,
    pub train_dfl_loss: f64,
    pub metrics_precision_b: f64,
    pub metrics_recall_b: f64,
    pub metrics_map50_b: f64,
    pub metrics_map50_95_b: f64,
    pub val_box_loss: f64,
    pub val_cls_loss: f64,
    pub val_dfl_loss: f64,
    pub lr_pg0: f64,
    pub lr_pg1: f64,
    pub lr_pg2: f64,
}

impl TrainingMetrics {
    pub fn from_results_csv(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read metrics log {}", path.display()))?;
        let last_row = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .next_back()
            .context("metrics log is empty")?;
        Self::from_csv_row(last_row)
            .with_context(|| format!("failed to parse metrics log {}", path.display()))
    }

    pub fn from_csv_row(row: &str) -> anyhow::Result<Self> {
        let columns: Vec<f64> = row
            .split(',')
            .skip(1)
            .map(|col| {
                col.trim()
                    .parse::<f64>()
                    .with_context(|| format!("bad metric column {col:?}"))
            })
            .collect::<anyhow::Result<_>>()?;
        anyhow::ensure!(
            columns.len() >= 13,
            "expected 14 metric columns, got {}",
            columns.len() + 1
        );

        Ok(Self {
            train_box_loss: columns[0],
            train_cls_loss: columns[1],
            train_dfl_loss: columns[2],
            metrics_precision_b: columns[3],
            metrics_recall_b: columns[4],
            metrics_map50_b: columns[5],
            metrics_map50_95_b: columns[6],
            val_box_loss: columns[7],
            val_cls_loss: columns[8],
            val_dfl_loss: columns[9],
            lr_pg0: columns[10],
            lr_pg1: columns[11],
            lr_pg2: columns[12],
        })
    }

    /// Metric names and values in the order they are logged to the tracker.
    pub fn entries(&self) -> [(&'static str, f64); 13] {
        [
            ("train_box_loss", self.train_box_loss),
            ("train_cls_loss", self.train_cls_loss),
            ("train_dfl_loss", self.train_dfl_loss),
            ("metrics_precision_B", self.metrics_precision_b),
            ("metrics_recall_B", self.metrics_recall_b),
            ("metrics_mAP50_B", self.metrics_map50_b),
            ("metrics_mAP50_95_B", self.metrics_map50_95_b),
            ("val_box_loss", self.val_box_loss),
            ("val_cls_loss", self.val_cls_loss),
            ("val_dfl_loss", self.val_dfl_loss),
            ("lr_pg0", self.lr_pg0),
            ("lr_pg1", self.lr_pg1),
            ("lr_pg2", self.lr_pg2),
        ]
    }
}
