//! Evaluation metrics module.
//!
//! Rank-based, threshold-dependent scoring:
//! - Stable descending sort, top k% flagged positive
//! - Precision/recall at k%, accuracy/F1/AUC on the binarized vector
//! - ROC and precision/recall-vs-population curves for reporting

pub mod calculator;
pub mod curves;
pub mod ranking;

pub use calculator::{
    column_names, MetricsCalculator, MetricsError, ScoreRow, ThresholdMetrics, METRIC_COLUMNS,
    TABLE_COLUMNS, THRESHOLDS,
};
pub use curves::{auc, precision_recall_curve, roc_auc, roc_curve, PrPoint, RocPoint};
pub use ranking::{
    compute_acc, compute_auc_roc, compute_f1, cutoff_index, precision_at_k, rank_and_binarize,
    recall_at_k, Confusion, Ranking,
};
