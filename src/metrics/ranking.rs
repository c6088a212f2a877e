//! Rank-then-threshold classification metrics.
//!
//! Records are sorted by score, highest first (ties keep their input order),
//! and the top `k` percent are flagged positive. Every metric here compares
//! the sorted true labels against that 0/1 vector. Undefined ratios
//! (nothing flagged, no positives, a single class) are reported as 0.0.
//! Labels and scores must have the same length.

use super::calculator::MetricsError;

/// Number of records flagged at `k` percent of `n`: `floor(n * k / 100)`.
pub fn cutoff_index(n: usize, k: f64) -> usize {
    if n == 0 || k <= 0.0 {
        return 0;
    }
    ((n as f64 * (k / 100.0)) as usize).min(n)
}

/// Indices of `scores`, highest score first. Equal scores keep their input
/// order; `-0.0` and `0.0` are equal.
pub(crate) fn descending_order(scores: &[f64]) -> Vec<usize> {
    let keys: Vec<f64> = scores.iter().map(|&s| s + 0.0).collect();
    let mut order: Vec<usize> = (0..keys.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| keys[b].total_cmp(&keys[a]));
    order
}

/// Labels reordered by descending score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    sorted_labels: Vec<u8>,
    positives: usize,
}

impl Ranking {
    pub fn new(labels: &[u8], scores: &[f64]) -> Result<Self, MetricsError> {
        if labels.len() != scores.len() {
            return Err(MetricsError::LengthMismatch {
                labels: labels.len(),
                scores: scores.len(),
            });
        }
        let order = descending_order(scores);
        let sorted_labels: Vec<u8> = order.iter().map(|&i| labels[i]).collect();
        let positives = sorted_labels.iter().filter(|&&label| label == 1).count();
        Ok(Self {
            sorted_labels,
            positives,
        })
    }

    pub fn len(&self) -> usize {
        self.sorted_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_labels.is_empty()
    }

    pub fn sorted_labels(&self) -> &[u8] {
        &self.sorted_labels
    }

    /// 0/1 predictions aligned with [`Ranking::sorted_labels`].
    pub fn binarize(&self, k: f64) -> Vec<u8> {
        let cutoff = cutoff_index(self.len(), k);
        (0..self.len()).map(|rank| u8::from(rank < cutoff)).collect()
    }

    pub fn confusion(&self, k: f64) -> Confusion {
        let cutoff = cutoff_index(self.len(), k);
        let tp = self.sorted_labels[..cutoff]
            .iter()
            .filter(|&&label| label == 1)
            .count();
        let fp = cutoff - tp;
        let fn_ = self.positives - tp;
        let tn = self.len() - cutoff - fn_;
        Confusion { tp, fp, tn, fn_ }
    }
}

/// Confusion counts at one cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Confusion {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }

    /// ROC AUC of a 0/1 prediction vector: mean of TPR and TNR.
    pub fn auc_roc(&self) -> f64 {
        let positives = self.tp + self.fn_;
        let negatives = self.fp + self.tn;
        if positives == 0 || negatives == 0 {
            return 0.0;
        }
        0.5 * (ratio(self.tp, positives) + ratio(self.tn, negatives))
    }
}

/// Sort by score descending and flag the top `k` percent.
///
/// Returns `(sorted_labels, predictions)`.
pub fn rank_and_binarize(
    scores: &[f64],
    labels: &[u8],
    k: f64,
) -> Result<(Vec<u8>, Vec<u8>), MetricsError> {
    let ranking = Ranking::new(labels, scores)?;
    let predictions = ranking.binarize(k);
    Ok((ranking.sorted_labels, predictions))
}

pub fn precision_at_k(labels: &[u8], scores: &[f64], k: f64) -> Result<f64, MetricsError> {
    Ok(Ranking::new(labels, scores)?.confusion(k).precision())
}

pub fn recall_at_k(labels: &[u8], scores: &[f64], k: f64) -> Result<f64, MetricsError> {
    Ok(Ranking::new(labels, scores)?.confusion(k).recall())
}

pub fn compute_acc(labels: &[u8], scores: &[f64], k: f64) -> Result<f64, MetricsError> {
    Ok(Ranking::new(labels, scores)?.confusion(k).accuracy())
}

pub fn compute_f1(labels: &[u8], scores: &[f64], k: f64) -> Result<f64, MetricsError> {
    Ok(Ranking::new(labels, scores)?.confusion(k).f1())
}

/// AUC between the true labels and the binarized-at-`k` predictions.
pub fn compute_auc_roc(labels: &[u8], scores: &[f64], k: f64) -> Result<f64, MetricsError> {
    Ok(Ranking::new(labels, scores)?.confusion(k).auc_roc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::curves::roc_auc;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const SCORES: [f64; 3] = [0.9, 0.1, 0.5];
    const LABELS: [u8; 3] = [1, 0, 1];

    #[test]
    fn test_cutoff_index() {
        assert_eq!(cutoff_index(3, 33.0), 0);
        assert_eq!(cutoff_index(3, 34.0), 1);
        assert_eq!(cutoff_index(10, 100.0), 10);
        assert_eq!(cutoff_index(7, 50.0), 3);
        assert_eq!(cutoff_index(0, 50.0), 0);
        assert_eq!(cutoff_index(10, 0.0), 0);
    }

    #[test]
    fn test_rank_and_binarize() {
        let (sorted, predictions) = rank_and_binarize(&SCORES, &LABELS, 34.0).unwrap();
        assert_eq!(sorted, vec![1, 1, 0]);
        assert_eq!(predictions, vec![1, 0, 0]);
    }

    #[test]
    fn test_k33_flags_nothing() {
        let (_, predictions) = rank_and_binarize(&SCORES, &LABELS, 33.0).unwrap();
        assert_eq!(predictions, vec![0, 0, 0]);
        assert_eq!(precision_at_k(&LABELS, &SCORES, 33.0).unwrap(), 0.0);
        assert_eq!(recall_at_k(&LABELS, &SCORES, 33.0).unwrap(), 0.0);
    }

    #[test]
    fn test_k34_flags_top_record() {
        assert_relative_eq!(precision_at_k(&LABELS, &SCORES, 34.0).unwrap(), 1.0);
        assert_relative_eq!(recall_at_k(&LABELS, &SCORES, 34.0).unwrap(), 0.5);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let scores = [0.5, 0.5, 0.5, 0.5];
        let labels = [0, 1, 1, 0];
        let (sorted, _) = rank_and_binarize(&scores, &labels, 50.0).unwrap();
        assert_eq!(sorted, vec![0, 1, 1, 0]);
        assert_eq!(precision_at_k(&labels, &scores, 50.0).unwrap(), 0.5);
        assert_eq!(precision_at_k(&labels, &scores, 25.0).unwrap(), 0.0);
    }

    #[test]
    fn test_signed_zeros_are_ties() {
        let scores = [-0.0, 0.0];
        let labels = [1, 0];
        let (sorted, predictions) = rank_and_binarize(&scores, &labels, 50.0).unwrap();
        assert_eq!(sorted, vec![1, 0]);
        assert_eq!(predictions, vec![1, 0]);
        assert_eq!(precision_at_k(&labels, &scores, 50.0).unwrap(), 1.0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let err = precision_at_k(&[1, 0, 1], &[0.9, 0.1], 100.0).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::LengthMismatch {
                labels: 3,
                scores: 2
            }
        ));
        assert!(rank_and_binarize(&[0.9], &[1, 0], 50.0).is_err());
        assert!(Ranking::new(&[1], &[]).is_err());
    }

    #[test]
    fn test_precision_at_100_is_base_rate() {
        let labels = [1, 0, 0, 1, 0];
        let scores = [0.3, 0.2, 0.9, 0.1, 0.5];
        assert_relative_eq!(precision_at_k(&labels, &scores, 100.0).unwrap(), 0.4);
        assert_relative_eq!(recall_at_k(&labels, &scores, 100.0).unwrap(), 1.0);
    }

    #[test]
    fn test_threshold_metrics() {
        // sorted labels: 1 1 0 1 0 0 0 0 0 0
        let scores = [0.95, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1];
        let labels = [1, 1, 0, 1, 0, 0, 0, 0, 0, 0];
        // top 30%: 1 1 0 -> tp 2, fp 1, fn 1, tn 6
        assert_relative_eq!(precision_at_k(&labels, &scores, 30.0).unwrap(), 2.0 / 3.0);
        assert_relative_eq!(recall_at_k(&labels, &scores, 30.0).unwrap(), 2.0 / 3.0);
        assert_relative_eq!(compute_acc(&labels, &scores, 30.0).unwrap(), 0.8);
        assert_relative_eq!(compute_f1(&labels, &scores, 30.0).unwrap(), 2.0 / 3.0);
        assert_relative_eq!(
            compute_auc_roc(&labels, &scores, 30.0).unwrap(),
            0.5 * (2.0 / 3.0 + 6.0 / 7.0)
        );
    }

    #[test]
    fn test_auc_on_binarized_matches_curve() {
        let scores = [0.95, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1];
        let labels = [1, 0, 0, 1, 0, 1, 0, 0, 0, 0];
        for k in [10.0, 20.0, 50.0, 80.0] {
            let (sorted, predictions) = rank_and_binarize(&scores, &labels, k).unwrap();
            let binary: Vec<f64> = predictions.iter().map(|&p| p as f64).collect();
            assert_relative_eq!(
                compute_auc_roc(&labels, &scores, k).unwrap(),
                roc_auc(&sorted, &binary),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(precision_at_k(&[], &[], 10.0).unwrap(), 0.0);
        assert_eq!(compute_acc(&[], &[], 10.0).unwrap(), 0.0);
        assert_eq!(compute_auc_roc(&[1, 1], &[0.2, 0.1], 50.0).unwrap(), 0.0);
        assert_eq!(recall_at_k(&[0, 0], &[0.2, 0.1], 50.0).unwrap(), 0.0);
        assert_eq!(compute_f1(&[0, 0], &[0.2, 0.1], 50.0).unwrap(), 0.0);
    }

    #[test]
    fn test_scores_need_not_be_probabilities() {
        let labels = [0, 1, 0, 1];
        let margins = [-3.2, 4.5, -0.1, 12.0];
        assert_relative_eq!(precision_at_k(&labels, &margins, 50.0).unwrap(), 1.0);
        assert_relative_eq!(recall_at_k(&labels, &margins, 50.0).unwrap(), 1.0);
    }

    fn labelled_scores() -> impl Strategy<Value = (Vec<u8>, Vec<f64>)> {
        (1usize..60).prop_flat_map(|n| {
            (
                proptest::collection::vec(0u8..=1, n),
                proptest::collection::vec(-100.0f64..100.0, n),
            )
        })
    }

    proptest! {
        #[test]
        fn test_recall_monotone_in_k((labels, scores) in labelled_scores()) {
            let mut previous = 0.0;
            for k in 0..=100 {
                let recall = recall_at_k(&labels, &scores, k as f64).unwrap();
                prop_assert!(recall >= previous);
                previous = recall;
            }
        }

        #[test]
        fn test_metrics_bounded((labels, scores) in labelled_scores(), k in 0.0f64..=100.0) {
            for value in [
                precision_at_k(&labels, &scores, k).unwrap(),
                recall_at_k(&labels, &scores, k).unwrap(),
                compute_acc(&labels, &scores, k).unwrap(),
                compute_f1(&labels, &scores, k).unwrap(),
                compute_auc_roc(&labels, &scores, k).unwrap(),
            ] {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }

        #[test]
        fn test_metrics_idempotent((labels, scores) in labelled_scores(), k in 0.0f64..=100.0) {
            prop_assert_eq!(
                precision_at_k(&labels, &scores, k).unwrap().to_bits(),
                precision_at_k(&labels, &scores, k).unwrap().to_bits()
            );
            prop_assert_eq!(
                rank_and_binarize(&scores, &labels, k).unwrap(),
                rank_and_binarize(&scores, &labels, k).unwrap()
            );
        }
    }
}
