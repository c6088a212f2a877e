//! Diagnostic curves over raw scores.

use serde::{Deserialize, Serialize};

use super::ranking::descending_order;

/// One point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// Precision and recall when everything scoring at least `threshold` is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrPoint {
    pub threshold: f64,
    /// Share of the population flagged.
    pub population_fraction: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Cumulative (flagged, true positives) at each distinct score, highest first.
fn cumulative_counts(labels: &[u8], scores: &[f64]) -> Vec<(f64, usize, usize)> {
    let n = labels.len().min(scores.len());
    let order = descending_order(&scores[..n]);

    let mut points = Vec::new();
    let mut tp = 0;
    for (rank, &i) in order.iter().enumerate() {
        tp += usize::from(labels[i] == 1);
        let last_of_tie = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_tie {
            points.push((scores[i], rank + 1, tp));
        }
    }
    points
}

/// ROC curve starting at (0, 0) with an infinite threshold.
///
/// Empty when either class is missing.
pub fn roc_curve(labels: &[u8], scores: &[f64]) -> Vec<RocPoint> {
    let positives = labels.iter().filter(|&&label| label == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Vec::new();
    }

    let mut curve = vec![RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    }];
    curve.extend(
        cumulative_counts(labels, scores)
            .into_iter()
            .map(|(threshold, flagged, tp)| RocPoint {
                threshold,
                fpr: (flagged - tp) as f64 / negatives as f64,
                tpr: tp as f64 / positives as f64,
            }),
    );
    curve
}

/// Trapezoidal area under a ROC curve.
pub fn auc(curve: &[RocPoint]) -> f64 {
    curve
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum()
}

/// ROC AUC of raw scores; 0.0 when either class is missing.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> f64 {
    auc(&roc_curve(labels, scores))
}

/// Precision and recall against the share of the population flagged.
pub fn precision_recall_curve(labels: &[u8], scores: &[f64]) -> Vec<PrPoint> {
    let n = labels.len().min(scores.len());
    let positives = labels.iter().filter(|&&label| label == 1).count();

    cumulative_counts(labels, scores)
        .into_iter()
        .map(|(threshold, flagged, tp)| PrPoint {
            threshold,
            population_fraction: flagged as f64 / n as f64,
            precision: tp as f64 / flagged as f64,
            recall: if positives == 0 {
                0.0
            } else {
                tp as f64 / positives as f64
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_ranking() {
        let labels = [1, 1, 0, 0];
        let scores = [0.9, 0.8, 0.2, 0.1];
        assert_relative_eq!(roc_auc(&labels, &scores), 1.0);
        assert_relative_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), 0.0);
    }

    #[test]
    fn test_roc_with_ties() {
        let labels = [1, 0, 1, 0];
        let scores = [0.5, 0.5, 0.5, 0.5];
        let curve = roc_curve(&labels, &scores);
        assert_eq!(curve.len(), 2);
        assert_relative_eq!(auc(&curve), 0.5);
    }

    #[test]
    fn test_roc_known_value() {
        // sklearn: roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        let labels = [0, 0, 1, 1];
        let scores = [0.1, 0.4, 0.35, 0.8];
        assert_relative_eq!(roc_auc(&labels, &scores), 0.75);

        let curve = roc_curve(&labels, &scores);
        assert!(curve[0].threshold.is_infinite());
        assert_eq!(curve.last().map(|p| (p.fpr, p.tpr)), Some((1.0, 1.0)));
    }

    #[test]
    fn test_signed_zero_scores_share_a_point() {
        let labels = [1, 0, 0];
        let scores = [0.5, -0.0, 0.0];
        let curve = precision_recall_curve(&labels, &scores);
        assert_eq!(curve.len(), 2);
        assert_relative_eq!(curve[1].population_fraction, 1.0);
    }

    #[test]
    fn test_single_class() {
        assert!(roc_curve(&[1, 1], &[0.1, 0.2]).is_empty());
        assert_eq!(roc_auc(&[0, 0], &[0.1, 0.2]), 0.0);
    }

    #[test]
    fn test_precision_recall_curve() {
        let labels = [1, 0, 1, 0];
        let scores = [0.9, 0.7, 0.7, 0.1];
        let curve = precision_recall_curve(&labels, &scores);
        assert_eq!(curve.len(), 3);

        assert_relative_eq!(curve[0].population_fraction, 0.25);
        assert_relative_eq!(curve[0].precision, 1.0);
        assert_relative_eq!(curve[0].recall, 0.5);

        // tie at 0.7 is flagged together
        assert_relative_eq!(curve[1].population_fraction, 0.75);
        assert_relative_eq!(curve[1].precision, 2.0 / 3.0);
        assert_relative_eq!(curve[1].recall, 1.0);

        assert_relative_eq!(curve[2].population_fraction, 1.0);
    }
}
