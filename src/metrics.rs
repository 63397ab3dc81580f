use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// `truth` and `predicted` hold class indices into `labels`.
    pub fn new(labels: &[String], truth: &[usize], predicted: &[usize]) -> Self {
        let n_classes = labels.len();
        let mut true_positive = vec![0usize; n_classes];
        let mut predicted_count = vec![0usize; n_classes];
        let mut support = vec![0usize; n_classes];

        for (&t, &p) in truth.iter().zip(predicted) {
            support[t] += 1;
            predicted_count[p] += 1;
            if t == p {
                true_positive[t] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = (0..n_classes)
            .filter(|&c| support[c] > 0 || predicted_count[c] > 0)
            .map(|c| {
                let precision = ratio(true_positive[c], predicted_count[c]);
                let recall = ratio(true_positive[c], support[c]);
                ClassMetrics {
                    label: labels[c].clone(),
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support: support[c],
                }
            })
            .collect();

        let total = truth.len();
        let correct: usize = true_positive.iter().sum();

        Self {
            macro_avg: average(&classes, "macro avg", |_| 1.0),
            weighted_avg: average(&classes, "weighted avg", |m| m.support as f64),
            accuracy: ratio(correct, total),
            classes,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn average(classes: &[ClassMetrics], label: &str, weight: impl Fn(&ClassMetrics) -> f64) -> ClassMetrics {
    let total_weight: f64 = classes.iter().map(&weight).sum();
    let mean = |value: fn(&ClassMetrics) -> f64| {
        if total_weight == 0.0 {
            0.0
        } else {
            classes.iter().map(|m| weight(m) * value(m)).sum::<f64>() / total_weight
        }
    };

    ClassMetrics {
        label: label.to_owned(),
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
        support: classes.iter().map(|m| m.support).sum(),
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for m in [&self.macro_avg, &self.weighted_avg] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["hindi".into(), "tamil".into(), "telugu".into()]
    }

    #[test]
    fn test_perfect_predictions() {
        let truth = [0, 1, 2, 1];
        let report = ClassificationReport::new(&labels(), &truth, &truth);
        assert_eq!(report.accuracy, 1.0);
        assert!(report.classes.iter().all(|m| m.f1 == 1.0));
        assert_eq!(report.weighted_avg.support, 4);
    }

    #[test]
    fn test_mixed_predictions() {
        let truth = [0, 0, 1, 1];
        let predicted = [0, 1, 1, 1];
        let report = ClassificationReport::new(&labels(), &truth, &predicted);

        assert_eq!(report.accuracy, 0.75);
        let hindi = &report.classes[0];
        assert_eq!(hindi.precision, 1.0);
        assert_eq!(hindi.recall, 0.5);
        let tamil = &report.classes[1];
        assert!((tamil.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(tamil.recall, 1.0);
        // telugu never appears and is left out
        assert_eq!(report.classes.len(), 2);
    }

    #[test]
    fn test_display_lists_every_class() {
        let report = ClassificationReport::new(&labels(), &[0, 1, 2], &[0, 1, 1]);
        let text = report.to_string();
        for label in ["hindi", "tamil", "telugu", "accuracy", "macro avg", "weighted avg"] {
            assert!(text.contains(label), "missing {label} in\n{text}");
        }
    }
}
