use std::error::Error;
use std::fmt::Debug;
use std::hash::Hash;

use nalgebra::{DMatrix, DVector};
use num_traits::{FromPrimitive, Num, ToPrimitive};

type ConfusionMatrix = DMatrix<f64>;

pub trait LabelValue:
    Debug + Clone + Copy + Num + FromPrimitive + ToPrimitive + PartialOrd + Eq + Hash + 'static
{
}

impl<T> LabelValue for T where
    T: Debug + Clone + Copy + Num + FromPrimitive + ToPrimitive + PartialOrd + Eq + Hash + 'static
{
}

/// Classification metrics over a fixed class count.
///
/// Predictions outside `[0, num_classes)` (in particular the no-decision
/// sentinel) count as errors: they contribute a false negative for the true
/// class but appear in neither the confusion matrix nor any false-positive
/// tally.
pub trait ClassificationMetrics<T: LabelValue> {
    /// Per-class true-positive, false-positive and false-negative tallies.
    ///
    /// # Errors
    ///
    /// Returns an error if the label vectors differ in length or a true
    /// label falls outside `[0, num_classes)`.
    fn class_tallies(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>), Box<dyn Error>> {
        if y_true.len() != y_pred.len() {
            return Err("Predictions and labels are of different sizes.".into());
        }
        let mut true_positives = DVector::zeros(num_classes);
        let mut false_positives = DVector::zeros(num_classes);
        let mut false_negatives = DVector::zeros(num_classes);
        for (truth, pred) in y_true.iter().zip(y_pred.iter()) {
            let truth_class = class_index(truth, num_classes)
                .ok_or("A true label falls outside the class range.")?;
            match class_index(pred, num_classes) {
                Some(pred_class) if pred_class == truth_class => {
                    true_positives[truth_class] += 1.0;
                }
                Some(pred_class) => {
                    false_positives[pred_class] += 1.0;
                    false_negatives[truth_class] += 1.0;
                }
                None => {
                    false_negatives[truth_class] += 1.0;
                }
            }
        }
        Ok((true_positives, false_positives, false_negatives))
    }

    /// Fraction of exactly matching predictions.
    fn accuracy(&self, y_true: &DVector<T>, y_pred: &DVector<T>) -> Result<f64, Box<dyn Error>> {
        if y_true.len() != y_pred.len() {
            return Err("Predictions and labels are of different sizes.".into());
        }
        if y_true.is_empty() {
            return Err("There are no predictions to evaluate.".into());
        }
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(truth, pred)| truth == pred)
            .count();
        Ok(correct as f64 / y_true.len() as f64)
    }

    /// Confusion matrix with predicted classes as rows and actual classes as
    /// columns, normalized by the number of samples.
    fn confusion_matrix(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<ConfusionMatrix, Box<dyn Error>> {
        if y_true.len() != y_pred.len() {
            return Err("Predictions and labels are of different sizes.".into());
        }
        if y_true.is_empty() {
            return Err("There are no predictions to evaluate.".into());
        }
        let mut matrix = DMatrix::zeros(num_classes, num_classes);
        for (truth, pred) in y_true.iter().zip(y_pred.iter()) {
            let truth_class = class_index(truth, num_classes)
                .ok_or("A true label falls outside the class range.")?;
            if let Some(pred_class) = class_index(pred, num_classes) {
                matrix[(pred_class, truth_class)] += 1.0;
            }
        }
        Ok(matrix / y_true.len() as f64)
    }

    /// One-vs-all precision per class; classes never predicted score zero.
    fn precision_per_class(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<DVector<f64>, Box<dyn Error>> {
        let (tp, fp, _) = self.class_tallies(y_true, y_pred, num_classes)?;
        let mut precision = DVector::zeros(num_classes);
        for class in 0..num_classes {
            if tp[class] + fp[class] > 0.0 {
                precision[class] = tp[class] / (tp[class] + fp[class]);
            }
        }
        Ok(precision)
    }

    /// One-vs-all recall per class; classes absent from the truth score zero.
    fn recall_per_class(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<DVector<f64>, Box<dyn Error>> {
        let (tp, _, fn_) = self.class_tallies(y_true, y_pred, num_classes)?;
        let mut recall = DVector::zeros(num_classes);
        for class in 0..num_classes {
            if tp[class] + fn_[class] > 0.0 {
                recall[class] = tp[class] / (tp[class] + fn_[class]);
            }
        }
        Ok(recall)
    }

    fn micro_avg_precision(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<f64, Box<dyn Error>> {
        let (tp, fp, _) = self.class_tallies(y_true, y_pred, num_classes)?;
        let denominator = tp.sum() + fp.sum();
        if denominator > 0.0 {
            Ok(tp.sum() / denominator)
        } else {
            Ok(0.0)
        }
    }

    fn micro_avg_recall(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<f64, Box<dyn Error>> {
        let (tp, _, fn_) = self.class_tallies(y_true, y_pred, num_classes)?;
        let denominator = tp.sum() + fn_.sum();
        if denominator > 0.0 {
            Ok(tp.sum() / denominator)
        } else {
            Ok(0.0)
        }
    }

    fn macro_avg_precision(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<f64, Box<dyn Error>> {
        let precision = self.precision_per_class(y_true, y_pred, num_classes)?;
        Ok(precision.sum() / num_classes as f64)
    }

    fn macro_avg_recall(
        &self,
        y_true: &DVector<T>,
        y_pred: &DVector<T>,
        num_classes: usize,
    ) -> Result<f64, Box<dyn Error>> {
        let recall = self.recall_per_class(y_true, y_pred, num_classes)?;
        Ok(recall.sum() / num_classes as f64)
    }
}

fn class_index<T: LabelValue>(label: &T, num_classes: usize) -> Option<usize> {
    match label.to_usize() {
        Some(class) if class < num_classes => Some(class),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct MockClassifier;

    impl ClassificationMetrics<i32> for MockClassifier {}

    fn labels(values: &[i32]) -> DVector<i32> {
        DVector::from_row_slice(values)
    }

    #[test]
    fn test_accuracy() {
        let classifier = MockClassifier;
        let y_true = labels(&[1, 0, 1, 0, 1]);
        let y_pred = labels(&[1, 1, 0, 0, 1]);
        assert_eq!(classifier.accuracy(&y_true, &y_pred).unwrap(), 0.6);
    }

    #[test]
    fn test_accuracy_unequal_lengths() {
        let classifier = MockClassifier;
        let y_true = labels(&[1, 0, 1]);
        let y_pred = labels(&[1, 1]);
        assert!(classifier.accuracy(&y_true, &y_pred).is_err());
    }

    #[test]
    fn test_accuracy_empty() {
        let classifier = MockClassifier;
        assert!(classifier.accuracy(&labels(&[]), &labels(&[])).is_err());
    }

    #[test]
    fn test_confusion_matrix_is_normalized() {
        let classifier = MockClassifier;
        let y_true = labels(&[0, 1, 1, 0]);
        let y_pred = labels(&[0, 1, 0, 0]);
        let matrix = classifier.confusion_matrix(&y_true, &y_pred, 2).unwrap();
        // Rows are predictions, columns are actual classes.
        assert_relative_eq!(matrix[(0, 0)], 0.5);
        assert_relative_eq!(matrix[(0, 1)], 0.25);
        assert_relative_eq!(matrix[(1, 1)], 0.25);
        assert_relative_eq!(matrix.sum(), 1.0);
    }

    #[test]
    fn test_sentinel_prediction_counts_as_miss() {
        let classifier = MockClassifier;
        let y_true = labels(&[0, 1]);
        let y_pred = labels(&[-2, 1]);
        assert_eq!(classifier.accuracy(&y_true, &y_pred).unwrap(), 0.5);
        let matrix = classifier.confusion_matrix(&y_true, &y_pred, 2).unwrap();
        // The sentinel stays out of the matrix entirely.
        assert_relative_eq!(matrix.sum(), 0.5);
        let (tp, fp, fn_) = classifier.class_tallies(&y_true, &y_pred, 2).unwrap();
        assert_eq!(tp[0], 0.0);
        assert_eq!(fp.sum(), 0.0);
        assert_eq!(fn_[0], 1.0);
        assert_eq!(tp[1], 1.0);
    }

    #[test]
    fn test_out_of_range_truth_is_an_error() {
        let classifier = MockClassifier;
        let y_true = labels(&[0, 5]);
        let y_pred = labels(&[0, 1]);
        assert!(classifier.class_tallies(&y_true, &y_pred, 2).is_err());
    }

    #[test]
    fn test_micro_and_macro_averages() {
        let classifier = MockClassifier;
        let y_true = labels(&[0, 1, 2, 1, 0, 2]);
        let y_pred = labels(&[0, 2, 1, 1, 0, 2]);
        let micro_precision = classifier.micro_avg_precision(&y_true, &y_pred, 3).unwrap();
        assert_relative_eq!(micro_precision, 4.0 / 6.0);
        let macro_precision = classifier.macro_avg_precision(&y_true, &y_pred, 3).unwrap();
        assert_relative_eq!(macro_precision, (1.0 + 0.5 + 0.5) / 3.0);
        let micro_recall = classifier.micro_avg_recall(&y_true, &y_pred, 3).unwrap();
        assert_relative_eq!(micro_recall, 4.0 / 6.0);
        let macro_recall = classifier.macro_avg_recall(&y_true, &y_pred, 3).unwrap();
        assert_relative_eq!(macro_recall, (1.0 + 0.5 + 0.5) / 3.0);
    }

    #[test]
    fn test_perfect_classification() {
        let classifier = MockClassifier;
        let y_true = labels(&[1, 0, 1, 0]);
        assert_eq!(classifier.accuracy(&y_true, &y_true).unwrap(), 1.0);
        assert_eq!(
            classifier.macro_avg_precision(&y_true, &y_true, 2).unwrap(),
            1.0
        );
        assert_eq!(classifier.micro_avg_recall(&y_true, &y_true, 2).unwrap(), 1.0);
    }
}
