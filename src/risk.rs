use crate::inference::Inference;
use crate::models::{BatchSummary, ClassSummary, Prediction, Status};
use crate::table::BatchTable;

pub const PREDICTED_STATUS_COLUMN: &str = "Predicted_Status";
pub const PREDICTED_STATUS_LABEL_COLUMN: &str = "Predicted_Status_Label";
pub const CONFIDENCE_COLUMN: &str = "Confidence";

pub fn probability_column(label: &str) -> String {
    format!("{label}_Probability")
}

pub fn format_predictions(inference: &Inference) -> Vec<Prediction> {
    inference
        .labels
        .iter()
        .zip(&inference.probabilities)
        .map(|(label, proba)| {
            let status = Status::from_label(label);
            if !status.is_known() {
                log::warn!("model predicted unexpected label {label:?}");
            }
            Prediction {
                label: label.clone(),
                status,
                probabilities: inference.classes.iter().cloned().zip(proba.iter().copied()).collect(),
                confidence: proba.iter().copied().fold(0.0, f64::max),
            }
        })
        .collect()
}

/// Counts per class, in `classes` order. Labels outside `classes` are
/// tallied as unknown so the counts always add up to the batch size.
pub fn summarize(predictions: &[Prediction], classes: &[String]) -> BatchSummary {
    let total = predictions.len();
    let proportion = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };

    let summaries: Vec<ClassSummary> = classes
        .iter()
        .map(|class| {
            let count = predictions.iter().filter(|p| &p.label == class).count();
            ClassSummary {
                label: class.clone(),
                count,
                proportion: proportion(count),
            }
        })
        .collect();

    let unknown = predictions
        .iter()
        .filter(|p| !classes.contains(&p.label))
        .count();
    BatchSummary {
        total,
        classes: summaries,
        unknown,
    }
}

/// Row indices ordered by dropout probability, highest first.
pub fn rank_by_dropout_risk(predictions: &[Prediction]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..predictions.len()).collect();
    let risk = |idx: usize| predictions[idx].probability_of("Dropout").unwrap_or(0.0);
    indices.sort_by(|a, b| {
        risk(*b)
            .partial_cmp(&risk(*a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices
}

/// Copy of `input` with the prediction columns appended. A prediction
/// column the input already carries is overwritten in place.
pub fn results_table(input: &BatchTable, predictions: &[Prediction], classes: &[String]) -> BatchTable {
    let mut table = input.clone();
    let labels: Vec<String> = predictions.iter().map(|p| p.label.clone()).collect();
    table.push_column(PREDICTED_STATUS_COLUMN, labels.clone());
    table.push_column(PREDICTED_STATUS_LABEL_COLUMN, labels);
    for class in classes {
        table.push_column(
            probability_column(class),
            predictions
                .iter()
                .map(|p| format!("{:.6}", p.probability_of(class).unwrap_or(0.0)))
                .collect(),
        );
    }
    table.push_column(
        CONFIDENCE_COLUMN,
        predictions.iter().map(|p| format!("{:.6}", p.confidence)).collect(),
    );
    table
}
