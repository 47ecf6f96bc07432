use crate::align::AlignedTable;
use crate::error::{PipelineError, Result};
use crate::model::Classifier;
use crate::models::Status;

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Raw model output with the class order the probability columns follow.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub classes: Vec<String>,
    pub labels: Vec<String>,
    pub probabilities: Vec<Vec<f64>>,
}

/// Runs the model once over the whole table.
pub fn infer(model: &dyn Classifier, x: &AlignedTable) -> Result<Inference> {
    let labels = model.predict(x)?;
    let probabilities = model.predict_proba(x)?;

    if labels.len() != x.n_rows() || probabilities.len() != x.n_rows() {
        return Err(PipelineError::Inference(format!(
            "model returned {} labels and {} probability rows for {} inputs",
            labels.len(),
            probabilities.len(),
            x.n_rows()
        )));
    }

    let (classes, declared) = match model.classes() {
        Some(classes) => (classes.to_vec(), true),
        None => {
            log::warn!(
                "{} does not expose its classes, assuming {:?}",
                model.name(),
                Status::FALLBACK_ORDER
            );
            (
                Status::FALLBACK_ORDER.iter().map(|s| s.to_string()).collect(),
                false,
            )
        }
    };

    for row in &probabilities {
        if row.len() != classes.len() {
            return Err(PipelineError::ClassMismatch {
                expected: classes.len(),
                got: row.len(),
            });
        }
    }
    for (idx, row) in probabilities.iter().enumerate() {
        check_probabilities(row).map_err(|reason| {
            PipelineError::Inference(format!("row {}: {reason}", idx + 1))
        })?;
    }

    let labels = if declared {
        labels
    } else {
        labels
            .into_iter()
            .map(|label| fallback_label(&label, &classes))
            .collect()
    };

    Ok(Inference {
        classes,
        labels,
        probabilities,
    })
}

/// Integer-coded predictions map onto the fallback order by position.
fn fallback_label(label: &str, classes: &[String]) -> String {
    label
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|idx| classes.get(idx))
        .cloned()
        .unwrap_or_else(|| label.to_string())
}

fn check_probabilities(row: &[f64]) -> std::result::Result<(), String> {
    if row.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(format!("invalid probabilities {row:?}"));
    }
    let total: f64 = row.iter().sum();
    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(format!("probabilities sum to {total}"));
    }
    Ok(())
}
