use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{BatchSummary, FeatureImportance, Prediction};
use crate::risk;

const BAR_WIDTH: usize = 40;

/// Horizontal text bars, one line per item. Values are scaled so `max`
/// fills the full width.
pub fn bar_chart(items: &[(String, f64)], max: f64) -> String {
    let label_width = items.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut output = String::new();

    for (label, value) in items {
        let filled = if max > 0.0 {
            ((value / max).clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            output,
            "{label:<label_width$} |{}{} {value:.3}",
            "█".repeat(filled),
            " ".repeat(BAR_WIDTH - filled)
        );
    }

    output
}

pub fn probability_chart(prediction: &Prediction) -> String {
    bar_chart(&prediction.probabilities, 1.0)
}

pub fn importance_chart(ranked: &[FeatureImportance], top: usize) -> String {
    let items: Vec<(String, f64)> = ranked
        .iter()
        .take(top)
        .map(|f| (f.feature.clone(), f.importance))
        .collect();
    let max = items.first().map_or(0.0, |(_, v)| *v);
    bar_chart(&items, max)
}

pub fn summary_lines(summary: &BatchSummary) -> String {
    let mut output = String::new();
    for class in &summary.classes {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            class.label,
            class.count,
            class.proportion * 100.0
        );
    }
    if summary.unknown > 0 {
        let _ = writeln!(output, "- unknown: {}", summary.unknown);
    }
    output
}

pub struct ReportInput<'a> {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    pub summary: &'a BatchSummary,
    pub predictions: &'a [Prediction],
    pub importance: Option<&'a [FeatureImportance]>,
    pub limit: usize,
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Dropout Prediction Report");
    let _ = writeln!(
        output,
        "Run {} over {} ({} students), generated {}",
        input.run_id,
        input.source,
        input.summary.total,
        input.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Predicted Outcomes");

    if input.summary.total == 0 {
        let _ = writeln!(output, "No students in this batch.");
    } else {
        output.push_str(&summary_lines(input.summary));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Dropout Risk");

    let ranked = risk::rank_by_dropout_risk(input.predictions);
    if ranked.is_empty() {
        let _ = writeln!(output, "No students in this batch.");
    } else {
        for idx in ranked.into_iter().take(input.limit) {
            let prediction = &input.predictions[idx];
            let _ = writeln!(
                output,
                "- row {}: {} {} (dropout {:.1}%, confidence {:.1}%)",
                idx + 1,
                prediction.status.marker(),
                prediction.status,
                prediction.probability_of("Dropout").unwrap_or(0.0) * 100.0,
                prediction.confidence * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feature Importance");

    match input.importance {
        Some(ranked) if !ranked.is_empty() => {
            let _ = writeln!(output, "```");
            output.push_str(&importance_chart(ranked, 15));
            let _ = writeln!(output, "```");
        }
        _ => {
            let _ = writeln!(output, "The model does not report feature importance.");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassSummary, Status};

    fn prediction(label: &str, dropout: f64) -> Prediction {
        let rest = (1.0 - dropout) / 2.0;
        Prediction {
            label: label.to_string(),
            status: Status::from_label(label),
            probabilities: vec![
                ("Dropout".to_string(), dropout),
                ("Enrolled".to_string(), rest),
                ("Graduate".to_string(), rest),
            ],
            confidence: dropout.max(rest),
        }
    }

    #[test]
    fn bars_scale_to_max() {
        let chart = bar_chart(&[("a".to_string(), 1.0), ("bb".to_string(), 0.5)], 1.0);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0].matches('█').count(), BAR_WIDTH);
        assert_eq!(lines[1].matches('█').count(), BAR_WIDTH / 2);
        assert!(lines[1].starts_with("bb |"));
    }

    #[test]
    fn zero_max_draws_empty_bars() {
        let chart = bar_chart(&[("a".to_string(), 0.0)], 0.0);
        assert_eq!(chart.matches('█').count(), 0);
    }

    #[test]
    fn report_lists_riskiest_rows_first() {
        let predictions = vec![prediction("Graduate", 0.1), prediction("Dropout", 0.8)];
        let summary = BatchSummary {
            total: 2,
            classes: vec![
                ClassSummary {
                    label: "Dropout".to_string(),
                    count: 1,
                    proportion: 0.5,
                },
                ClassSummary {
                    label: "Graduate".to_string(),
                    count: 1,
                    proportion: 0.5,
                },
            ],
            unknown: 0,
        };
        let report = build_report(&ReportInput {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source: "cohort.csv",
            summary: &summary,
            predictions: &predictions,
            importance: None,
            limit: 10,
        });

        assert!(report.contains("- Dropout: 1 (50.0%)"));
        let first = report.find("- row 2").unwrap();
        let second = report.find("- row 1").unwrap();
        assert!(first < second);
        assert!(report.contains("does not report feature importance"));
    }
}
