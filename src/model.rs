use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::align::AlignedTable;
use crate::error::{PipelineError, Result};

/// The trained classifier as the pipeline sees it. `classes` and
/// `feature_importances` are optional capabilities; callers must check them.
pub trait Classifier: Send + Sync {
    /// Number of input columns the model was fitted on, when it knows.
    fn n_features(&self) -> Option<usize>;

    fn predict(&self, x: &AlignedTable) -> Result<Vec<String>>;

    /// One probability row per input row, one column per class.
    fn predict_proba(&self, x: &AlignedTable) -> Result<Vec<Vec<f64>>>;

    fn classes(&self) -> Option<&[String]> {
        None
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }

    fn name(&self) -> &str {
        "classifier"
    }
}

/// On-disk model format, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelArtifact {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

pub fn load_model(path: &Path) -> Result<Box<dyn Classifier>> {
    let startup = |reason: String| PipelineError::Startup {
        kind: "model",
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| startup(e.to_string()))?;
    let artifact: ModelArtifact = serde_json::from_str(&raw).map_err(|e| startup(e.to_string()))?;

    let model: Box<dyn Classifier> = match artifact {
        ModelArtifact::LogisticRegression(model) => {
            model.validate().map_err(startup)?;
            Box::new(model)
        }
        ModelArtifact::RandomForest(model) => {
            model.validate().map_err(startup)?;
            Box::new(model)
        }
    };

    log::info!(
        "loaded {} model from {} ({} features)",
        model.name(),
        path.display(),
        model
            .n_features()
            .map_or_else(|| "unknown".to_string(), |n| n.to_string())
    );
    Ok(model)
}

fn check_input(x: &AlignedTable, n_features: usize) -> Result<()> {
    if x.n_columns() != n_features {
        return Err(PipelineError::Inference(format!(
            "model expects {n_features} features, got {}",
            x.n_columns()
        )));
    }
    for (row_idx, row) in x.rows().iter().enumerate() {
        if let Some(col_idx) = row.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Inference(format!(
                "row {} has a non-finite value in {}",
                row_idx + 1,
                x.columns()[col_idx]
            )));
        }
    }
    Ok(())
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_idx, best), (idx, &v)| {
            if v > best {
                (idx, v)
            } else {
                (best_idx, best)
            }
        })
        .0
}

/// Declared class labels must be distinct and match the model's output width.
fn check_classes(classes: Option<&[String]>, n_classes: usize) -> std::result::Result<(), String> {
    let Some(classes) = classes else {
        return Ok(());
    };
    if classes.len() != n_classes {
        return Err(format!(
            "{} class labels for {n_classes} model outputs",
            classes.len()
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = classes.iter().find(|label| !seen.insert(label.as_str())) {
        return Err(format!("class label {dup:?} appears more than once"));
    }
    Ok(())
}

fn labels_from_proba(proba: &[Vec<f64>], classes: Option<&[String]>) -> Vec<String> {
    proba
        .iter()
        .map(|row| {
            let idx = argmax(row);
            match classes.and_then(|c| c.get(idx)) {
                Some(label) => label.clone(),
                None => idx.to_string(),
            }
        })
        .collect()
}

/// Multinomial logistic regression with an optional standard scaler in front.
#[derive(Debug, Deserialize)]
pub struct LogisticRegression {
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    #[serde(default)]
    scaler_mean: Option<Vec<f64>>,
    #[serde(default)]
    scaler_scale: Option<Vec<f64>>,
    #[serde(default)]
    classes: Option<Vec<String>>,
    #[serde(default)]
    feature_importances: Option<Vec<f64>>,
}

impl LogisticRegression {
    fn validate(&self) -> std::result::Result<(), String> {
        let width = self.coef.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err("logistic regression has no coefficients".to_string());
        }
        if self.coef.iter().any(|row| row.len() != width) {
            return Err("coefficient rows have different lengths".to_string());
        }
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "{} intercepts for {} coefficient rows",
                self.intercept.len(),
                self.coef.len()
            ));
        }
        for (name, values) in [("scaler_mean", &self.scaler_mean), ("scaler_scale", &self.scaler_scale)] {
            if let Some(values) = values {
                if values.len() != width {
                    return Err(format!("{name} has {} entries, expected {width}", values.len()));
                }
            }
        }
        if let Some(scale) = &self.scaler_scale {
            if scale.iter().any(|s| *s == 0.0) {
                return Err("scaler_scale contains zero".to_string());
            }
        }
        // A single coefficient row is the binary case: two probability columns.
        let n_outputs = if self.coef.len() == 1 { 2 } else { self.coef.len() };
        check_classes(self.classes.as_deref(), n_outputs)
    }

    fn scaled(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, v)| {
                let mean = self.scaler_mean.as_ref().map_or(0.0, |m| m[i]);
                let scale = self.scaler_scale.as_ref().map_or(1.0, |s| s[i]);
                (v - mean) / scale
            })
            .collect()
    }

    fn row_proba(&self, row: &[f64]) -> Vec<f64> {
        let x = self.scaled(row);
        let logits: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(weights, b)| weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect();

        if logits.len() == 1 {
            let p = 1.0 / (1.0 + (-logits[0]).exp());
            return vec![1.0 - p, p];
        }

        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> Option<usize> {
        self.coef.first().map(Vec::len)
    }

    fn predict(&self, x: &AlignedTable) -> Result<Vec<String>> {
        let proba = self.predict_proba(x)?;
        Ok(labels_from_proba(&proba, self.classes()))
    }

    fn predict_proba(&self, x: &AlignedTable) -> Result<Vec<Vec<f64>>> {
        check_input(x, self.coef[0].len())?;
        Ok(x.rows().iter().map(|row| self.row_proba(row)).collect())
    }

    fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}

/// One fitted tree in array form. A node is a leaf when `left` is -1;
/// otherwise `x[feature] <= threshold` descends left.
#[derive(Debug, Deserialize)]
pub struct DecisionTree {
    feature: Vec<i64>,
    threshold: Vec<f64>,
    left: Vec<i64>,
    right: Vec<i64>,
    value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> std::result::Result<(), String> {
        let n = self.left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [self.feature.len(), self.threshold.len(), self.right.len(), self.value.len()]
            .iter()
            .any(|len| *len != n)
        {
            return Err("tree arrays have different lengths".to_string());
        }

        for node in 0..n {
            let (left, right) = (self.left[node], self.right[node]);
            if left < 0 {
                if self.value[node].len() != n_classes {
                    return Err(format!("leaf {node} has {} class weights", self.value[node].len()));
                }
                if self.value[node].iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {node} has no weight"));
                }
                continue;
            }
            // Children always come after their parent, so traversal terminates.
            for child in [left, right] {
                if child as usize <= node || child as usize >= n {
                    return Err(format!("node {node} points to invalid child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {node} splits on unknown feature {feature}"));
            }
        }
        Ok(())
    }

    fn leaf_distribution(&self, row: &[f64]) -> Vec<f64> {
        let mut node = 0usize;
        while self.left[node] >= 0 {
            let feature = self.feature[node] as usize;
            node = if row[feature] <= self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        let weights = &self.value[node];
        let total: f64 = weights.iter().sum();
        weights.iter().map(|w| w / total).collect()
    }
}

/// Averaged decision trees, the sklearn `RandomForestClassifier` layout.
#[derive(Debug, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
    #[serde(default)]
    classes: Option<Vec<String>>,
    #[serde(default)]
    feature_importances: Option<Vec<f64>>,
}

impl RandomForest {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("random forest has no trees".to_string());
        }
        if self.n_features == 0 || self.n_classes == 0 {
            return Err("random forest needs at least one feature and one class".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|e| format!("tree {idx}: {e}"))?;
        }
        check_classes(self.classes.as_deref(), self.n_classes)
    }

    fn row_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in sums.iter_mut().zip(tree.leaf_distribution(row)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        sums.into_iter().map(|s| s / n_trees).collect()
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict(&self, x: &AlignedTable) -> Result<Vec<String>> {
        let proba = self.predict_proba(x)?;
        Ok(labels_from_proba(&proba, self.classes()))
    }

    fn predict_proba(&self, x: &AlignedTable) -> Result<Vec<Vec<f64>>> {
        check_input(x, self.n_features)?;
        Ok(x.rows().iter().map(|row| self.row_proba(row)).collect())
    }

    fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Two-feature forest: `GDP` decides Dropout vs Graduate, `Debtor`
    /// nudges towards Enrolled.
    pub fn forest_json(with_classes: bool) -> String {
        let classes = if with_classes {
            r#""classes": ["Dropout", "Enrolled", "Graduate"],"#
        } else {
            ""
        };
        format!(
            r#"{{
                "kind": "random_forest",
                "n_features": 2,
                "n_classes": 3,
                {classes}
                "feature_importances": [0.75, 0.25],
                "trees": [
                    {{
                        "feature": [0, -2, -2],
                        "threshold": [1.0, -2.0, -2.0],
                        "left": [1, -1, -1],
                        "right": [2, -1, -1],
                        "value": [[0, 0, 0], [8, 1, 1], [1, 1, 8]]
                    }},
                    {{
                        "feature": [1, -2, -2],
                        "threshold": [0.5, -2.0, -2.0],
                        "left": [1, -1, -1],
                        "right": [2, -1, -1],
                        "value": [[0, 0, 0], [2, 2, 6], [4, 5, 1]]
                    }}
                ]
            }}"#
        )
    }

    pub fn forest(with_classes: bool) -> RandomForest {
        let model: RandomForest = match serde_json::from_str(&forest_json(with_classes)) {
            Ok(ModelArtifact::RandomForest(m)) => m,
            other => panic!("unexpected artifact: {other:?}"),
        };
        model.validate().unwrap();
        model
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::forest;
    use super::*;
    use crate::align::align_records;
    use crate::models::RawRecord;
    use crate::schema::FeatureSchema;
    use std::io::Write;

    fn two_feature_table(rows: &[(f64, f64)]) -> AlignedTable {
        let schema = FeatureSchema::new(vec!["GDP".to_string(), "Debtor".to_string()]).unwrap();
        let records: Vec<RawRecord> = rows
            .iter()
            .map(|(gdp, debtor)| [("GDP", *gdp), ("Debtor", *debtor)].into_iter().collect())
            .collect();
        align_records(&records, &schema)
    }

    #[test]
    fn forest_averages_leaf_distributions() {
        let model = forest(true);
        let proba = model.predict_proba(&two_feature_table(&[(0.5, 0.0)])).unwrap();
        // tree 1 -> [0.8, 0.1, 0.1], tree 2 -> [0.2, 0.2, 0.6]
        let expected = [0.5, 0.15, 0.35];
        for (p, e) in proba[0].iter().zip(expected) {
            assert!((p - e).abs() < 1e-9);
        }
        assert_eq!(model.predict(&two_feature_table(&[(0.5, 0.0)])).unwrap(), ["Dropout"]);
    }

    #[test]
    fn forest_without_classes_predicts_positions() {
        let model = forest(false);
        let labels = model.predict(&two_feature_table(&[(3.0, 0.0)])).unwrap();
        assert_eq!(labels, ["2"]);
        assert!(model.classes().is_none());
    }

    #[test]
    fn rejects_wrong_width() {
        let model = forest(true);
        let schema = FeatureSchema::new(vec!["GDP".to_string()]).unwrap();
        let table = align_records(&[RawRecord::new()], &schema);
        let err = model.predict_proba(&table).unwrap_err();
        assert!(err.to_string().contains("expects 2 features"));
    }

    #[test]
    fn rejects_non_finite_cells() {
        let model = forest(true);
        let err = model.predict_proba(&two_feature_table(&[(f64::NAN, 0.0)])).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn logistic_regression_softmax_sums_to_one() {
        let model = LogisticRegression {
            coef: vec![vec![1.0, -0.5], vec![-1.0, 0.25], vec![0.0, 0.25]],
            intercept: vec![0.1, 0.2, -0.3],
            scaler_mean: Some(vec![1.0, 0.5]),
            scaler_scale: Some(vec![2.0, 0.5]),
            classes: Some(vec!["Dropout".into(), "Enrolled".into(), "Graduate".into()]),
            feature_importances: None,
        };
        model.validate().unwrap();
        let proba = model
            .predict_proba(&two_feature_table(&[(2.0, 1.0), (-4.0, 0.0)]))
            .unwrap();
        for row in &proba {
            assert_eq!(row.len(), 3);
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|p| *p >= 0.0));
        }
        assert!(model.feature_importances().is_none());
    }

    #[test]
    fn logistic_regression_rejects_ragged_coefficients() {
        let model = LogisticRegression {
            coef: vec![vec![1.0, 2.0], vec![1.0]],
            intercept: vec![0.0, 0.0],
            scaler_mean: None,
            scaler_scale: None,
            classes: None,
            feature_importances: None,
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn tree_with_backward_child_is_rejected() {
        let tree = DecisionTree {
            feature: vec![0, 0],
            threshold: vec![1.0, 1.0],
            left: vec![1, 0],
            right: vec![1, 0],
            value: vec![vec![1.0, 0.0], vec![1.0, 0.0]],
        };
        assert!(tree.validate(1, 2).is_err());
    }

    #[test]
    fn load_model_reads_tagged_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", super::fixtures::forest_json(true)).unwrap();
        let model = load_model(file.path()).unwrap();
        assert_eq!(model.name(), "random_forest");
        assert_eq!(model.n_features(), Some(2));
    }

    #[test]
    fn load_model_reports_missing_artifact() {
        let err = load_model(Path::new("/nonexistent/model.json"))
            .err()
            .expect("missing artifact must fail");
        assert!(matches!(err, PipelineError::Startup { kind: "model", .. }));
    }

    fn load_json(json: &str) -> Result<Box<dyn Classifier>> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        load_model(file.path())
    }

    fn startup_reason(result: Result<Box<dyn Classifier>>) -> String {
        match result.err().expect("artifact must be rejected") {
            PipelineError::Startup { kind: "model", reason, .. } => reason,
            other => panic!("expected a model startup error, got {other:?}"),
        }
    }

    #[test]
    fn load_model_rejects_duplicate_class_labels() {
        let json = super::fixtures::forest_json(true).replace(
            r#"["Dropout", "Enrolled", "Graduate"]"#,
            r#"["Dropout", "Dropout", "Graduate"]"#,
        );
        let reason = startup_reason(load_json(&json));
        assert!(reason.contains("\"Dropout\" appears more than once"), "{reason}");
    }

    #[test]
    fn load_model_rejects_class_count_other_than_n_classes() {
        let json = super::fixtures::forest_json(true).replace(
            r#"["Dropout", "Enrolled", "Graduate"]"#,
            r#"["Dropout", "Graduate"]"#,
        );
        let reason = startup_reason(load_json(&json));
        assert!(reason.contains("2 class labels for 3 model outputs"), "{reason}");
    }

    #[test]
    fn load_model_rejects_logistic_classes_that_disagree_with_coef() {
        let json = r#"{
            "kind": "logistic_regression",
            "coef": [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]],
            "intercept": [0.0, 0.0, 0.0],
            "classes": ["Dropout", "Graduate"]
        }"#;
        let reason = startup_reason(load_json(json));
        assert!(reason.contains("2 class labels for 3 model outputs"), "{reason}");
    }

    #[test]
    fn binary_logistic_regression_takes_two_classes() {
        let binary = |classes: Vec<String>| LogisticRegression {
            coef: vec![vec![1.0, -1.0]],
            intercept: vec![0.0],
            scaler_mean: None,
            scaler_scale: None,
            classes: Some(classes),
            feature_importances: None,
        };
        assert!(binary(vec!["Dropout".into(), "Graduate".into()]).validate().is_ok());
        assert!(binary(vec!["Dropout".into()]).validate().is_err());
        assert!(binary(vec!["Dropout".into(), "Dropout".into()]).validate().is_err());
    }
}
