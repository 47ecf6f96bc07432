use crate::align;
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::features;
use crate::inference::{self, Inference};
use crate::model::{self, Classifier};
use crate::models::{BatchSummary, FeatureImportance, Prediction, RawRecord};
use crate::risk;
use crate::schema::FeatureSchema;
use crate::table::BatchTable;

/// Schema and model, loaded once and shared read-only by every run.
pub struct Predictor {
    schema: FeatureSchema,
    model: Box<dyn Classifier>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub run_id: uuid::Uuid,
    pub predictions: Vec<Prediction>,
    pub summary: BatchSummary,
    pub results: BatchTable,
}

impl Predictor {
    pub fn new(schema: FeatureSchema, model: Box<dyn Classifier>) -> Result<Self> {
        if let Some(n) = model.n_features() {
            if n != schema.len() {
                return Err(PipelineError::InvalidSchema(format!(
                    "schema has {} columns but the model was fitted on {n}",
                    schema.len()
                )));
            }
        }
        Ok(Self { schema, model })
    }

    pub fn load(settings: &Settings) -> Result<Self> {
        let schema = FeatureSchema::load(&settings.features_path)?;
        let model = model::load_model(&settings.model_path)?;
        Self::new(schema, model)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    fn run(&self, mut records: Vec<RawRecord>) -> Result<Inference> {
        for record in &mut records {
            features::engineer(record);
        }
        let aligned = align::align_records(&records, &self.schema);
        inference::infer(&*self.model, &aligned)
    }

    pub fn predict_record(&self, record: RawRecord) -> Result<Prediction> {
        let inference = self.run(vec![record])?;
        risk::format_predictions(&inference)
            .pop()
            .ok_or_else(|| PipelineError::Inference("model returned no prediction".to_string()))
    }

    /// Schema columns the table can neither supply nor derive, in schema order.
    pub fn missing_columns(&self, table: &BatchTable) -> Vec<String> {
        self.schema
            .columns()
            .iter()
            .filter(|column| !table.has_column(column.as_str()))
            .filter(|column| {
                !features::derived_fields()
                    .iter()
                    .any(|d| {
                        d.name == column.as_str() && d.derivable_from(|input| table.has_column(input))
                    })
            })
            .cloned()
            .collect()
    }

    pub fn predict_batch(&self, table: &BatchTable) -> Result<BatchOutcome> {
        let missing = self.missing_columns(table);
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }

        let derived_inputs: Vec<&str> = features::derived_fields()
            .iter()
            .flat_map(|d| d.inputs.iter().copied())
            .collect();
        let records = table.to_records(|name| {
            self.schema.contains(name) || derived_inputs.iter().any(|input| *input == name)
        })?;

        let run_id = uuid::Uuid::new_v4();
        log::info!("batch {run_id}: predicting {} rows", records.len());

        let inference = self.run(records)?;
        let predictions = risk::format_predictions(&inference);
        let summary = risk::summarize(&predictions, &inference.classes);
        let results = risk::results_table(table, &predictions, &inference.classes);

        log::info!("batch {run_id}: done, {} unknown labels", summary.unknown);
        Ok(BatchOutcome {
            run_id,
            predictions,
            summary,
            results,
        })
    }

    /// Importances ranked highest first, or `None` when the model has none.
    pub fn feature_importance(&self) -> Result<Option<Vec<FeatureImportance>>> {
        let Some(scores) = self.model.feature_importances() else {
            return Ok(None);
        };
        if scores.len() != self.schema.len() {
            return Err(PipelineError::Inference(format!(
                "model reports {} importances for {} features",
                scores.len(),
                self.schema.len()
            )));
        }

        let mut ranked: Vec<FeatureImportance> = self
            .schema
            .columns()
            .iter()
            .zip(scores)
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.clone(),
                importance: *importance,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Some(ranked))
    }

    /// Blank batch input: every schema column with a zero placeholder.
    pub fn template(&self) -> BatchTable {
        let mut table = BatchTable::new(self.schema.columns().to_vec());
        table.rows.push(vec!["0".to_string(); self.schema.len()]);
        table
    }
}

pub fn importance_table(ranked: &[FeatureImportance]) -> BatchTable {
    let mut table = BatchTable::new(vec!["Feature".to_string(), "Importance".to_string()]);
    table.rows = ranked
        .iter()
        .map(|f| vec![f.feature.clone(), format!("{:.6}", f.importance)])
        .collect();
    table
}
