use std::collections::HashSet;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Ordered column names the model was trained on. Loaded once and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(PipelineError::InvalidSchema("no columns".to_string()));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(PipelineError::InvalidSchema(format!(
                    "{column} is listed more than once"
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Reads a JSON array of column names.
    pub fn load(path: &Path) -> Result<Self> {
        let startup = |reason: String| PipelineError::Startup {
            kind: "feature schema",
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| startup(e.to_string()))?;
        let columns: Vec<String> = serde_json::from_str(&raw).map_err(|e| startup(e.to_string()))?;
        let schema = Self::new(columns).map_err(|e| startup(e.to_string()))?;
        log::debug!("loaded feature schema with {} columns", schema.len());
        Ok(schema)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

#[cfg(test)]
pub(crate) fn sample_schema() -> FeatureSchema {
    let names = [
        "Marital_status",
        "Course",
        "Previous_qualification_grade",
        "Mothers_qualification",
        "Fathers_qualification",
        "Admission_grade",
        "Debtor",
        "Tuition_fees_up_to_date",
        "GDP",
        "Parents_education_diff",
        "Financial_burden",
        "Academic_background",
    ];
    FeatureSchema::new(names.iter().map(|s| s.to_string()).collect()).expect("valid schema")
}
