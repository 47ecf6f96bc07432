use crate::models::RawRecord;
use crate::schema::FeatureSchema;

/// Model-ready matrix: exactly the schema's columns, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl AlignedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Turns every row back into a record keyed by column name.
    #[cfg(test)]
    pub fn to_records(&self) -> Vec<RawRecord> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.as_str(), *value))
                    .collect()
            })
            .collect()
    }
}

/// Reindexes one record to the schema. Absent columns are zero, extra
/// fields are ignored.
pub fn align_record(record: &RawRecord, schema: &FeatureSchema) -> Vec<f64> {
    schema
        .columns()
        .iter()
        .map(|column| record.get(column).unwrap_or(0.0))
        .collect()
}

pub fn align_records(records: &[RawRecord], schema: &FeatureSchema) -> AlignedTable {
    AlignedTable {
        columns: schema.columns().to_vec(),
        rows: records.iter().map(|r| align_record(r, schema)).collect(),
    }
}
