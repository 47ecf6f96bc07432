use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;

use crate::error::{PipelineError, Result};
use crate::models::RawRecord;

/// A delimited table kept as text, so original cells round-trip unchanged
/// into exported results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Appends a column, or overwrites the values of an existing column
    /// with the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.headers.iter().position(|h| *h == name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    if idx < row.len() {
                        row[idx] = value;
                    } else {
                        row.resize(idx, String::new());
                        row.push(value);
                    }
                }
            }
            None => {
                self.headers.push(name);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Parses the columns selected by `wanted` into one record per row.
    /// Columns that are not wanted are skipped without being looked at.
    pub fn to_records(&self, wanted: impl Fn(&str) -> bool) -> Result<Vec<RawRecord>> {
        let selected: Vec<(usize, &str)> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, name)| wanted(name.as_str()))
            .map(|(idx, name)| (idx, name.as_str()))
            .collect();

        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| -> Result<RawRecord> {
                let mut record = RawRecord::new();
                for &(col_idx, name) in &selected {
                    let cell = row.get(col_idx).map(String::as_str).unwrap_or("");
                    let value = cell.parse::<f64>().map_err(|_| {
                        PipelineError::Inference(format!(
                            "row {} column {name}: {cell:?} is not a number",
                            row_idx + 1
                        ))
                    })?;
                    record.insert(name, value);
                }
                Ok(record)
            })
            .collect()
    }
}

pub fn read_from<R: Read>(reader: R) -> Result<BatchTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = BatchTable::new(headers);
    for result in reader.records() {
        let record = result?;
        table.rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

pub fn write_to<W: Write>(table: &BatchTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_table(path: &Path) -> anyhow::Result<BatchTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_from(file).with_context(|| format!("failed to read CSV from {}", path.display()))
}

pub fn write_table(table: &BatchTable, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_to(table, std::io::BufWriter::new(file))
        .with_context(|| format!("failed to write CSV to {}", path.display()))
}
