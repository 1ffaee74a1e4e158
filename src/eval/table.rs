use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One classified sample. The CSV header is the field names in declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub filename: String,
    pub ground_truth_label: String,
    pub predicted_label: String,
    pub confidence: f32,
}

impl ResultRow {
    pub fn new(
        filename: impl Into<String>,
        ground_truth_label: impl Into<String>,
        predicted_label: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            filename: filename.into(),
            ground_truth_label: ground_truth_label.into(),
            predicted_label: predicted_label.into(),
            confidence,
        }
    }
}

/// Streams rows to a CSV file, truncating any previous contents.
pub struct ResultWriter {
    writer: csv::Writer<std::fs::File>,
    rows: u64,
}

impl ResultWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create result table {}", path.display()))?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn append(&mut self, row: &ResultRow) -> Result<()> {
        self.writer.serialize(row).context("write result row")?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush buffered rows. Dropping without calling this may lose the tail.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush().context("flush result table")?;
        Ok(self.rows)
    }
}

/// Read a whole result table.
pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open result table {}", path.display()))?;
    reader
        .deserialize::<ResultRow>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("invalid row {} in {}", i + 1, path.display()))
        })
        .collect()
}
