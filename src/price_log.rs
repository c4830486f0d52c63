use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::models::PriceReading;
use crate::utils::error::Result;

/// Append-only CSV of readings: `timestamp,product_id,product_name,price`.
///
/// A missing price is an empty cell. The header is written only when the file
/// is new or empty. A single writer appends at a time.
pub struct PriceLog {
    path: PathBuf,
}

impl PriceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, reading: &PriceReading) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(reading)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<PriceReading>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut readings = Vec::new();
        for row in reader.deserialize() {
            readings.push(row?);
        }
        Ok(readings)
    }
}
