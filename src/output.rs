use crate::model::OutputRow;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// CSV header, in `OutputRow` field order.
pub const COLUMNS: [&str; 11] = [
    "event_date",
    "event_time",
    "event_name",
    "event_location",
    "selected_seat",
    "per_ticket_price",
    "listing_title",
    "listing_price",
    "listing_passes",
    "listing_rating_score",
    "listing_rating_label",
];

/// Destination for harvested rows. Each call receives every row so far.
pub trait RowSink {
    fn save(&mut self, rows: &[OutputRow]) -> Result<()>;
}

/// Rewrites one CSV file with the full row set on every save.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSink for CsvSink {
    fn save(&mut self, rows: &[OutputRow]) -> Result<()> {
        if rows.is_empty() {
            warn!("no rows to save, leaving {} untouched", self.path.display());
            return Ok(());
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        debug!("saved {} rows to {}", rows.len(), self.path.display());
        Ok(())
    }
}
