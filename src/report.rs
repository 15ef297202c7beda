//! Sweep report accumulation and TSV output.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// One sweep point's headline metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub window_length: usize,
    pub compress_frames: usize,
    /// Recall per (classifier, target class), in ensemble order.
    pub recalls: Vec<f32>,
}

/// Explicit accumulator for sweep results.
///
/// The driver threads one sink through all of its iterations instead of
/// writing from ambient state, and flushes it to an append-only TSV file
/// keyed by window length and subsampling rate.
#[derive(Debug, Default)]
pub struct ReportSink {
    rows: Vec<ReportRow>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Appends all accumulated rows to the file at `path` and clears the
    /// sink. The file is created if missing, never truncated.
    pub fn flush_tsv(&mut self, path: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open report file `{}`", path.display()))?;
        let mut writer = BufWriter::new(file);
        for row in &self.rows {
            write!(writer, "{}\t{}", row.window_length, row.compress_frames)?;
            for recall in &row.recalls {
                write!(writer, "\t{recall}")?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        log::info!("appended {} report rows to `{}`", self.rows.len(), path.display());
        self.rows.clear();
        Ok(())
    }
}
