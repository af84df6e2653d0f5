//! Log sinks for battle trajectories, progress and summaries

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::training::summary::{EpochProgress, EpochRecord, TrainingSummary};

/// Trait for training log consumers
pub trait LogSink {
    /// Persist a batch of completed epochs, oldest first
    fn write_batch(&mut self, records: &[EpochRecord]) -> Result<()>;

    /// Persist the end-of-batch report
    fn write_summary(&mut self, summary: &TrainingSummary) -> Result<()>;

    /// Called after every epoch, before batching
    fn epoch_completed(&mut self, _progress: &EpochProgress) -> Result<()> {
        Ok(())
    }
}

/// Collects everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    pub batches: Vec<Vec<EpochRecord>>,
    pub summaries: Vec<TrainingSummary>,
    pub progress: Vec<EpochProgress>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every flushed record, in order
    pub fn records(&self) -> impl Iterator<Item = &EpochRecord> {
        self.batches.iter().flatten()
    }
}

impl LogSink for MemoryLogSink {
    fn write_batch(&mut self, records: &[EpochRecord]) -> Result<()> {
        self.batches.push(records.to_vec());
        Ok(())
    }

    fn write_summary(&mut self, summary: &TrainingSummary) -> Result<()> {
        self.summaries.push(summary.clone());
        Ok(())
    }

    fn epoch_completed(&mut self, progress: &EpochProgress) -> Result<()> {
        self.progress.push(progress.clone());
        Ok(())
    }
}

/// Writes text logs into a directory and optionally streams progress
///
/// Batches go to `battle_log_<start>_<end>.txt`, the report to
/// `summary.txt` and `summary.json`. Streamed progress is one
/// `data: {json}` line per epoch.
pub struct FileLogSink {
    dir: PathBuf,
    write_battle_logs: bool,
    write_summary: bool,
    stream: Option<Box<dyn Write>>,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_battle_logs: true,
            write_summary: true,
            stream: None,
        }
    }

    pub fn with_battle_logs(mut self, enabled: bool) -> Self {
        self.write_battle_logs = enabled;
        self
    }

    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.write_summary = enabled;
        self
    }

    pub fn with_stream(mut self, writer: impl Write + 'static) -> Self {
        self.stream = Some(Box::new(writer));
        self
    }

    pub fn with_stdout_stream(self) -> Self {
        self.with_stream(io::stdout())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn batch_path(&self, start: u64, end: u64) -> PathBuf {
        self.dir.join(format!("battle_log_{start:04}_{end:04}.txt"))
    }
}

/// Text rendering of one batch
pub fn format_batch(records: &[EpochRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!("Epoch {}\n", record.epoch));
        out.push_str(&format!("Wins - {} | {}\n\n", record.wins[0], record.wins[1]));
        for event in record.log.iter() {
            out.push_str(&event.to_string());
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

impl LogSink for FileLogSink {
    fn write_batch(&mut self, records: &[EpochRecord]) -> Result<()> {
        if !self.write_battle_logs || records.is_empty() {
            return Ok(());
        }
        let start = records.first().map_or(0, |r| r.epoch);
        let end = records.last().map_or(0, |r| r.epoch);

        fs::create_dir_all(&self.dir)?;
        let path = self.batch_path(start, end);
        fs::write(&path, format_batch(records))?;
        tracing::debug!("Wrote {} epochs to {}", records.len(), path.display());
        Ok(())
    }

    fn write_summary(&mut self, summary: &TrainingSummary) -> Result<()> {
        if !self.write_summary {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join("summary.txt"), summary.to_string())?;
        fs::write(
            self.dir.join("summary.json"),
            serde_json::to_string_pretty(summary)?,
        )?;
        Ok(())
    }

    fn epoch_completed(&mut self, progress: &EpochProgress) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            writeln!(stream, "data: {}\n", serde_json::to_string(progress)?)?;
            stream.flush()?;
        }
        Ok(())
    }
}
