use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::controller::RunSummary;
use crate::error::Result;
use crate::frame::Frame;
use crate::hardware::Recorder;
use crate::record::{ImageCategory, SpecimenRecord};

use super::image_io::save_frame;

pub const RECORDS_FILE: &str = "records.csv";
pub const SUMMARY_FILE: &str = "summary.txt";
pub const REFERENCES_DIR: &str = "references";
pub const IMAGES_DIR: &str = "images";

/// Writes a run into one directory:
///
/// ```text
/// <run>/records.csv
/// <run>/summary.txt
/// <run>/references/<channel>.png
/// <run>/images/<category>/<sequence>.png
/// ```
pub struct RunDirectoryRecorder {
    root: PathBuf,
    save_images: bool,
    metric_columns: usize,
    records: Option<BufWriter<File>>,
}

impl RunDirectoryRecorder {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(REFERENCES_DIR))?;
        Ok(Self {
            root,
            save_images: true,
            metric_columns: 0,
            records: None,
        })
    }

    /// Skip per-specimen images. References and records are still written.
    pub fn without_specimen_images(mut self) -> Self {
        self.save_images = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let writer = match self.records.take() {
            Some(writer) => writer,
            None => BufWriter::new(
                File::options()
                    .create(true)
                    .append(true)
                    .open(self.root.join(RECORDS_FILE))?,
            ),
        };
        Ok(self.records.insert(writer))
    }
}

impl Recorder for RunDirectoryRecorder {
    fn begin(&mut self, metric_fields: &[String]) -> Result<()> {
        self.metric_columns = metric_fields.len();
        let mut header = vec!["sequence".to_string(), "size".to_string()];
        header.extend(metric_fields.iter().cloned());
        header.extend(["elapsed_s", "direction", "reason"].map(String::from));
        let line = header.join(",");
        let writer = self.writer()?;
        writeln!(writer, "{line}")?;
        Ok(())
    }

    fn save_reference(&mut self, frame: &Frame, tag: &str) -> Result<()> {
        let path = self.root.join(REFERENCES_DIR).join(format!("{tag}.png"));
        save_frame(frame, &path)?;
        debug!(path = %path.display(), "Saved reference");
        Ok(())
    }

    fn save_specimen(&mut self, sequence: u64, category: ImageCategory, frame: &Frame) -> Result<()> {
        if !self.save_images {
            return Ok(());
        }
        let dir = self.root.join(IMAGES_DIR).join(category.as_str());
        fs::create_dir_all(&dir)?;
        save_frame(frame, &dir.join(format!("{sequence:06}.png")))
    }

    fn append(&mut self, record: &SpecimenRecord) -> Result<()> {
        let mut cells = vec![record.sequence.to_string(), record.size.to_string()];
        for i in 0..self.metric_columns {
            cells.push(record.metrics.get(i).map(|v| v.to_string()).unwrap_or_default());
        }
        cells.push(format!("{:.3}", record.elapsed.as_secs_f64()));
        cells.push(record.direction.to_string());
        cells.push(record.disposition.reason().to_string());
        let line = cells.join(",");
        let writer = self.writer()?;
        writeln!(writer, "{line}")?;
        Ok(())
    }

    fn write_summary(&mut self, summary: &RunSummary) -> Result<()> {
        fs::write(self.root.join(SUMMARY_FILE), summary.to_string())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.records.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}
