// CSV export sink
//
// Writes the full retained window once, at shutdown, to
// `force_data_<stamp>.csv` with one row per sample.
// Format: header `timestamp_seconds,force_value`, then one row per sample.

use super::{RunStamp, SampleSink, SinkError, SinkKind, SinkResult};
use crate::types::Sample;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 2] = ["timestamp_seconds", "force_value"];

pub struct CsvExportSink {
    name: String,
    path: PathBuf,
    staged: u64,
    flushed: bool,
    written: Option<PathBuf>,
}

impl CsvExportSink {
    pub fn new(output_dir: &Path, stamp: &RunStamp) -> Self {
        Self {
            name: "csv-export".to_string(),
            path: output_dir.join(stamp.file_name("force_data", "csv")),
            staged: 0,
            flushed: false,
            written: None,
        }
    }

    /// Target path, whether or not it has been written yet
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples seen live so far
    pub fn staged(&self) -> u64 {
        self.staged
    }

    fn write_rows(&self, samples: &[Sample]) -> SinkResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(CSV_HEADER)?;
        for sample in samples {
            writer.serialize((sample.elapsed_seconds, sample.value))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl SampleSink for CsvExportSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Durable
    }

    fn write(&mut self, _sample: &Sample) -> SinkResult<()> {
        // rows are written from the retained window at flush time
        self.staged += 1;
        Ok(())
    }

    fn flush(&mut self, samples: &[Sample]) -> SinkResult<()> {
        if self.flushed {
            return Err(SinkError::AlreadyFlushed(self.name.clone()));
        }
        self.flushed = true;

        if samples.is_empty() {
            log::info!("No data recorded. Skipping CSV export.");
            return Ok(());
        }

        self.write_rows(samples)?;
        log::info!("CSV saved: {} ({} rows)", self.path.display(), samples.len());
        self.written = Some(self.path.clone());
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        self.written.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_csv_export_rows() {
        let temp_dir = TempDir::new().unwrap();
        let stamp = RunStamp::from_string("2026-10-17_10-00-00");
        let mut sink = CsvExportSink::new(&temp_dir.path().join("runs"), &stamp);

        let samples = vec![
            Sample::new(0.0, 1.5),
            Sample::new(0.1, 2.25),
            Sample::new(0.2, -0.5),
        ];
        for sample in &samples {
            sink.write(sample).unwrap();
        }
        assert_eq!(sink.staged(), 3);
        assert!(sink.artifacts().is_empty());

        sink.flush(&samples).unwrap();
        let path = temp_dir
            .path()
            .join("runs")
            .join("force_data_2026-10-17_10-00-00.csv");
        assert_eq!(sink.artifacts(), vec![path.clone()]);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());

        let rows: Vec<(f64, f64)> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![(0.0, 1.5), (0.1, 2.25), (0.2, -0.5)]);
    }

    #[test]
    fn test_empty_window_skips_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = CsvExportSink::new(temp_dir.path(), &RunStamp::from_string("empty"));

        sink.flush(&[]).unwrap();
        assert!(!sink.path().exists());
        assert!(sink.artifacts().is_empty());
    }

    #[test]
    fn test_second_flush_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = CsvExportSink::new(temp_dir.path(), &RunStamp::from_string("twice"));
        let samples = vec![Sample::new(0.0, 1.0)];

        sink.flush(&samples).unwrap();
        let err = sink.flush(&samples).unwrap_err();
        assert!(matches!(err, SinkError::AlreadyFlushed(_)));

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
