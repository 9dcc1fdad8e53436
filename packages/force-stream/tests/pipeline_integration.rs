// End-to-end acquisition runs against an in-memory device.
//
// The device side of a duplex stream plays the sensor: it writes one line per
// period on the same (paused) clock the controller ticks on, so runs are
// deterministic.

use force_stream::sink::{CsvExportSink, RunStamp, SampleSink, SinkKind, SinkResult};
use force_stream::source::StreamLineSource;
use force_stream::{
    build_experiment_with_source, ControllerConfig, ExperimentConfig, ExperimentController,
    LineSource, RunState, Sample, SinkError, SinkRouter, StopReason, StreamError, StreamResult,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Write each line, then wait `period`. Returns the device end so the stream
/// stays open until the test is done with it.
fn spawn_device(
    mut device: DuplexStream,
    lines: Vec<&'static str>,
    period: Duration,
) -> JoinHandle<DuplexStream> {
    tokio::spawn(async move {
        for line in lines {
            device.write_all(line.as_bytes()).await.unwrap();
            device.write_all(b"\n").await.unwrap();
            tokio::time::sleep(period).await;
        }
        device
    })
}

fn test_config(output_dir: &Path) -> ExperimentConfig {
    ExperimentConfig {
        run_time_seconds: Some(1.0),
        sampling_interval_ms: 100,
        output_dir: output_dir.to_path_buf(),
        export_snapshot: false,
        ..ExperimentConfig::default()
    }
}

fn csv_artifact(artifacts: &[PathBuf]) -> PathBuf {
    artifacts
        .iter()
        .find(|p| p.extension().map(|e| e == "csv").unwrap_or(false))
        .cloned()
        .expect("run should have written a CSV export")
}

fn read_rows(path: &Path) -> Vec<(f64, f64)> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["timestamp_seconds", "force_value"]
    );
    reader.deserialize().map(|r| r.unwrap()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_deadline_run_exports_every_reading() {
    let temp_dir = TempDir::new().unwrap();
    let config = ExperimentConfig {
        database_path: Some(temp_dir.path().join("force.db")),
        export_snapshot: true,
        ..test_config(temp_dir.path())
    };

    let (device, host) = tokio::io::duplex(1024);
    let lines = vec![
        "1.0", "2.0", "3.0", "4.0", "5.0", "6.0", "7.0", "8.0", "9.0", "10.0",
    ];
    let device = spawn_device(device, lines, Duration::from_millis(100));

    // offset the cadence from the device so no read races a write
    tokio::time::sleep(Duration::from_millis(50)).await;

    let experiment =
        build_experiment_with_source(&config, Box::new(StreamLineSource::new("device", host)))
            .unwrap();
    assert!(experiment.degraded.is_empty());
    let live_view = experiment.live_view.clone();

    let summary = experiment.controller.run().await.unwrap();
    let _device = device.await.unwrap();

    assert_eq!(summary.reason, StopReason::Deadline);
    assert_eq!(summary.stats.samples_accepted, 10);
    assert_eq!(summary.samples_retained, 10);
    assert!(summary.shutdown.as_ref().map(|r| r.is_clean()).unwrap_or(false));
    assert_eq!(summary.shutdown.as_ref().map(|r| r.samples_flushed), Some(10));

    let rows = read_rows(&csv_artifact(&summary.artifacts));
    assert_eq!(rows.len(), 10);
    let values: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();
    assert_eq!(
        values,
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]
    );
    assert!(rows.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!(rows.iter().all(|(t, _)| *t >= 0.0 && *t < 1.0));

    assert!(summary
        .artifacts
        .iter()
        .any(|p| p.extension().map(|e| e == "svg").unwrap_or(false)));

    let conn = rusqlite::Connection::open(temp_dir.path().join("force.db")).unwrap();
    let stored: i64 = conn
        .query_row("SELECT COUNT(*) FROM force_readings", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, 10);

    let frame = live_view.frame();
    assert!(frame.closed);
    assert_eq!(frame.total_samples, 10);
    assert_eq!(frame.latest.map(|s| s.value), Some(10.0));
}

#[tokio::test(start_paused = true)]
async fn test_bad_lines_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let config = ExperimentConfig {
        run_time_seconds: Some(0.5),
        ..test_config(temp_dir.path())
    };

    let (device, host) = tokio::io::duplex(1024);
    let device = spawn_device(device, vec!["abc", "3.5", ""], Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let experiment =
        build_experiment_with_source(&config, Box::new(StreamLineSource::new("device", host)))
            .unwrap();
    let summary = experiment.controller.run().await.unwrap();
    let _device = device.await.unwrap();

    assert_eq!(summary.reason, StopReason::Deadline);
    assert_eq!(summary.stats.lines_read, 3);
    assert_eq!(summary.stats.samples_accepted, 1);
    assert_eq!(summary.stats.malformed_lines, 1);
    assert_eq!(summary.stats.empty_lines, 1);

    let rows = read_rows(&csv_artifact(&summary.artifacts));
    assert_eq!(rows.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![3.5]);
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_before_deadline() {
    let temp_dir = TempDir::new().unwrap();
    let config = ExperimentConfig {
        run_time_seconds: Some(10.0),
        ..test_config(temp_dir.path())
    };

    let (device, host) = tokio::io::duplex(1024);
    let device = spawn_device(
        device,
        vec!["0.5", "1.5", "2.5", "3.5", "4.5"],
        Duration::from_millis(100),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let experiment =
        build_experiment_with_source(&config, Box::new(StreamLineSource::new("device", host)))
            .unwrap();
    let handle = experiment.controller.stop_handle();
    let run = tokio::spawn(experiment.controller.run());

    // all five readings are in by 450ms; stop well before the deadline
    tokio::time::sleep(Duration::from_millis(700)).await;
    handle.request_stop();

    let summary = run.await.unwrap().unwrap();
    let _device = device.await.unwrap();

    assert_eq!(summary.reason, StopReason::Manual);
    assert!(summary.elapsed_seconds < 1.0);
    assert_eq!(summary.samples_retained, 5);

    let csv_path = csv_artifact(&summary.artifacts);
    let exported = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(exported.lines().count(), 6);

    // a second trigger is a no-op
    handle.request_stop();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        handle.state(),
        RunState::Stopped {
            reason: StopReason::Manual
        }
    );
    assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), exported);
    assert_eq!(
        std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.path().extension().map(|x| x == "csv").unwrap_or(false))
                    .unwrap_or(false)
            })
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_count_bounded_window_exports_latest_readings() {
    let temp_dir = TempDir::new().unwrap();
    let config = ExperimentConfig {
        window_size: Some(3),
        ..test_config(temp_dir.path())
    };

    let (device, host) = tokio::io::duplex(1024);
    let device = spawn_device(
        device,
        vec!["1", "2", "3", "4", "5", "6"],
        Duration::from_millis(100),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let experiment =
        build_experiment_with_source(&config, Box::new(StreamLineSource::new("device", host)))
            .unwrap();
    let summary = experiment.controller.run().await.unwrap();
    let _device = device.await.unwrap();

    assert_eq!(summary.stats.samples_accepted, 6);
    assert_eq!(summary.samples_retained, 3);
    assert_eq!(summary.buffer.total_evicted, 3);

    let rows = read_rows(&csv_artifact(&summary.artifacts));
    assert_eq!(
        rows.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        vec![4.0, 5.0, 6.0]
    );
}

struct DeadSource;

#[async_trait::async_trait]
impl LineSource for DeadSource {
    async fn open(&mut self) -> StreamResult<()> {
        Err(StreamError::Serial("port busy".to_string()))
    }

    async fn next_line(&mut self, _timeout: Duration) -> StreamResult<Option<String>> {
        Ok(None)
    }

    async fn close(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "dead".to_string()
    }
}

#[tokio::test]
async fn test_unopenable_source_aborts_before_any_export() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let experiment = build_experiment_with_source(&config, Box::new(DeadSource)).unwrap();
    let err = experiment.controller.run().await.unwrap_err();

    assert!(err.is_source_failure());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

struct BrokenStore;

impl SampleSink for BrokenStore {
    fn name(&self) -> &str {
        "broken-store"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Relational
    }

    fn write(&mut self, _sample: &Sample) -> SinkResult<()> {
        Err(SinkError::Other("connection reset".to_string()))
    }

    fn flush(&mut self, _samples: &[Sample]) -> SinkResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        Err(SinkError::Closed("broken-store".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_sink_does_not_stop_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let stamp = RunStamp::from_string("isolation");

    let mut router = SinkRouter::new();
    router.register(Box::new(BrokenStore));
    router.register(Box::new(CsvExportSink::new(temp_dir.path(), &stamp)));

    let (device, host) = tokio::io::duplex(1024);
    let device = spawn_device(device, vec!["7", "8", "9"], Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let config = ControllerConfig {
        deadline: Some(Duration::from_millis(500)),
        ..ControllerConfig::default()
    };
    let controller =
        ExperimentController::new(config, Box::new(StreamLineSource::new("device", host)), router);
    let summary = controller.run().await.unwrap();
    let _device = device.await.unwrap();

    assert_eq!(summary.stats.samples_accepted, 3);
    assert_eq!(summary.stats.sink_write_failures, 3);
    assert_eq!(
        summary.sink_failures,
        vec![("broken-store".to_string(), 3), ("csv-export".to_string(), 0)]
    );

    let report = summary.shutdown.unwrap();
    assert!(!report.is_clean());
    assert!(report.steps[0].is_ok());

    let rows = read_rows(&temp_dir.path().join("force_data_isolation.csv"));
    assert_eq!(
        rows.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        vec![7.0, 8.0, 9.0]
    );
}
