// Experiment wiring
//
// Builds the sink list once, from configuration, before the run starts.
// A sink that cannot be set up is reported as degraded and never registered,
// so the router never has to ask whether a sink is usable.

use crate::config::ExperimentConfig;
use crate::controller::{ControllerConfig, ExperimentController};
use crate::sink::{
    CsvExportSink, LiveDisplaySink, LiveView, RunStamp, SinkRouter, SnapshotSink, SqliteSink,
};
use crate::source::{create_source, LineSource};
use crate::types::StreamResult;

/// A ready-to-run experiment plus the handles a front end needs
pub struct Experiment {
    pub controller: ExperimentController,
    pub live_view: LiveView,
    pub stamp: RunStamp,
    /// Warnings for sinks that were requested but could not be set up
    pub degraded: Vec<String>,
}

/// Build an experiment reading from the source named in `config`.
pub fn build_experiment(config: &ExperimentConfig) -> StreamResult<Experiment> {
    build_experiment_with_source(config, create_source(&config.source))
}

/// Build an experiment around an already constructed source.
pub fn build_experiment_with_source(
    config: &ExperimentConfig,
    source: Box<dyn LineSource>,
) -> StreamResult<Experiment> {
    config.validate()?;

    let stamp = RunStamp::now();
    let live_view = LiveView::new(config.display.clone(), config.window_size);
    let mut router = SinkRouter::new();
    let mut degraded = Vec::new();

    router.register(Box::new(LiveDisplaySink::new(live_view.clone())));

    if config.export_csv {
        router.register(Box::new(CsvExportSink::new(&config.output_dir, &stamp)));
    }

    if config.export_snapshot {
        router.register(Box::new(SnapshotSink::new(&config.output_dir, &stamp)));
    }

    if let Some(database_path) = &config.database_path {
        match SqliteSink::open(database_path) {
            Ok(sink) => router.register(Box::new(sink)),
            Err(e) => {
                log::warn!(
                    "Database store not connected, samples not persisted there: {:#}",
                    e
                );
                degraded.push(format!(
                    "store not connected ({}): samples not persisted there",
                    database_path.display()
                ));
            }
        }
    }

    let controller = ExperimentController::new(ControllerConfig::from(config), source, router);
    log::info!(
        "Experiment {} prepared with sinks: {}",
        controller.id,
        controller.router().names().join(", ")
    );

    Ok(Experiment {
        controller,
        live_view,
        stamp,
        degraded,
    })
}
