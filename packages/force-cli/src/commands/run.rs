use crate::cli::RunArgs;
use crate::exit_codes;
use crate::experiment_params;
use crate::output;
use force_stream::sink::LiveView;
use force_stream::{build_experiment, SourceConfig, StopHandle};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn execute(args: RunArgs) -> i32 {
    let config = match experiment_params::resolve_config(&args.experiment) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    log::debug!("Resolved configuration: {:?}", config);

    let experiment = match build_experiment(&config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    for warning in &experiment.degraded {
        eprintln!("Warning: {}", warning);
    }

    if !args.quiet {
        eprintln!("Recording from {}...", describe_source(&config.source));
        match config.run_time_seconds {
            Some(seconds) => eprintln!("  Run time: {}s (Ctrl+C to stop early)", seconds),
            None => eprintln!("  Run time: until Ctrl+C"),
        }
        eprintln!("  Cadence: {}ms", config.sampling_interval_ms);
        eprintln!("  Output: {}", config.output_dir.display());
        eprintln!("  Run stamp: {}", experiment.stamp);
    }

    let stop_handle = experiment.controller.stop_handle();

    // Ctrl+C is the terminal's "close the window"
    let ctrl_c = {
        let stop_handle = stop_handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop_handle.request_stop();
            }
        })
    };

    let progress = (!args.quiet)
        .then(|| spawn_progress(experiment.live_view.clone(), stop_handle.clone()));

    let result = experiment.controller.run().await;

    ctrl_c.abort();
    if let Some(progress) = progress {
        progress.abort();
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(e) if e.is_source_failure() => {
            eprintln!("Error: could not open {}: {}", describe_source(&config.source), e);
            return exit_codes::SOURCE_ERROR;
        }
        Err(e) => {
            eprintln!("Experiment failed: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let json = match output::to_json(&summary, args.compact) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing summary: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };
    if let Err(e) = output::print_json(&json) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    if !args.quiet {
        eprintln!(
            "Stopped ({}) after {:.1}s with {} samples",
            summary.reason, summary.elapsed_seconds, summary.stats.samples_accepted
        );
        for path in &summary.artifacts {
            eprintln!("  Saved {}", path.display());
        }
    }

    exit_codes::SUCCESS
}

fn describe_source(source: &SourceConfig) -> String {
    match source {
        SourceConfig::SerialPort {
            port, baud_rate, ..
        } => format!("serial port {} @ {} baud", port, baud_rate),
        SourceConfig::TcpSocket { address } => format!("tcp://{}", address),
    }
}

fn spawn_progress(live_view: LiveView, stop_handle: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        // the first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if stop_handle.state().is_stopped() {
                break;
            }
            let frame = live_view.frame();
            eprintln!(
                "{}",
                output::progress_line(
                    started.elapsed().as_secs_f64(),
                    frame.total_samples,
                    frame.latest.map(|s| s.value),
                )
            );
        }
    })
}
