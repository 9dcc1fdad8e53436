pub mod buffer;
pub mod config;
pub mod controller;
pub mod parser;
pub mod setup;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod types;

pub use buffer::{BufferMetrics, RetentionPolicy, SampleBuffer, SampleWindow};
pub use config::ExperimentConfig;
pub use controller::{ControllerConfig, ExperimentController, RunSummary, StopHandle, TickOutcome};
pub use parser::SampleParser;
pub use setup::{build_experiment, build_experiment_with_source, Experiment};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownStep};
pub use sink::{SampleSink, SinkError, SinkKind, SinkRouter};
pub use source::{create_source, LineSource, SourceConfig};
pub use types::*;
