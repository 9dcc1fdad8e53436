use crate::cli::ExperimentArgs;
use force_stream::source::{DEFAULT_BAUD_RATE, DEFAULT_SETTLE_MS};
use force_stream::{ExperimentConfig, SourceConfig};

/// Layer defaults, the optional config file and command-line overrides,
/// then validate the result.
pub fn resolve_config(args: &ExperimentArgs) -> Result<ExperimentConfig, String> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_file(path).map_err(|e| format!("{:#}", e))?,
        None => ExperimentConfig::default(),
    };

    apply_source_overrides(&mut config, args);

    if let Some(seconds) = args.run_time {
        config.run_time_seconds = Some(seconds);
    }
    if let Some(interval) = args.interval {
        config.sampling_interval_ms = interval;
    }
    if let Some(window) = args.window {
        config.window_size = Some(window);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(database) = &args.database {
        config.database_path = Some(database.clone());
    }
    if args.no_snapshot {
        config.export_snapshot = false;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn apply_source_overrides(config: &mut ExperimentConfig, args: &ExperimentArgs) {
    if let Some(address) = &args.tcp {
        config.source = SourceConfig::TcpSocket {
            address: address.clone(),
        };
        return;
    }

    if args.port.is_none() && args.baud.is_none() {
        return;
    }

    // a serial flag switches a TCP config back to serial
    let (mut port, mut baud_rate, settle_ms) = match &config.source {
        SourceConfig::SerialPort {
            port,
            baud_rate,
            settle_ms,
        } => (port.clone(), *baud_rate, *settle_ms),
        SourceConfig::TcpSocket { .. } => (
            force_stream::source::default_port(),
            DEFAULT_BAUD_RATE,
            DEFAULT_SETTLE_MS,
        ),
    };

    if let Some(p) = &args.port {
        port = p.clone();
    }
    if let Some(b) = args.baud {
        baud_rate = b;
    }

    config.source = SourceConfig::SerialPort {
        port,
        baud_rate,
        settle_ms,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_without_flags() {
        let config = resolve_config(&ExperimentArgs::default()).unwrap();
        assert_eq!(config, ExperimentConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "run_time_seconds": 60, "sampling_interval_ms": 200, "window_size": 50 }}"#
        )
        .unwrap();

        let args = ExperimentArgs {
            config: Some(file.path().to_path_buf()),
            port: Some("/dev/ttyACM1".to_string()),
            baud: Some(9600),
            run_time: Some(20.0),
            output_dir: Some(PathBuf::from("/tmp/forcelog-out")),
            no_snapshot: true,
            ..ExperimentArgs::default()
        };
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.run_time_seconds, Some(20.0));
        assert_eq!(config.sampling_interval_ms, 200);
        assert_eq!(config.window_size, Some(50));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/forcelog-out"));
        assert!(!config.export_snapshot);
        assert_eq!(
            config.source,
            SourceConfig::SerialPort {
                port: "/dev/ttyACM1".to_string(),
                baud_rate: 9600,
                settle_ms: DEFAULT_SETTLE_MS,
            }
        );
    }

    #[test]
    fn test_tcp_flag_selects_tcp_source() {
        let args = ExperimentArgs {
            tcp: Some("127.0.0.1:7000".to_string()),
            ..ExperimentArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::TcpSocket {
                address: "127.0.0.1:7000".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let args = ExperimentArgs {
            interval: Some(0),
            ..ExperimentArgs::default()
        };
        let err = resolve_config(&args).unwrap_err();
        assert!(err.contains("sampling_interval_ms"));

        let args = ExperimentArgs {
            config: Some(PathBuf::from("/nonexistent/forcelog.json")),
            ..ExperimentArgs::default()
        };
        let err = resolve_config(&args).unwrap_err();
        assert!(err.contains("Failed to read config file"));
    }
}
