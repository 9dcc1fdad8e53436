use std::io::Write;

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.map_err(|e| format!("JSON serialization failed: {}", e))
}

/// Write a JSON document, newline-terminated, to stdout.
pub fn print_json(json: &str) -> Result<(), String> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(json.as_bytes())
        .and_then(|_| handle.write_all(b"\n"))
        .and_then(|_| handle.flush())
        .map_err(|e| format!("Failed to write to stdout: {}", e))
}

/// Progress line for stderr, e.g. `[  3.2s] 32 samples, latest 4.750`.
pub fn progress_line(elapsed_seconds: f64, total_samples: u64, latest: Option<f64>) -> String {
    match latest {
        Some(value) => format!(
            "[{:>6.1}s] {} samples, latest {:.3}",
            elapsed_seconds, total_samples, value
        ),
        None => format!("[{:>6.1}s] waiting for data", elapsed_seconds),
    }
}
