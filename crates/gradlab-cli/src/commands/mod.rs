//! CLI command modules

pub mod config;
pub mod optim;
pub mod rl;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use gradlab_core::{JsonLinesSink, MetricsSink, TracingSink};

/// Pretty-print `value` as JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON-lines file sink when `path` is given, otherwise debug-level tracing events.
///
/// The file sink is buffered; call [`MetricsSink::flush`] once the run is done.
pub fn open_sink(path: Option<&Path>, run: &str) -> Result<Box<dyn MetricsSink>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create metrics file {}", path.display()))?;
            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => Box::new(TracingSink::new(run)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_complete_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");

        let mut sink = open_sink(Some(&path), "adam").unwrap();
        for step in 0..3 {
            sink.record("loss", step, 1.0 / (step + 1) as f64).unwrap();
        }
        sink.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.contains("\"loss\"")));
    }

    #[test]
    fn test_open_sink_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("metrics.jsonl");
        let err = open_sink(Some(&path), "adam").err().unwrap();
        assert!(err.to_string().contains("Failed to create metrics file"));
    }
}
