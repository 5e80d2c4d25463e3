//! Metric sinks
//!
//! Training loops emit scalar time series (loss, return, ...) through a
//! [`MetricsSink`]. Sinks only receive values; plotting and dashboards live
//! elsewhere.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One emitted scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub step: u64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            name: name.into(),
            step,
            value,
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of scalar metrics
pub trait MetricsSink {
    fn record(&mut self, name: &str, step: u64, value: f64) -> Result<()>;

    /// Push buffered records to their destination. Call once a run is done;
    /// dropping a buffered sink silently discards write errors.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&mut self, _name: &str, _step: u64, _value: f64) -> Result<()> {
        Ok(())
    }
}

/// Keeps every record in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<MetricRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Values recorded under `name`, in emission order
    pub fn series(&self, name: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, name: &str, step: u64, value: f64) -> Result<()> {
        self.records.push(MetricRecord::new(name, step, value));
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricsSink for JsonLinesSink<W> {
    fn record(&mut self, name: &str, step: u64, value: f64) -> Result<()> {
        let record = MetricRecord::new(name, step, value);
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Emits each value as a `tracing` event at debug level
#[derive(Debug, Default, Clone)]
pub struct TracingSink {
    prefix: String,
}

impl TracingSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl MetricsSink for TracingSink {
    fn record(&mut self, name: &str, step: u64, value: f64) -> Result<()> {
        tracing::debug!(run = %self.prefix, metric = name, step, value, "metric");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_memory_sink_series() {
        let mut sink = MemorySink::new();
        sink.record("loss", 0, 1.0).unwrap();
        sink.record("accuracy", 0, 0.5).unwrap();
        sink.record("loss", 1, 0.8).unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.series("loss"), vec![1.0, 0.8]);
        assert_eq!(sink.series("accuracy"), vec![0.5]);
        assert!(sink.series("missing").is_empty());
    }

    #[test]
    fn test_json_lines_sink_format() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record("loss", 3, 0.25).unwrap();
        sink.record("loss", 4, 0.125).unwrap();

        let bytes = sink.into_inner();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: MetricRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.name, "loss");
        assert_eq!(parsed.step, 3);
        assert_eq!(parsed.value, 0.25);
    }

    /// Buffers until flushed, and can be told to fail the flush
    struct FlakyWriter {
        pending: Vec<u8>,
        written: Rc<RefCell<Vec<u8>>>,
        fail_flush: bool,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if self.fail_flush {
                return Err(std::io::Error::other("disk full"));
            }
            self.written.borrow_mut().append(&mut self.pending);
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_sink_flush_reaches_writer() {
        let written: Rc<RefCell<Vec<u8>>> = Rc::default();
        let mut sink = JsonLinesSink::new(FlakyWriter {
            pending: Vec::new(),
            written: Rc::clone(&written),
            fail_flush: false,
        });
        sink.record("return", 0, 1.5).unwrap();
        assert!(written.borrow().is_empty());

        sink.flush().unwrap();
        let text = String::from_utf8(written.borrow().clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"return\""));
    }

    #[test]
    fn test_json_lines_sink_flush_error_surfaces() {
        let mut sink = JsonLinesSink::new(FlakyWriter {
            pending: Vec::new(),
            written: Rc::default(),
            fail_flush: true,
        });
        sink.record("loss", 0, 0.5).unwrap();

        let err = sink.flush().unwrap_err();
        assert!(matches!(err, crate::GradlabError::Io(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_unbuffered_sinks_flush_trivially() {
        assert!(NullSink.flush().is_ok());
        assert!(MemorySink::new().flush().is_ok());
        assert!(TracingSink::new("run").flush().is_ok());
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut sink = NullSink;
        assert!(sink.record("anything", 0, f64::NAN).is_ok());
    }
}
