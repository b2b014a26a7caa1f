//! Metric sinks
//!
//! The trainer logs metrics through an injected collaborator rather than a
//! process-wide singleton, which keeps the loop testable and rank-agnostic.

/// Receives `{metric_name: value}` pairs at each step
pub trait MetricsSink {
    fn log(&mut self, metrics: &[(&str, f64)], step: usize);
}

/// Sink that discards everything
pub struct NullSink;

impl MetricsSink for NullSink {
    fn log(&mut self, _metrics: &[(&str, f64)], _step: usize) {}
}

/// Sink that prints one line per call
pub struct StdoutSink;

impl MetricsSink for StdoutSink {
    fn log(&mut self, metrics: &[(&str, f64)], step: usize) {
        let rendered: Vec<String> = metrics
            .iter()
            .map(|(name, value)| format!("{name}={value:.6}"))
            .collect();
        println!("step {}: {}", step, rendered.join(", "));
    }
}

/// Sink that keeps every record in memory, for tests and reports
#[derive(Default)]
pub struct MemorySink {
    records: Vec<MetricRecord>,
}

/// One recorded metric value
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub step: usize,
    pub name: String,
    pub value: f64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in logging order
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Values recorded under a given metric name
    pub fn values_of(&self, name: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.value)
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn log(&mut self, metrics: &[(&str, f64)], step: usize) {
        for (name, value) in metrics {
            self.records.push(MetricRecord {
                step,
                name: (*name).to_string(),
                value: *value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let mut sink = MemorySink::new();
        sink.log(&[("loss", 1.0), ("learning_rate", 0.1)], 0);
        sink.log(&[("loss", 0.5)], 1);

        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.values_of("loss"), vec![1.0, 0.5]);
        assert_eq!(sink.values_of("learning_rate"), vec![0.1]);
        assert_eq!(sink.records()[2].step, 1);
    }

    #[test]
    fn test_null_sink_is_silent() {
        let mut sink = NullSink;
        sink.log(&[("loss", 1.0)], 0);
    }
}
