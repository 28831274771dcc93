//! Prometheus metrics exporter.
//!
//! Exports the latest per-run samples in Prometheus text format.

use std::fmt::Write;
use std::sync::Arc;

use super::collector::DynamicMetrics;

/// Prometheus metrics exporter.
pub struct PrometheusExporter {
    metrics: Arc<DynamicMetrics>,
    namespace: String,
}

impl PrometheusExporter {
    pub fn new(metrics: Arc<DynamicMetrics>) -> Self {
        Self {
            metrics,
            namespace: "cloud_inventory".to_string(),
        }
    }

    pub fn with_namespace(metrics: Arc<DynamicMetrics>, namespace: impl Into<String>) -> Self {
        Self {
            metrics,
            namespace: namespace.into(),
        }
    }

    /// Export metrics in Prometheus text format.
    ///
    /// Families without samples still get their HELP/TYPE header so scrapes
    /// see every declared task type.
    pub fn export(&self) -> String {
        let snapshot = self.metrics.snapshot();
        let mut output = String::new();

        for descriptor in &snapshot.descriptors {
            let full_name = format!("{}_{}", self.namespace, sanitize_name(&descriptor.task_type));
            let _ = writeln!(output, "# HELP {} {}", full_name, escape_help(&descriptor.help));
            let _ = writeln!(output, "# TYPE {} gauge", full_name);

            for (key, value) in snapshot.samples_for(&descriptor.task_type) {
                let labels: Vec<(&str, &str)> = descriptor
                    .labels
                    .iter()
                    .map(String::as_str)
                    .zip(key.label_values.iter().map(String::as_str))
                    .collect();
                write_sample(&mut output, &full_name, &labels, value);
            }
        }

        output
    }
}

fn write_sample(output: &mut String, name: &str, labels: &[(&str, &str)], value: f64) {
    if labels.is_empty() {
        let _ = writeln!(output, "{} {}", name, value);
        return;
    }

    let labels_str = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(output, "{}{{{}}} {}", name, labels_str, value);
}

/// Metric names allow `[a-zA-Z0-9_:]`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
