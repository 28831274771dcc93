//! Per-run metrics.
//!
//! Every collector and housekeeper run reports one sample keyed by its task
//! type and concrete label values; the latest sample per key is what a
//! scrape sees.
//!
//! # Example
//!
//! ```ignore
//! use cloud_inventory::metrics::{DynamicMetrics, MetricDescriptor, PrometheusExporter};
//!
//! let mut metrics = DynamicMetrics::new();
//! metrics.describe(MetricDescriptor::new("networks", "Networks upserted", &["region"]))?;
//! metrics.record("networks", &["r1"], 3.0)?;
//!
//! let text = PrometheusExporter::new(Arc::new(metrics)).export();
//! ```

mod collector;
mod prometheus;

pub use collector::{DynamicMetrics, MetricDescriptor, MetricsSnapshot, SampleKey};
pub use prometheus::PrometheusExporter;
