//! Dynamic metrics collector implementation.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::registry::{Registry, RegistryError};
use crate::{Error, Result};

/// Declared shape of one metric family: one per task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Task type the samples belong to; also the metric name.
    pub task_type: String,
    pub help: String,
    pub labels: Vec<String>,
}

impl MetricDescriptor {
    pub fn new(task_type: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            task_type: task_type.into(),
            help: help.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Task type plus concrete label values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    pub task_type: String,
    pub label_values: Vec<String>,
}

impl SampleKey {
    pub fn new<S: AsRef<str>>(task_type: impl Into<String>, label_values: &[S]) -> Self {
        Self {
            task_type: task_type.into(),
            label_values: label_values.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }
}

/// Descriptor registry plus latest-sample map.
///
/// Descriptors are registered at startup through `&mut self`; samples are
/// recorded concurrently by running tasks. Samples never expire, so a scope
/// that disappears from configuration keeps its last value until restart.
#[derive(Debug)]
pub struct DynamicMetrics {
    descriptors: Registry<String, MetricDescriptor>,
    samples: DashMap<SampleKey, f64>,
}

impl DynamicMetrics {
    pub fn new() -> Self {
        Self {
            descriptors: Registry::new("metric descriptors"),
            samples: DashMap::new(),
        }
    }

    /// Declare a metric family.
    pub fn describe(
        &mut self,
        descriptor: MetricDescriptor,
    ) -> std::result::Result<(), RegistryError> {
        self.descriptors
            .register(descriptor.task_type.clone(), descriptor)
    }

    pub fn descriptor(&self, task_type: &str) -> Option<&MetricDescriptor> {
        self.descriptors.get(&task_type.to_string())
    }

    /// Replace the sample for `(task_type, label_values)`.
    pub fn record<S: AsRef<str>>(
        &self,
        task_type: &str,
        label_values: &[S],
        value: f64,
    ) -> Result<()> {
        let descriptor = self
            .descriptor(task_type)
            .ok_or_else(|| Error::not_found("metric descriptor", task_type))?;
        if descriptor.labels.len() != label_values.len() {
            return Err(Error::validation(format!(
                "metric '{}' expects {} label values, got {}",
                task_type,
                descriptor.labels.len(),
                label_values.len()
            )));
        }
        self.samples
            .insert(SampleKey::new(task_type, label_values), value);
        Ok(())
    }

    pub fn sample<S: AsRef<str>>(&self, task_type: &str, label_values: &[S]) -> Option<f64> {
        self.samples
            .get(&SampleKey::new(task_type, label_values))
            .map(|v| *v)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Copy of the current state, ordered for stable export.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut descriptors: Vec<MetricDescriptor> = self
            .descriptors
            .keys()
            .filter_map(|k| self.descriptors.get(k))
            .cloned()
            .collect();
        descriptors.sort_by(|a, b| a.task_type.cmp(&b.task_type));

        let samples = self
            .samples
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        MetricsSnapshot {
            descriptors,
            samples,
        }
    }
}

impl Default for DynamicMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub descriptors: Vec<MetricDescriptor>,
    pub samples: BTreeMap<SampleKey, f64>,
}

impl MetricsSnapshot {
    /// Samples for one task type, in label order.
    pub fn samples_for<'a>(
        &'a self,
        task_type: &'a str,
    ) -> impl Iterator<Item = (&'a SampleKey, f64)> + 'a {
        self.samples
            .iter()
            .filter(move |(key, _)| key.task_type == task_type)
            .map(|(key, value)| (key, *value))
    }
}
