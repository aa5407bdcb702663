//! Metric record model.
//!
//! Every source turns its input into [`MetricFamily`] values: one family per metric name,
//! holding the samples observed in a single collection pass. [`MetricRecord`] is the flat
//! per-sample view handed to exposition.

use crate::collector::CollectError;

/// Kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic, cumulative value.
    Counter,
    /// Point-in-time value that may go down.
    Gauge,
}

/// Semantic unit tag. Used for naming and documentation only, never for value conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Seconds,
    Percent,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Bytes => "bytes",
            Unit::Seconds => "seconds",
            Unit::Percent => "percent",
        }
    }
}

/// One observation within a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label values, positionally matching the family's label names.
    pub label_values: Vec<String>,
    pub value: f64,
}

/// All samples of one metric name collected in a single pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    name: String,
    help: String,
    kind: MetricKind,
    unit: Option<Unit>,
    label_names: Vec<String>,
    samples: Vec<Sample>,
}

impl MetricFamily {
    fn new(kind: MetricKind, name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            unit: None,
            label_names: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Creates an empty gauge family without labels.
    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(MetricKind::Gauge, name, help)
    }

    /// Creates an empty counter family without labels.
    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(MetricKind::Counter, name, help)
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the label key set. Fixed for the lifetime of the family.
    pub fn with_labels(mut self, names: &[&str]) -> Self {
        self.label_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn unit(&self) -> Option<Unit> {
        self.unit
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Adds a sample.
    ///
    /// Fails if the number of label values does not match the label names, or if a sample
    /// with identical label values already exists in this family.
    pub fn add_sample(&mut self, label_values: &[&str], value: f64) -> Result<(), CollectError> {
        if label_values.len() != self.label_names.len() {
            return Err(CollectError::LabelArity {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                got: label_values.len(),
            });
        }

        let duplicate = self
            .samples
            .iter()
            .any(|s| s.label_values.iter().map(String::as_str).eq(label_values.iter().copied()));
        if duplicate {
            return Err(CollectError::DuplicateSample {
                metric: self.name.clone(),
                labels: label_values.iter().map(|v| v.to_string()).collect(),
            });
        }

        self.samples.push(Sample {
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
        });
        Ok(())
    }

    /// Name as exposed in the text format.
    ///
    /// The unit is appended as a suffix unless the name already ends with it, and counters
    /// get `_total`: `zpm_iostat_read` (counter, bytes) becomes `zpm_iostat_read_bytes_total`.
    pub fn exposition_name(&self) -> String {
        let mut name = match self.kind {
            MetricKind::Counter => self.name.strip_suffix("_total").unwrap_or(&self.name),
            MetricKind::Gauge => &self.name,
        }
        .to_string();
        if let Some(unit) = self.unit {
            let suffix = format!("_{}", unit.as_str());
            if !name.ends_with(&suffix) {
                name.push_str(&suffix);
            }
        }
        if self.kind == MetricKind::Counter {
            name.push_str("_total");
        }
        name
    }

    /// Flat per-sample view of this family.
    pub fn records(&self) -> impl Iterator<Item = MetricRecord<'_>> + '_ {
        self.samples.iter().map(move |sample| MetricRecord {
            name: &self.name,
            help: &self.help,
            kind: self.kind,
            unit: self.unit,
            labels: self
                .label_names
                .iter()
                .map(String::as_str)
                .zip(sample.label_values.iter().map(String::as_str))
                .collect(),
            value: sample.value,
        })
    }
}

/// A single named, typed, labeled observation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord<'a> {
    pub name: &'a str,
    pub help: &'a str,
    pub kind: MetricKind,
    pub unit: Option<Unit>,
    /// Ordered `(key, value)` label pairs.
    pub labels: Vec<(&'a str, &'a str)>,
    pub value: f64,
}

impl<'a> MetricRecord<'a> {
    /// Returns the value of a label by key.
    pub fn label(&self, key: &str) -> Option<&'a str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sample_rejects_duplicate_labels() {
        let mut family = MetricFamily::gauge("zpm_pool_size", "size").with_labels(&["pool"]);
        family.add_sample(&["zroot"], 1.0).unwrap();
        family.add_sample(&["tank"], 2.0).unwrap();

        let err = family.add_sample(&["zroot"], 3.0).unwrap_err();
        assert!(matches!(err, CollectError::DuplicateSample { .. }));
        assert_eq!(family.samples().len(), 2);
    }

    #[test]
    fn test_add_sample_rejects_wrong_arity() {
        let mut family = MetricFamily::counter("zpm_iostat_reads", "reads").with_labels(&["device"]);
        let err = family.add_sample(&[], 1.0).unwrap_err();
        assert!(matches!(
            err,
            CollectError::LabelArity {
                expected: 1,
                got: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_unlabeled_family_holds_one_sample() {
        let mut family = MetricFamily::counter("zpm_arcstats_hits", "hits");
        family.add_sample(&[], 10.0).unwrap();
        assert!(family.add_sample(&[], 11.0).is_err());
    }

    #[test]
    fn test_exposition_name() {
        let read = MetricFamily::counter("zpm_iostat_read", "read").with_unit(Unit::Bytes);
        assert_eq!(read.exposition_name(), "zpm_iostat_read_bytes_total");

        let size = MetricFamily::gauge("zpm_pool_size", "size").with_unit(Unit::Bytes);
        assert_eq!(size.exposition_name(), "zpm_pool_size_bytes");

        let online = MetricFamily::gauge("zpm_pool_online", "online");
        assert_eq!(online.exposition_name(), "zpm_pool_online");

        let already = MetricFamily::counter("x_seconds_total", "x").with_unit(Unit::Seconds);
        assert_eq!(already.exposition_name(), "x_seconds_total");
    }

    #[test]
    fn test_records_pair_labels_with_values() {
        let mut family = MetricFamily::gauge("zpm_cron_daily", "daily").with_labels(&["cronjob"]);
        family.add_sample(&["backup"], 1700000000.0).unwrap();

        let records: Vec<_> = family.records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "zpm_cron_daily");
        assert_eq!(records[0].label("cronjob"), Some("backup"));
        assert_eq!(records[0].kind, MetricKind::Gauge);
        assert_eq!(records[0].value, 1700000000.0);
    }

    #[test]
    fn test_label_outlives_record() {
        let mut family = MetricFamily::gauge("zpm_pool_online", "online").with_labels(&["pool"]);
        family.add_sample(&["zroot"], 1.0).unwrap();
        family.add_sample(&["tank"], 0.0).unwrap();

        let pools: Vec<(&str, f64)> = family
            .records()
            .map(|r| (r.label("pool").unwrap(), r.value))
            .collect();
        assert_eq!(pools, vec![("zroot", 1.0), ("tank", 0.0)]);
    }
}
