//! Prometheus text exposition of a collection pass.
//!
//! Each scrape builds a fresh [`prometheus::Registry`], registers one collector per
//! [`MetricFamily`] and encodes it with [`TextEncoder`]. Nothing is kept between scrapes,
//! so a pool or job that disappears simply stops being exported.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TEXT_FORMAT, TextEncoder,
};
use thiserror::Error;

use crate::collector::{CollectError, Collector};
use crate::metric::{MetricFamily, MetricKind};

/// `Content-Type` of the text exposition format.
pub const CONTENT_TYPE: &str = TEXT_FORMAT;

/// Error type for a failed scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),
    #[error("encoding failed: {0}")]
    Encode(#[from] prometheus::Error),
}

/// Runs the collector once and renders the result.
pub fn render(collector: &Collector) -> Result<String, ScrapeError> {
    let scrape = collector.collect()?;
    Ok(encode_text(scrape.families())?)
}

/// Encodes metric families in the Prometheus text format.
pub fn encode_text(families: &[MetricFamily]) -> prometheus::Result<String> {
    let registry = Registry::new();
    for family in families {
        registry.register(family_collector(family)?)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

type BoxedCollector = Box<dyn prometheus::core::Collector>;

fn family_collector(family: &MetricFamily) -> prometheus::Result<BoxedCollector> {
    let opts = Opts::new(family.exposition_name(), family.help());
    let label_names: Vec<&str> = family.label_names().iter().map(String::as_str).collect();

    let collector: BoxedCollector = match (family.kind(), label_names.is_empty()) {
        (MetricKind::Gauge, true) => {
            let gauge = Gauge::with_opts(opts)?;
            for sample in family.samples() {
                gauge.set(sample.value);
            }
            Box::new(gauge)
        }
        (MetricKind::Gauge, false) => {
            let gauges = GaugeVec::new(opts, &label_names)?;
            for sample in family.samples() {
                gauges
                    .get_metric_with_label_values(&label_refs(&sample.label_values))?
                    .set(sample.value);
            }
            Box::new(gauges)
        }
        (MetricKind::Counter, true) => {
            let counter = Counter::with_opts(opts)?;
            for sample in family.samples() {
                counter.inc_by(counter_value(family, sample.value)?);
            }
            Box::new(counter)
        }
        (MetricKind::Counter, false) => {
            let counters = CounterVec::new(opts, &label_names)?;
            for sample in family.samples() {
                counters
                    .get_metric_with_label_values(&label_refs(&sample.label_values))?
                    .inc_by(counter_value(family, sample.value)?);
            }
            Box::new(counters)
        }
    };

    Ok(collector)
}

fn label_refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn counter_value(family: &MetricFamily, value: f64) -> prometheus::Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(prometheus::Error::Msg(format!(
            "{}: counter value {} is not a finite non-negative number",
            family.name(),
            value
        )))
    }
}
