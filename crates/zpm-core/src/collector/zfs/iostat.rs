//! Per-device I/O counters from `iostat -x -I`.

use crate::collector::source::{CollectError, Source};
use crate::collector::traits::CommandRunner;
use crate::collector::zfs::argv;
use crate::collector::zfs::parser::{IostatRow, parse_iostat};
use crate::metric::{MetricFamily, Unit};

/// Collects cumulative I/O totals per device.
pub struct IostatSource<R: CommandRunner> {
    runner: R,
    argv: Vec<String>,
}

impl<R: CommandRunner> IostatSource<R> {
    /// Creates a new iostat source.
    ///
    /// # Arguments
    /// * `runner` - Command runner (real or mock)
    /// * `device_type` - Device type filter for `iostat -t` (usually `da`)
    pub fn new(runner: R, device_type: &str) -> Self {
        Self {
            runner,
            argv: argv(&["iostat", "-t", device_type, "-x", "-I"]),
        }
    }

    /// The command this source runs.
    pub fn command(&self) -> &[String] {
        &self.argv
    }
}

impl<R: CommandRunner> Source for IostatSource<R> {
    fn name(&self) -> &'static str {
        "iostat"
    }

    fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let output = self.runner.run(&self.argv)?;
        let rows = parse_iostat(&output)?;
        iostat_families(&rows)
    }
}

/// Maps parsed iostat rows onto metric families, labeled by device.
pub fn iostat_families(rows: &[IostatRow]) -> Result<Vec<MetricFamily>, CollectError> {
    let labels = ["device"];
    let mut reads = MetricFamily::counter("zpm_iostat_reads", "Total reads").with_labels(&labels);
    let mut writes =
        MetricFamily::counter("zpm_iostat_writes", "Total writes").with_labels(&labels);
    let mut read_bytes = MetricFamily::counter("zpm_iostat_read", "Bytes read")
        .with_unit(Unit::Bytes)
        .with_labels(&labels);
    let mut write_bytes = MetricFamily::counter("zpm_iostat_write", "Bytes written")
        .with_unit(Unit::Bytes)
        .with_labels(&labels);
    let mut qlen =
        MetricFamily::gauge("zpm_iostat_qlen", "Length of the transaction queue")
            .with_labels(&labels);
    let mut transaction_duration = MetricFamily::counter(
        "zpm_iostat_transaction_duration",
        "Duration of completed transactions in seconds",
    )
    .with_unit(Unit::Seconds)
    .with_labels(&labels);
    let mut outstanding_duration = MetricFamily::counter(
        "zpm_iostat_outstanding_transactions",
        "Duration of outstanding transactions in seconds",
    )
    .with_unit(Unit::Seconds)
    .with_labels(&labels);

    for row in rows {
        let device = [row.device.as_str()];
        reads.add_sample(&device, row.reads)?;
        writes.add_sample(&device, row.writes)?;
        read_bytes.add_sample(&device, row.read_bytes)?;
        write_bytes.add_sample(&device, row.write_bytes)?;
        qlen.add_sample(&device, row.queue_length)?;
        transaction_duration.add_sample(&device, row.transaction_duration)?;
        outstanding_duration.add_sample(&device, row.outstanding_duration)?;
    }

    Ok(vec![
        reads,
        writes,
        read_bytes,
        write_bytes,
        qlen,
        transaction_duration,
        outstanding_duration,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;
    use crate::metric::MetricKind;

    #[test]
    fn test_collect_from_mock() {
        let source = IostatSource::new(MockRunner::freebsd_host(), "da");
        let families = source.collect().unwrap();
        assert_eq!(families.len(), 7);

        let kinds: Vec<MetricKind> = families.iter().map(|f| f.kind()).collect();
        assert_eq!(
            kinds,
            [
                MetricKind::Counter,
                MetricKind::Counter,
                MetricKind::Counter,
                MetricKind::Counter,
                MetricKind::Gauge,
                MetricKind::Counter,
                MetricKind::Counter,
            ]
        );

        let read_bytes = families
            .iter()
            .find(|f| f.name() == "zpm_iostat_read")
            .unwrap();
        let da0 = read_bytes
            .records()
            .find(|r| r.label("device") == Some("da0"))
            .unwrap();
        assert_eq!(da0.value, 9876543.5 * 1024.0);
        assert_eq!(read_bytes.exposition_name(), "zpm_iostat_read_bytes_total");
    }

    #[test]
    fn test_device_type_in_command() {
        let source = IostatSource::new(MockRunner::new(), "ada");
        assert_eq!(source.command(), ["iostat", "-t", "ada", "-x", "-I"]);
    }
}
