//! Pool capacity and health from `zpool list -p`.

use crate::collector::source::{CollectError, Source};
use crate::collector::traits::CommandRunner;
use crate::collector::zfs::argv;
use crate::collector::zfs::parser::{ZpoolListRow, parse_zpool_list};
use crate::metric::{MetricFamily, Unit};

/// Collects one gauge per pool for size, allocation, fragmentation, capacity, dedup and health.
pub struct ZpoolListSource<R: CommandRunner> {
    runner: R,
    argv: Vec<String>,
}

impl<R: CommandRunner> ZpoolListSource<R> {
    /// Creates a new pool-list source.
    ///
    /// # Arguments
    /// * `runner` - Command runner (real or mock)
    /// * `zpool_path` - Path to the `zpool` binary (usually `/sbin/zpool`)
    pub fn new(runner: R, zpool_path: &str) -> Self {
        Self {
            runner,
            argv: argv(&[zpool_path, "list", "-p"]),
        }
    }

    /// The command this source runs.
    pub fn command(&self) -> &[String] {
        &self.argv
    }
}

impl<R: CommandRunner> Source for ZpoolListSource<R> {
    fn name(&self) -> &'static str {
        "zpool_list"
    }

    fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let output = self.runner.run(&self.argv)?;
        let rows = parse_zpool_list(&output)?;
        pool_families(&rows)
    }
}

/// Maps parsed pool rows onto metric families, labeled by pool name.
pub fn pool_families(rows: &[ZpoolListRow]) -> Result<Vec<MetricFamily>, CollectError> {
    let labels = ["pool"];
    let mut size = MetricFamily::gauge("zpm_pool_size", "Pool total size in bytes")
        .with_unit(Unit::Bytes)
        .with_labels(&labels);
    let mut alloc = MetricFamily::gauge("zpm_pool_alloc", "Pool allocated size in bytes")
        .with_unit(Unit::Bytes)
        .with_labels(&labels);
    let mut free = MetricFamily::gauge("zpm_pool_free", "Pool free size in bytes")
        .with_unit(Unit::Bytes)
        .with_labels(&labels);
    let mut frag = MetricFamily::gauge("zpm_pool_frag", "Pool fragmentation percent")
        .with_unit(Unit::Percent)
        .with_labels(&labels);
    let mut cap = MetricFamily::gauge("zpm_pool_cap", "Pool capacity used percent")
        .with_unit(Unit::Percent)
        .with_labels(&labels);
    let mut dedup =
        MetricFamily::gauge("zpm_pool_dedup_ratio", "Pool dedup ratio").with_labels(&labels);
    let mut online =
        MetricFamily::gauge("zpm_pool_online", "1 if the pool is ONLINE, 0 otherwise")
            .with_labels(&labels);

    for row in rows {
        let pool = [row.name.as_str()];
        size.add_sample(&pool, row.size)?;
        alloc.add_sample(&pool, row.alloc)?;
        free.add_sample(&pool, row.free)?;
        frag.add_sample(&pool, row.frag)?;
        cap.add_sample(&pool, row.cap)?;
        dedup.add_sample(&pool, row.dedup)?;
        online.add_sample(&pool, if row.is_online() { 1.0 } else { 0.0 })?;
    }

    Ok(vec![size, alloc, free, frag, cap, dedup, online])
}
