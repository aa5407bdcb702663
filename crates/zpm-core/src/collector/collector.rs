//! Collector registry that composes the configured sources.
//!
//! The `Collector` runs every enabled source in a fixed order and gathers their
//! metric families into a `Scrape` for exposition.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::collector::cron::CronLedgerSource;
use crate::collector::source::{CollectError, Source};
use crate::collector::traits::CommandRunner;
use crate::collector::zfs::{
    ArcstatsSource, DEFAULT_IOSTAT_DEVICE_TYPE, DEFAULT_ZPOOL_PATH, IostatSource, ZpoolListSource,
};
use crate::metric::{MetricFamily, MetricRecord};

/// What a scrape does when one of its sources fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The whole scrape fails and nothing is exposed.
    #[default]
    Abort,
    /// The failing source is logged and skipped; the others are still exposed.
    BestEffort,
}

/// Which sources a collector runs, and how they are invoked.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub iostat: bool,
    pub zpool_list: bool,
    pub arcstats: bool,
    /// Job ledger to expose; the cron source is enabled only when set.
    pub cron_db: Option<PathBuf>,
    pub zpool_path: String,
    pub iostat_device_type: String,
    pub failure_policy: FailurePolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            iostat: false,
            zpool_list: false,
            arcstats: false,
            cron_db: None,
            zpool_path: DEFAULT_ZPOOL_PATH.to_string(),
            iostat_device_type: DEFAULT_IOSTAT_DEVICE_TYPE.to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl SourceConfig {
    /// True if at least one command source was explicitly selected.
    fn any_command_source(&self) -> bool {
        self.iostat || self.zpool_list || self.arcstats
    }
}

/// Ordered set of sources run on every scrape.
pub struct Collector {
    sources: Vec<Box<dyn Source>>,
    failure_policy: FailurePolicy,
}

impl Collector {
    /// Builds the registry from a configuration.
    ///
    /// When none of the command sources is selected, all three are enabled.
    /// Sources run in the order iostat, zpool list, arcstats, cron.
    pub fn new<R: CommandRunner + Clone + 'static>(runner: R, config: &SourceConfig) -> Self {
        let all = !config.any_command_source();
        let mut sources: Vec<Box<dyn Source>> = Vec::new();

        if all || config.iostat {
            sources.push(Box::new(IostatSource::new(
                runner.clone(),
                &config.iostat_device_type,
            )));
        }
        if all || config.zpool_list {
            sources.push(Box::new(ZpoolListSource::new(
                runner.clone(),
                &config.zpool_path,
            )));
        }
        if all || config.arcstats {
            sources.push(Box::new(ArcstatsSource::new(runner)));
        }
        if let Some(path) = &config.cron_db {
            sources.push(Box::new(CronLedgerSource::new(path.clone())));
        }

        Self::from_sources(sources, config.failure_policy)
    }

    /// Builds a registry from arbitrary sources, run in the given order.
    pub fn from_sources(sources: Vec<Box<dyn Source>>, failure_policy: FailurePolicy) -> Self {
        Self {
            sources,
            failure_policy,
        }
    }

    /// Names of the registered sources, in run order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Runs every source once.
    ///
    /// Every call runs the sources again; nothing is cached between scrapes.
    pub fn collect(&self) -> Result<Scrape, CollectError> {
        let started = Instant::now();
        let mut scrape = Scrape::default();

        for source in &self.sources {
            let source_started = Instant::now();
            let result = source.collect();
            let elapsed = source_started.elapsed();
            scrape.timings.push((source.name(), elapsed));

            match result {
                Ok(families) => {
                    debug!(
                        source = source.name(),
                        duration_ms = elapsed.as_millis() as u64,
                        families = families.len(),
                        "source collected"
                    );
                    scrape.families.extend(families);
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::Abort => {
                        error!(source = source.name(), error = %e, "source failed, aborting scrape");
                        return Err(e);
                    }
                    FailurePolicy::BestEffort => {
                        warn!(source = source.name(), error = %e, "source failed, skipping");
                        scrape.failed_sources.push(source.name());
                    }
                },
            }
        }

        debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            families = scrape.families.len(),
            "scrape finished"
        );
        Ok(scrape)
    }
}

/// Result of one collection pass.
#[derive(Debug, Default)]
pub struct Scrape {
    families: Vec<MetricFamily>,
    failed_sources: Vec<&'static str>,
    timings: Vec<(&'static str, Duration)>,
}

impl Scrape {
    /// Metric families in source order.
    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn into_families(self) -> Vec<MetricFamily> {
        self.families
    }

    /// Every sample of every family, flattened lazily.
    pub fn records(&self) -> impl Iterator<Item = MetricRecord<'_>> + '_ {
        self.families.iter().flat_map(|f| f.records())
    }

    /// Sources skipped under [`FailurePolicy::BestEffort`].
    pub fn failed_sources(&self) -> &[&'static str] {
        &self.failed_sources
    }

    /// Time spent in each source that ran.
    pub fn timings(&self) -> &[(&'static str, Duration)] {
        &self.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;
    use crate::collector::zfs::arcstats::ARCSTATS_OID;
    use crate::ledger::{InitOutcome, Ledger};
    use tempfile::TempDir;

    fn zpool_argv() -> [&'static str; 3] {
        [DEFAULT_ZPOOL_PATH, "list", "-p"]
    }

    #[test]
    fn test_default_config_runs_all_command_sources() {
        let runner = MockRunner::freebsd_host();
        let collector = Collector::new(runner.clone(), &SourceConfig::default());
        assert_eq!(
            collector.source_names(),
            vec!["iostat", "zpool_list", "arcstats"]
        );

        let scrape = collector.collect().unwrap();
        assert!(scrape.failed_sources().is_empty());
        assert_eq!(scrape.timings().len(), 3);

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0][0], "iostat");
        assert_eq!(calls[1][0], DEFAULT_ZPOOL_PATH);
        assert_eq!(calls[2], vec!["sysctl", "-q", ARCSTATS_OID]);
    }

    #[test]
    fn test_selected_sources_only() {
        let runner = MockRunner::freebsd_host();
        let config = SourceConfig {
            arcstats: true,
            ..SourceConfig::default()
        };
        let collector = Collector::new(runner.clone(), &config);
        assert_eq!(collector.source_names(), vec!["arcstats"]);

        let scrape = collector.collect().unwrap();
        assert!(scrape.records().all(|r| r.name.starts_with("zpm_arcstats_")));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_collect_is_restartable() {
        let runner = MockRunner::freebsd_host();
        let collector = Collector::new(runner.clone(), &SourceConfig::default());

        let first = collector.collect().unwrap();
        let second = collector.collect().unwrap();

        assert_eq!(first.records().count(), second.records().count());
        assert_eq!(runner.calls().len(), 6);
    }

    #[test]
    fn test_abort_policy_exposes_nothing_on_failure() {
        let mut runner = MockRunner::freebsd_host();
        runner.remove(&zpool_argv());
        let collector = Collector::new(runner.clone(), &SourceConfig::default());

        assert!(matches!(
            collector.collect(),
            Err(CollectError::Command(_))
        ));
        // arcstats runs after zpool list and is never reached
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_best_effort_policy_keeps_other_sources() {
        let mut runner = MockRunner::freebsd_host();
        runner.add_failure(&zpool_argv(), 1);
        let config = SourceConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..SourceConfig::default()
        };
        let collector = Collector::new(runner, &config);

        let scrape = collector.collect().unwrap();
        assert_eq!(scrape.failed_sources(), &["zpool_list"]);
        assert!(scrape.records().any(|r| r.name == "zpm_iostat_reads"));
        assert!(scrape.records().any(|r| r.name == "zpm_arcstats_hits"));
        assert!(!scrape.records().any(|r| r.name.starts_with("zpm_pool_")));
    }

    #[test]
    fn test_cron_source_requires_ledger_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cron.db");
        assert_eq!(Ledger::init(&path).unwrap(), InitOutcome::Created);
        Ledger::open(&path)
            .unwrap()
            .record_run("daily", "backup", 42.0)
            .unwrap();

        let config = SourceConfig {
            zpool_list: true,
            cron_db: Some(path),
            ..SourceConfig::default()
        };
        let collector = Collector::new(MockRunner::freebsd_host(), &config);
        assert_eq!(collector.source_names(), vec!["zpool_list", "cron"]);

        let scrape = collector.collect().unwrap();
        let cron = scrape
            .records()
            .find(|r| r.name == "zpm_cron_daily")
            .unwrap();
        assert_eq!(cron.label("cronjob"), Some("backup"));
        assert_eq!(cron.value, 42.0);
    }

    #[test]
    fn test_empty_registry_yields_empty_scrape() {
        let collector = Collector::from_sources(Vec::new(), FailurePolicy::Abort);
        let scrape = collector.collect().unwrap();
        assert_eq!(scrape.records().count(), 0);
    }
}
