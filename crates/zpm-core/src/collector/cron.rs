//! Job ledger source: exposes the last successful run time of each tracked job.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::collector::source::{CollectError, Source};
use crate::ledger::{Ledger, LedgerEntry};
use crate::metric::MetricFamily;

/// Reads the job ledger on every scrape.
///
/// The ledger is opened read-only per collection, so a ledger that is created or
/// replaced while the exporter runs is picked up on the next scrape.
#[derive(Debug, Clone)]
pub struct CronLedgerSource {
    db_path: PathBuf,
}

impl CronLedgerSource {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Source for CronLedgerSource {
    fn name(&self) -> &'static str {
        "cron"
    }

    fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let mut ledger = Ledger::open_read_only(&self.db_path)?;
        let entries = ledger.entries()?;
        cron_families(&entries)
    }
}

/// One gauge per run frequency, `zpm_cron_<runfreq>`, labeled by job name.
pub fn cron_families(entries: &[LedgerEntry]) -> Result<Vec<MetricFamily>, CollectError> {
    let mut families: BTreeMap<&str, MetricFamily> = BTreeMap::new();

    for entry in entries {
        let family = families
            .entry(entry.run_frequency.as_str())
            .or_insert_with(|| {
                MetricFamily::gauge(
                    format!("zpm_cron_{}", entry.run_frequency),
                    format!("Last run time of {} cron jobs", entry.run_frequency),
                )
                .with_labels(&["cronjob"])
            });
        family.add_sample(&[entry.job_name.as_str()], entry.last_run_time)?;
    }

    Ok(families.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{InitOutcome, Ledger};
    use crate::metric::MetricKind;
    use tempfile::TempDir;

    fn entry(freq: &str, job: &str, time: f64) -> LedgerEntry {
        LedgerEntry {
            run_frequency: freq.to_string(),
            job_name: job.to_string(),
            last_run_time: time,
        }
    }

    #[test]
    fn test_one_family_per_frequency() {
        let entries = vec![
            entry("daily", "backup", 10.0),
            entry("daily", "scrub", 20.0),
            entry("hourly", "snapshot", 30.0),
        ];
        let families = cron_families(&entries).unwrap();

        assert_eq!(families.len(), 2);
        assert_eq!(families[0].name(), "zpm_cron_daily");
        assert_eq!(families[0].help(), "Last run time of daily cron jobs");
        assert_eq!(families[0].kind(), MetricKind::Gauge);
        assert_eq!(families[0].samples().len(), 2);
        assert_eq!(families[1].name(), "zpm_cron_hourly");

        let snapshot = families[1].records().next().unwrap();
        assert_eq!(snapshot.label("cronjob"), Some("snapshot"));
        assert_eq!(snapshot.value, 30.0);
    }

    #[test]
    fn test_no_entries_no_families() {
        assert!(cron_families(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_collect_reads_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cron.db");
        assert_eq!(Ledger::init(&path).unwrap(), InitOutcome::Created);
        Ledger::open(&path)
            .unwrap()
            .record_run("weekly", "scrub", 1_700_000_000.25)
            .unwrap();

        let source = CronLedgerSource::new(&path);
        let families = source.collect().unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name(), "zpm_cron_weekly");
        assert_eq!(families[0].samples()[0].value, 1_700_000_000.25);
    }

    #[test]
    fn test_collect_missing_ledger_is_error() {
        let dir = TempDir::new().unwrap();
        let source = CronLedgerSource::new(dir.path().join("absent.db"));
        assert!(matches!(source.collect(), Err(CollectError::Ledger(_))));
    }
}
