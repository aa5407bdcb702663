//! ZFS ARC statistics from `sysctl -q kstat.zfs.misc.arcstats`.

use crate::collector::source::{CollectError, Source};
use crate::collector::traits::CommandRunner;
use crate::collector::zfs::argv;
use crate::collector::zfs::parser::{ParseError, SysctlEntry, parse_sysctl};
use crate::metric::{MetricFamily, MetricKind, Unit};

/// sysctl namespace of the ARC statistics.
pub const ARCSTATS_OID: &str = "kstat.zfs.misc.arcstats";

/// A tracked ARC statistic.
#[derive(Debug, Clone, Copy)]
pub struct ArcStat {
    /// Key with the namespace removed, e.g. `hits`.
    pub key: &'static str,
    pub kind: MetricKind,
    pub unit: Option<Unit>,
    pub help: &'static str,
}

const fn counter(key: &'static str, help: &'static str) -> ArcStat {
    ArcStat {
        key,
        kind: MetricKind::Counter,
        unit: None,
        help,
    }
}

const fn size(key: &'static str, help: &'static str) -> ArcStat {
    ArcStat {
        key,
        kind: MetricKind::Gauge,
        unit: Some(Unit::Bytes),
        help,
    }
}

/// Allow-list of exported statistics. Anything else reported by the kernel is ignored.
pub const ARC_STATS: &[ArcStat] = &[
    counter(
        "access_skip",
        "Buffers skipped when updating the access state",
    ),
    ArcStat {
        key: "allocated",
        kind: MetricKind::Counter,
        unit: Some(Unit::Bytes),
        help: "Memory allocated to the ARC",
    },
    size("c_max", "Maximum target cache size"),
    size("c_min", "Minimum target cache size"),
    size("c", "Target cache size"),
    size("compressed_size", "Compressed size of the entire ARC"),
    size("data_size", "Bytes consumed by data buffers"),
    counter("deleted", "Times data was deleted from the ARC"),
    counter("demand_data_hits", "Demand data hits"),
    counter("demand_data_misses", "Demand data misses"),
    counter("demand_metadata_hits", "Demand metadata hits"),
    counter("demand_metadata_misses", "Demand metadata misses"),
    ArcStat {
        key: "hash_chain_max",
        kind: MetricKind::Gauge,
        unit: None,
        help: "Longest hash chain",
    },
    ArcStat {
        key: "hash_chains",
        kind: MetricKind::Gauge,
        unit: None,
        help: "Current number of hash chains",
    },
    counter("hash_collisions", "Hash collisions"),
    counter("hits", "Overall hits"),
    counter("mfu_hits", "MFU hits"),
    counter("misses", "Overall misses"),
    counter("mru_hits", "MRU hits"),
    size("mru_size", "Size of the MRU list"),
    counter(
        "mutex_miss",
        "Buffers not evicted because the hash lock was held",
    ),
    size(
        "other_size",
        "Bytes consumed by structures not backed by ARC buffers",
    ),
    size("overhead_size", "Bytes consumed by arc_buf_t data buffers"),
    size("p", "Target size of the MRU"),
    counter("prefetch_data_hits", "Prefetch data hits"),
    counter("prefetch_data_misses", "Prefetch data misses"),
    counter("prefetch_metadata_hits", "Prefetch metadata hits"),
    counter("prefetch_metadata_misses", "Prefetch metadata misses"),
    size("size", "Actual size of the entire ARC"),
    size("uncompressed_size", "Uncompressed size of the entire ARC"),
];

/// Looks up a statistic on the allow-list.
pub fn lookup(key: &str) -> Option<&'static ArcStat> {
    ARC_STATS.iter().find(|stat| stat.key == key)
}

/// Collects one unlabeled metric per recognized ARC statistic.
pub struct ArcstatsSource<R: CommandRunner> {
    runner: R,
    argv: Vec<String>,
}

impl<R: CommandRunner> ArcstatsSource<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            argv: argv(&["sysctl", "-q", ARCSTATS_OID]),
        }
    }
}

impl<R: CommandRunner> Source for ArcstatsSource<R> {
    fn name(&self) -> &'static str {
        "arcstats"
    }

    fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let output = self.runner.run(&self.argv)?;
        let prefix = format!("{}.", ARCSTATS_OID);
        let entries = parse_sysctl(&output, &prefix)?;
        arcstats_families(&entries)
    }
}

/// Maps sysctl entries onto metric families. Keys not on the allow-list are skipped.
pub fn arcstats_families(entries: &[SysctlEntry<'_>]) -> Result<Vec<MetricFamily>, CollectError> {
    let mut families: Vec<MetricFamily> = Vec::new();

    for entry in entries {
        let Some(stat) = lookup(entry.key) else {
            continue;
        };
        let value: f64 = entry.value.parse().map_err(|_| {
            ParseError::new(format!("invalid value {:?} for {}", entry.value, entry.key))
        })?;

        let name = format!("zpm_arcstats_{}", stat.key);
        let position = families.iter().position(|f| f.name() == name);
        let family = match position {
            Some(idx) => &mut families[idx],
            None => {
                let mut family = match stat.kind {
                    MetricKind::Counter => MetricFamily::counter(name, stat.help),
                    MetricKind::Gauge => MetricFamily::gauge(name, stat.help),
                };
                if let Some(unit) = stat.unit {
                    family = family.with_unit(unit);
                }
                families.push(family);
                let last = families.len() - 1;
                &mut families[last]
            }
        };
        family.add_sample(&[], value)?;
    }

    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;

    #[test]
    fn test_allow_list_is_unique() {
        for (i, stat) in ARC_STATS.iter().enumerate() {
            assert!(
                ARC_STATS[i + 1..].iter().all(|other| other.key != stat.key),
                "duplicate key {}",
                stat.key
            );
        }
        assert_eq!(ARC_STATS.len(), 30);
    }

    #[test]
    fn test_unknown_key_produces_nothing() {
        let entries = [SysctlEntry {
            key: "l2_hits",
            value: "42",
        }];
        assert!(arcstats_families(&entries).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_key_value_is_not_parsed() {
        let entries = [SysctlEntry {
            key: "l2_feeds",
            value: "not-a-number",
        }];
        assert!(arcstats_families(&entries).is_ok());
    }

    #[test]
    fn test_known_key_with_bad_value_is_error() {
        let entries = [SysctlEntry {
            key: "hits",
            value: "lots",
        }];
        let err = arcstats_families(&entries).unwrap_err();
        assert!(matches!(err, CollectError::Parse(_)));
    }

    #[test]
    fn test_repeated_key_is_error() {
        let entries = [
            SysctlEntry {
                key: "hits",
                value: "1",
            },
            SysctlEntry {
                key: "hits",
                value: "2",
            },
        ];
        let err = arcstats_families(&entries).unwrap_err();
        assert!(matches!(err, CollectError::DuplicateSample { .. }));
    }

    #[test]
    fn test_collect_from_mock() {
        let source = ArcstatsSource::new(MockRunner::freebsd_host());
        let families = source.collect().unwrap();

        let hits = families
            .iter()
            .find(|f| f.name() == "zpm_arcstats_hits")
            .unwrap();
        assert_eq!(hits.kind(), MetricKind::Counter);
        assert_eq!(hits.samples().len(), 1);
        assert!(hits.samples()[0].label_values.is_empty());
        assert_eq!(hits.samples()[0].value, 98765432.0);

        let size = families
            .iter()
            .find(|f| f.name() == "zpm_arcstats_size")
            .unwrap();
        assert_eq!(size.kind(), MetricKind::Gauge);
        assert_eq!(size.exposition_name(), "zpm_arcstats_size_bytes");

        assert!(families.iter().all(|f| f.name() != "zpm_arcstats_l2_hits"));
    }
}
