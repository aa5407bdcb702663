//! Pre-built mock runner scenarios for testing.
//!
//! These scenarios provide realistic command output for the default command vectors.

use super::runner::MockRunner;
use crate::collector::zfs::{DEFAULT_IOSTAT_DEVICE_TYPE, DEFAULT_ZPOOL_PATH};

/// `zpool list -p` with one healthy and one degraded pool.
pub const ZPOOL_LIST_OUTPUT: &str = "\
NAME    SIZE           ALLOC          FREE          CKPOINT  EXPANDSZ  FRAG  CAP  DEDUP  HEALTH    ALTROOT
zroot   996432412672   214748364800   781684047872  -        -         12    21   1.00   ONLINE    -
tank    3985729650688  2989297238016  996432412672  -        -         37    75   1.05   DEGRADED  -
";

/// `iostat -t da -x -I` with two disks.
pub const IOSTAT_OUTPUT: &str = "\
                        extended device statistics
device       r/i         w/i         kr/i         kw/i  qlen   tsvc_t/i      sb/i
da0     123456.0     654321.0    9876543.5   12345678.0     0     4321.5     987.2
da1      23456.0      54321.0     876543.0    2345678.0     2      321.5      87.2
";

/// `sysctl -q kstat.zfs.misc.arcstats`, including keys that are not exported.
pub const ARCSTATS_OUTPUT: &str = "\
kstat.zfs.misc.arcstats.hits: 98765432
kstat.zfs.misc.arcstats.misses: 1234567
kstat.zfs.misc.arcstats.demand_data_hits: 50000000
kstat.zfs.misc.arcstats.demand_data_misses: 600000
kstat.zfs.misc.arcstats.demand_metadata_hits: 40000000
kstat.zfs.misc.arcstats.demand_metadata_misses: 500000
kstat.zfs.misc.arcstats.prefetch_data_hits: 100000
kstat.zfs.misc.arcstats.prefetch_data_misses: 90000
kstat.zfs.misc.arcstats.prefetch_metadata_hits: 80000
kstat.zfs.misc.arcstats.prefetch_metadata_misses: 44567
kstat.zfs.misc.arcstats.mru_hits: 30000000
kstat.zfs.misc.arcstats.mfu_hits: 68000000
kstat.zfs.misc.arcstats.deleted: 2000000
kstat.zfs.misc.arcstats.mutex_miss: 1200
kstat.zfs.misc.arcstats.access_skip: 5
kstat.zfs.misc.arcstats.hash_collisions: 345678
kstat.zfs.misc.arcstats.hash_chains: 12000
kstat.zfs.misc.arcstats.hash_chain_max: 7
kstat.zfs.misc.arcstats.p: 4294967296
kstat.zfs.misc.arcstats.c: 8589934592
kstat.zfs.misc.arcstats.c_min: 1073741824
kstat.zfs.misc.arcstats.c_max: 17179869184
kstat.zfs.misc.arcstats.size: 8500000000
kstat.zfs.misc.arcstats.compressed_size: 6000000000
kstat.zfs.misc.arcstats.uncompressed_size: 9000000000
kstat.zfs.misc.arcstats.overhead_size: 300000000
kstat.zfs.misc.arcstats.data_size: 7000000000
kstat.zfs.misc.arcstats.other_size: 200000000
kstat.zfs.misc.arcstats.mru_size: 3000000000
kstat.zfs.misc.arcstats.allocated: 123456789012
kstat.zfs.misc.arcstats.l2_hits: 0
kstat.zfs.misc.arcstats.l2_misses: 0
kstat.zfs.misc.arcstats.memory_throttle_count: 0
";

impl MockRunner {
    /// A FreeBSD host with two pools, two disks and a populated ARC,
    /// answering the default command vectors.
    pub fn freebsd_host() -> Self {
        let mut runner = Self::new();
        runner.add_output(&[DEFAULT_ZPOOL_PATH, "list", "-p"], ZPOOL_LIST_OUTPUT);
        runner.add_output(
            &["iostat", "-t", DEFAULT_IOSTAT_DEVICE_TYPE, "-x", "-I"],
            IOSTAT_OUTPUT,
        );
        runner.add_output(
            &["sysctl", "-q", "kstat.zfs.misc.arcstats"],
            ARCSTATS_OUTPUT,
        );
        runner
    }

    /// A host without ZFS: every command fails as if the binaries were missing.
    pub fn bare_host() -> Self {
        Self::new()
    }
}
