//! Sources backed by the ZFS and disk statistics utilities.
//!
//! Each source runs one command through a [`CommandRunner`](crate::collector::CommandRunner),
//! parses it with the functions in [`parser`] and maps the rows onto metric families.

pub mod arcstats;
pub mod iostat;
pub mod parser;
pub mod pool;

pub use arcstats::ArcstatsSource;
pub use iostat::IostatSource;
pub use parser::ParseError;
pub use pool::ZpoolListSource;

/// Default location of the `zpool` binary.
pub const DEFAULT_ZPOOL_PATH: &str = "/sbin/zpool";

/// Default device type filter passed to `iostat -t`.
pub const DEFAULT_IOSTAT_DEVICE_TYPE: &str = "da";

pub(crate) fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}
