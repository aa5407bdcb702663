//! zpm-core - shared library for the zpm exporter.
//!
//! Provides:
//! - `metric` - uniform metric record model (families, samples, flat records)
//! - `collector` - command runner seam, ZFS/GEOM parsers, sources and the collector registry
//! - `ledger` - SQLite-backed last-run ledger for periodic jobs
//! - `exposition` - text exposition of a collection pass

pub mod collector;
pub mod exposition;
pub mod ledger;
pub mod metric;

/// Crate version, shared by the binaries for `--version` and startup logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
