//! Metric collection pipeline.
//!
//! Sources run an external command (or query the job ledger), parse the output and turn it
//! into [`MetricFamily`](crate::metric::MetricFamily) values. The [`Collector`] registry
//! composes the configured sources and runs them in a fixed order on every scrape.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                             Collector                             │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌───────────┐ │
//! │  │ IostatSource │ │ ZpoolList    │ │ Arcstats     │ │ CronLedger│ │
//! │  │ iostat -x -I │ │ zpool list -p│ │ sysctl kstat │ │ Source    │ │
//! │  └──────┬───────┘ └──────┬───────┘ └──────┬───────┘ └─────┬─────┘ │
//! │         └────────────────┼────────────────┘               │       │
//! │                   ┌──────▼────────┐                ┌──────▼─────┐ │
//! │                   │ CommandRunner │ (trait)        │   Ledger   │ │
//! │                   └──────┬────────┘                │  (SQLite)  │ │
//! └──────────────────────────┼─────────────────────────┴────────────┴─┘
//!                ┌───────────┴───────────┐
//!         ┌──────▼──────┐         ┌──────▼──────┐
//!         │ SystemRunner│         │ MockRunner  │
//!         │ (processes) │         │ (Testing)   │
//!         └─────────────┘         └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use zpm_core::collector::{Collector, MockRunner, SourceConfig};
//!
//! let runner = MockRunner::freebsd_host();
//! let collector = Collector::new(runner, &SourceConfig::default());
//! let scrape = collector.collect().unwrap();
//! assert!(scrape.records().any(|r| r.name == "zpm_pool_online"));
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod cron;
pub mod mock;
mod source;
pub mod traits;
pub mod zfs;

pub use collector::{Collector, FailurePolicy, Scrape, SourceConfig};
pub use cron::CronLedgerSource;
pub use mock::MockRunner;
pub use source::{CollectError, Source};
pub use traits::{CommandError, CommandRunner, SystemRunner};
pub use zfs::{ArcstatsSource, IostatSource, ParseError, ZpoolListSource};
