//! Mock command runner for testing sources without the real storage utilities.
//!
//! Provides:
//! - `MockRunner` - in-memory argv → output table
//! - Scenarios - pre-built fixtures for common host states

mod runner;
mod scenarios;

pub use runner::MockRunner;
