//! Verification harness for the `stdouterr` redirection demo.
//!
//! This crate provides:
//! - Scenario fixtures: redirection lists with the lines each destination
//!   should receive
//! - Model checks: run scenarios through the buffering/redirection simulator
//! - Process checks: spawn the real binary with real pipes and files
//! - Stream checks: the binary's per-stream output contract
//! - Reports (markdown + JSON) and structured JSONL logs

#![forbid(unsafe_code)]

pub mod capture;
pub mod config;
pub mod diff;
pub mod error;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod streams;
pub mod structured_log;
pub mod verify;

pub use config::{CheckMode, HarnessConfig, harness_config};
pub use error::HarnessError;
pub use report::ScenarioReport;
pub use runner::ScenarioRunner;
pub use scenario::{Scenario, ScenarioSet};
pub use streams::check_streams;
pub use verify::{VerificationResult, VerificationSummary};
