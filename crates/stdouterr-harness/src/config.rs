//! Harness configuration.
//!
//! Read from the environment, overridable from the command line:
//! - `STDOUTERR_BIN`: path to the `stdouterr` binary under test.
//! - `STDOUTERR_CHECK`: which checks to run.
//!   - `model` (default): compare scenarios against the buffering model only.
//!     Needs no binary.
//!   - `process`: spawn the binary with real pipes and compare what each
//!     destination received.
//!   - `both`: run both checks for every scenario.
//! - `STDOUTERR_WORKDIR`: scratch directory for file redirections
//!   (default `target/stdouterr-harness`).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

pub const BIN_ENV: &str = "STDOUTERR_BIN";
pub const CHECK_ENV: &str = "STDOUTERR_CHECK";
pub const WORKDIR_ENV: &str = "STDOUTERR_WORKDIR";
pub const DEFAULT_WORKDIR: &str = "target/stdouterr-harness";

/// Which side of a scenario gets verified.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    #[default]
    Model,
    Process,
    Both,
}

impl CheckMode {
    /// Parse from string (case-insensitive). Unknown values select `Model`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" | "proc" | "exec" | "binary" => Self::Process,
            "both" | "all" | "full" => Self::Both,
            _ => Self::Model,
        }
    }

    #[must_use]
    pub const fn includes_model(self) -> bool {
        matches!(self, Self::Model | Self::Both)
    }

    #[must_use]
    pub const fn includes_process(self) -> bool {
        matches!(self, Self::Process | Self::Both)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Process => "process",
            Self::Both => "both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub binary: Option<PathBuf>,
    pub check: CheckMode,
    pub workdir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            binary: None,
            check: CheckMode::default(),
            workdir: PathBuf::from(DEFAULT_WORKDIR),
        }
    }
}

impl HarnessConfig {
    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            binary: non_empty(BIN_ENV).map(PathBuf::from),
            check: non_empty(CHECK_ENV)
                .map(|v| CheckMode::from_str_loose(&v))
                .unwrap_or_default(),
            workdir: non_empty(WORKDIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKDIR)),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply command-line values on top of this config.
    #[must_use]
    pub fn with_overrides(
        mut self,
        binary: Option<PathBuf>,
        check: Option<&str>,
        workdir: Option<PathBuf>,
    ) -> Self {
        if let Some(binary) = binary {
            self.binary = Some(binary);
        }
        if let Some(check) = check {
            self.check = CheckMode::from_str_loose(check);
        }
        if let Some(workdir) = workdir {
            self.workdir = workdir;
        }
        self
    }

    /// The configured binary, which must exist on disk.
    pub fn require_binary(&self) -> Result<&Path, HarnessError> {
        existing_binary(self.binary.as_deref())
    }
}

/// Check that a binary path was given and points at a file.
pub fn existing_binary(binary: Option<&Path>) -> Result<&Path, HarnessError> {
    let binary = binary.ok_or(HarnessError::BinaryNotConfigured)?;
    if !binary.is_file() {
        return Err(HarnessError::MissingBinary(binary.to_path_buf()));
    }
    Ok(binary)
}

static GLOBAL_CONFIG: OnceLock<HarnessConfig> = OnceLock::new();

/// Process-wide config (reads the environment on first call, caches thereafter).
#[must_use]
pub fn harness_config() -> &'static HarnessConfig {
    GLOBAL_CONFIG.get_or_init(HarnessConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn parse_check_modes() {
        assert_eq!(CheckMode::from_str_loose("model"), CheckMode::Model);
        assert_eq!(CheckMode::from_str_loose("PROCESS"), CheckMode::Process);
        assert_eq!(CheckMode::from_str_loose("exec"), CheckMode::Process);
        assert_eq!(CheckMode::from_str_loose(" both "), CheckMode::Both);
        assert_eq!(CheckMode::from_str_loose("bogus"), CheckMode::Model);
    }

    #[test]
    fn check_mode_coverage() {
        assert!(CheckMode::Model.includes_model());
        assert!(!CheckMode::Model.includes_process());
        assert!(CheckMode::Process.includes_process());
        assert!(!CheckMode::Process.includes_model());
        assert!(CheckMode::Both.includes_model() && CheckMode::Both.includes_process());
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[]));
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.workdir, PathBuf::from(DEFAULT_WORKDIR));
    }

    #[test]
    fn environment_values_are_read() {
        let config = HarnessConfig::from_lookup(lookup(&[
            (BIN_ENV, "/opt/stdouterr"),
            (CHECK_ENV, "both"),
            (WORKDIR_ENV, "/tmp/scratch"),
        ]));
        assert_eq!(config.binary, Some(PathBuf::from("/opt/stdouterr")));
        assert_eq!(config.check, CheckMode::Both);
        assert_eq!(config.workdir, PathBuf::from("/tmp/scratch"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = HarnessConfig::from_lookup(lookup(&[(BIN_ENV, "  ")]));
        assert_eq!(config.binary, None);
    }

    #[test]
    fn overrides_win() {
        let config = HarnessConfig::from_lookup(lookup(&[(CHECK_ENV, "process")]))
            .with_overrides(Some(PathBuf::from("bin")), Some("model"), None);
        assert_eq!(config.binary, Some(PathBuf::from("bin")));
        assert_eq!(config.check, CheckMode::Model);
        assert_eq!(config.workdir, PathBuf::from(DEFAULT_WORKDIR));
    }

    #[test]
    fn require_binary_reports_missing() {
        let config = HarnessConfig::default();
        assert!(matches!(
            config.require_binary(),
            Err(HarnessError::BinaryNotConfigured)
        ));
        let config = config.with_overrides(Some(PathBuf::from("/nonexistent/stdouterr")), None, None);
        assert!(matches!(
            config.require_binary(),
            Err(HarnessError::MissingBinary(_))
        ));
    }
}
