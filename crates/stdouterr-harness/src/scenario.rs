//! Redirection scenario fixtures.
//!
//! A scenario names a redirection list applied to `stdouterr | ts` and the
//! lines each visible destination is expected to receive, in the order the
//! buffering model delivers them.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use stdouterr_core::{Redirection, RedirectError, parse_redirections};

use crate::error::HarnessError;

pub const SCENARIO_SET_VERSION: &str = "v1";

/// A single redirection scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Case identifier.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Redirections as typed after the command, e.g. `2>&1 >/dev/null`.
    pub redirections: String,
    /// Lines that reach the pipe into the downstream filter.
    pub expected_pipe: Vec<String>,
    /// Lines that reach the terminal directly.
    pub expected_terminal: Vec<String>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        redirections: impl Into<String>,
        expected_pipe: &[&str],
        expected_terminal: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            redirections: redirections.into(),
            expected_pipe: expected_pipe.iter().map(|s| (*s).to_string()).collect(),
            expected_terminal: expected_terminal.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub fn parse(&self) -> Result<Vec<Redirection>, RedirectError> {
        parse_redirections(&self.redirections)
    }

    /// Scenario names double as scratch subdirectory names, so each must be
    /// exactly one normal path component.
    pub fn has_valid_name(&self) -> bool {
        let mut components = Path::new(&self.name).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(part)), None) if part == self.name.as_str()
        )
    }

    /// The command line this scenario stands for.
    pub fn command_line(&self) -> String {
        if self.redirections.trim().is_empty() {
            String::from("stdouterr | ts")
        } else {
            format!("stdouterr {} | ts", self.redirections.trim())
        }
    }
}

/// A collection of scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSet {
    /// Schema version.
    pub version: String,
    pub title: String,
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load and validate one set.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        let set = Self::from_json(&content)?;
        set.validate()?;
        Ok(set)
    }

    /// Reject scenario names that could not serve as a scratch subdirectory.
    pub fn validate(&self) -> Result<(), HarnessError> {
        match self.scenarios.iter().find(|s| !s.has_valid_name()) {
            Some(bad) => Err(HarnessError::InvalidScenarioName(bad.name.clone())),
            None => Ok(()),
        }
    }

    /// Load every `*.json` set in `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Vec<Self>, HarnessError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();
        paths.iter().map(|path| Self::from_file(path)).collect()
    }

    pub fn find(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// The documented redirection cases plus a few neighbours.
    pub fn builtin() -> Self {
        Self {
            version: SCENARIO_SET_VERSION.to_string(),
            title: String::from("Redirection order"),
            scenarios: vec![
                Scenario::new(
                    "no-redirect",
                    "stdout is a pipe and fully buffered; stderr reaches the terminal first",
                    "",
                    &["stdout"],
                    &["stderr"],
                ),
                Scenario::new(
                    "stdout-null-then-dup",
                    "fd 1 goes to /dev/null first, then fd 2 copies it",
                    ">/dev/null 2>&1",
                    &[],
                    &[],
                ),
                Scenario::new(
                    "dup-then-stdout-null",
                    "fd 2 copies the pipe first, then fd 1 goes to /dev/null",
                    "2>&1 >/dev/null",
                    &["stderr"],
                    &[],
                ),
                Scenario::new(
                    "stderr-null",
                    "only stderr is discarded",
                    "2>/dev/null",
                    &["stdout"],
                    &[],
                ),
                Scenario::new(
                    "merge-into-pipe",
                    "both streams share the pipe; unbuffered stderr arrives first",
                    "2>&1",
                    &["stderr", "stdout"],
                    &[],
                ),
                Scenario::new(
                    "swap-streams",
                    "stdout and stderr trade places through fd 3",
                    "3>&1 1>&2 2>&3 3>&-",
                    &["stderr"],
                    &["stdout"],
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scenarios_parse() {
        let set = ScenarioSet::builtin();
        assert_eq!(set.version, SCENARIO_SET_VERSION);
        for scenario in &set.scenarios {
            assert!(scenario.parse().is_ok(), "{} should parse", scenario.name);
        }
    }

    #[test]
    fn builtin_names_are_unique() {
        let set = ScenarioSet::builtin();
        let mut names: Vec<_> = set.scenarios.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), set.scenarios.len());
    }

    #[test]
    fn json_round_trip_preserves_scenarios() {
        let set = ScenarioSet::builtin();
        let restored = ScenarioSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn description_is_optional() {
        let set = ScenarioSet::from_json(
            r#"{
                "version":"v1",
                "title":"minimal",
                "scenarios":[
                    {"name":"plain","redirections":"","expected_pipe":["stdout"],"expected_terminal":["stderr"]}
                ]
            }"#,
        )
        .expect("valid scenario json");
        assert_eq!(set.find("plain").unwrap().description, "");
        assert!(set.find("missing").is_none());
    }

    #[test]
    fn names_must_be_one_plain_component() {
        for bad in ["", ".", "..", "../x", "/tmp/x", "a/b", "x/"] {
            let set = ScenarioSet {
                version: String::from("v1"),
                title: String::from("bad"),
                scenarios: vec![Scenario::new(bad, "", "", &[], &[])],
            };
            assert!(
                matches!(set.validate(), Err(HarnessError::InvalidScenarioName(name)) if name == bad),
                "{bad:?} should be rejected"
            );
        }
        assert!(ScenarioSet::builtin().validate().is_ok());
    }

    #[test]
    fn from_file_rejects_escaping_names() {
        let path = std::env::temp_dir().join(format!("stdouterr-scenario-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"version":"v1","title":"t","scenarios":[
                {"name":"../up","redirections":"","expected_pipe":[],"expected_terminal":[]}
            ]}"#,
        )
        .unwrap();
        let err = ScenarioSet::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, HarnessError::InvalidScenarioName(_)));
    }

    #[test]
    fn command_line_rendering() {
        let set = ScenarioSet::builtin();
        assert_eq!(
            set.find("no-redirect").unwrap().command_line(),
            "stdouterr | ts"
        );
        assert_eq!(
            set.find("dup-then-stdout-null").unwrap().command_line(),
            "stdouterr 2>&1 >/dev/null | ts"
        );
    }
}
