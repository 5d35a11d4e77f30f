use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Override token meaning "every attribute" in include mode and "no
/// attribute" in exclude mode
pub const ALL_TOKEN: &str = "all";

/// Whether the name lists select or reject attributes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Include,
    #[default]
    Exclude,
}

impl FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "include" => Ok(PolicyMode::Include),
            "exclude" => Ok(PolicyMode::Exclude),
            other => Err(format!("Invalid policy mode: '{}'", other)),
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Include => f.write_str("include"),
            PolicyMode::Exclude => f.write_str("exclude"),
        }
    }
}

/// Process-wide attribute forwarding policy
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub mode: PolicyMode,
    /// Names forwarded in include mode
    #[serde(default)]
    pub include: Vec<String>,
    /// Names withheld in exclude mode
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Attribute names an entity may forward, after merging its override list
#[derive(Clone, Debug, PartialEq)]
pub enum Selection<'a> {
    Everything,
    Nothing,
    Only(HashSet<&'a str>),
    AllExcept(HashSet<&'a str>),
}

impl Selection<'_> {
    pub fn admits(&self, name: &str) -> bool {
        match self {
            Selection::Everything => true,
            Selection::Nothing => false,
            Selection::Only(names) => names.contains(name),
            Selection::AllExcept(names) => !names.contains(name),
        }
    }
}

impl Policy {
    pub fn include(names: &[&str]) -> Self {
        Self {
            mode: PolicyMode::Include,
            include: names.iter().map(|n| n.to_string()).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn exclude(names: &[&str]) -> Self {
        Self {
            mode: PolicyMode::Exclude,
            include: Vec::new(),
            exclude: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Global list for the active mode
    pub fn active_list(&self) -> &[String] {
        match self.mode {
            PolicyMode::Include => &self.include,
            PolicyMode::Exclude => &self.exclude,
        }
    }

    /// Merge the global list with an entity's override list.
    ///
    /// `overrides` must be the list matching the active mode (the include
    /// override in include mode, the exclude override in exclude mode).
    pub fn selection<'a>(&'a self, overrides: &'a [String]) -> Selection<'a> {
        let names: HashSet<&str> = self
            .active_list()
            .iter()
            .chain(overrides.iter())
            .map(|s| s.as_str())
            .collect();

        match (self.mode, names.contains(ALL_TOKEN)) {
            (PolicyMode::Include, true) => Selection::Everything,
            (PolicyMode::Exclude, true) => Selection::Nothing,
            (PolicyMode::Include, false) => Selection::Only(names),
            (PolicyMode::Exclude, false) => Selection::AllExcept(names),
        }
    }
}
