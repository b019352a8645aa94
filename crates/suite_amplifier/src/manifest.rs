//! Run inputs: the instrumentation manifest, the duplication budget and the
//! processing cap.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AmplifierError, Result};
use crate::util::{read_string, to_full_qualified_name};

/// `pkg.Type#method`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestIdentifier {
    pub declaring_type: String,
    pub method: String,
}

impl TestIdentifier {
    #[must_use]
    pub fn new(declaring_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method: method.into(),
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        to_full_qualified_name(&self.declaring_type, &self.method)
    }
}

impl fmt::Display for TestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.declaring_type, self.method)
    }
}

impl FromStr for TestIdentifier {
    type Err = AmplifierError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().split_once('#') {
            Some((owner, method)) if !owner.is_empty() && !method.is_empty() && !method.contains('#') => {
                Ok(Self::new(owner, method))
            }
            _ => Err(AmplifierError::invalid(format!(
                "test identifier must look like pkg.Type#method, got {raw:?}"
            ))),
        }
    }
}

/// Group key → ordered test identifiers, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentationManifest {
    pub groups: Vec<(String, Vec<TestIdentifier>)>,
}

impl InstrumentationManifest {
    /// Reads `{"group": ["pkg.T#m", "m2"]}`. Entries without `#` name a method of
    /// the type given by the group key.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
        let mut groups = Vec::with_capacity(raw.len());
        for (group, tests) in raw {
            let entries: Vec<String> = serde_json::from_value(tests)?;
            let mut identifiers = Vec::with_capacity(entries.len());
            for entry in entries {
                let identifier = if entry.contains('#') {
                    entry.parse()?
                } else {
                    TestIdentifier::new(group.clone(), entry.trim())
                };
                identifiers.push(identifier);
            }
            groups.push((group, identifiers));
        }
        Ok(Self { groups })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_json_str(&read_string(path)?)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &TestIdentifier> {
        self.groups.iter().flat_map(|(_, tests)| tests.iter())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &TestIdentifier)> {
        self.groups
            .iter()
            .flat_map(|(group, tests)| tests.iter().map(move |test| (group.as_str(), test)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.identifiers().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-test duplicate counts keyed by `pkg.Type#method`, plus the global default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicationBudget {
    pub per_test: BTreeMap<String, u32>,
    pub default: u32,
}

impl DuplicationBudget {
    #[must_use]
    pub fn uniform(default: u32) -> Self {
        Self {
            per_test: BTreeMap::new(),
            default,
        }
    }

    pub fn from_json_str(content: &str, default: u32) -> Result<Self> {
        Ok(Self {
            per_test: serde_json::from_str(content)?,
            default,
        })
    }

    pub fn from_path(path: &Path, default: u32) -> Result<Self> {
        Self::from_json_str(&read_string(path)?, default)
    }

    /// Duplicate count for `full_name`. A non-empty map must name every admitted test.
    pub fn resolve(&self, full_name: &str) -> Result<u32> {
        if self.per_test.is_empty() {
            return Ok(self.default);
        }
        self.per_test
            .get(full_name)
            .copied()
            .ok_or_else(|| AmplifierError::Configuration {
                test: full_name.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingCap {
    #[default]
    Unbounded,
    Bounded(usize),
}

impl ProcessingCap {
    /// Negative values mean unbounded.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        usize::try_from(raw).map_or(Self::Unbounded, Self::Bounded)
    }

    #[must_use]
    pub fn allows(self, processed: usize) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded(cap) => processed < cap,
        }
    }

    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(cap) => Some(cap),
        }
    }
}

impl fmt::Display for ProcessingCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Bounded(cap) => write!(f, "{cap}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_parses_and_displays() {
        let id: TestIdentifier = "fr.example.CalcTest#testAdd".parse().expect("identifier");
        assert_eq!(id.declaring_type, "fr.example.CalcTest");
        assert_eq!(id.method, "testAdd");
        assert_eq!(id.to_string(), "fr.example.CalcTest#testAdd");
        assert!("CalcTest".parse::<TestIdentifier>().is_err());
        assert!("#testAdd".parse::<TestIdentifier>().is_err());
    }

    #[test]
    fn manifest_keeps_group_order_and_expands_bare_methods() {
        let manifest = InstrumentationManifest::from_json_str(
            r#"{"zeta": ["p.T#testB"], "p.U": ["testA", "p.V#testC"]}"#,
        )
        .expect("manifest");
        let groups: Vec<&str> = manifest.groups.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(groups, vec!["zeta", "p.U"]);
        let names: Vec<String> = manifest.identifiers().map(ToString::to_string).collect();
        assert_eq!(names, vec!["p.T#testB", "p.U#testA", "p.V#testC"]);
    }

    #[test]
    fn empty_budget_falls_back_to_default() {
        let budget = DuplicationBudget::uniform(10);
        assert_eq!(budget.resolve("p.T#testX").expect("default"), 10);
    }

    #[test]
    fn non_empty_budget_requires_an_entry() {
        let budget = DuplicationBudget::from_json_str(r#"{"p.T#testX": 0}"#, 10).expect("budget");
        assert_eq!(budget.resolve("p.T#testX").expect("entry"), 0);
        let error = budget.resolve("p.T#testY").expect_err("missing");
        assert!(matches!(error, AmplifierError::Configuration { test } if test == "p.T#testY"));
    }

    #[test]
    fn negative_budget_counts_are_rejected() {
        assert!(DuplicationBudget::from_json_str(r#"{"p.T#testX": -1}"#, 10).is_err());
    }

    #[test]
    fn cap_from_raw_treats_negative_as_unbounded() {
        assert_eq!(ProcessingCap::from_raw(-1), ProcessingCap::Unbounded);
        assert_eq!(ProcessingCap::from_raw(2), ProcessingCap::Bounded(2));
        assert!(ProcessingCap::Bounded(2).allows(1));
        assert!(!ProcessingCap::Bounded(2).allows(2));
        assert!(!ProcessingCap::Bounded(0).allows(0));
        assert!(ProcessingCap::Unbounded.allows(usize::MAX));
    }
}
