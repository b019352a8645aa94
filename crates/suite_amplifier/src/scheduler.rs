//! Capped, budget-resolved worklist in manifest order.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Result;
use crate::manifest::{DuplicationBudget, InstrumentationManifest, ProcessingCap, TestIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub group: String,
    pub test: TestIdentifier,
    pub duplicates: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Worklist {
    pub items: Vec<WorkItem>,
    manifest: InstrumentationManifest,
}

impl Worklist {
    /// The manifest restricted to scheduled entries, used for admission.
    #[must_use]
    pub fn manifest(&self) -> &InstrumentationManifest {
        &self.manifest
    }

    #[must_use]
    pub fn position(&self, test: &TestIdentifier) -> Option<usize> {
        self.items.iter().position(|item| &item.test == test)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Deterministic worklist: manifest order, repeated identifiers dropped,
/// truncated to `cap`. Every scheduled entry must resolve in `budget`.
pub fn sort(cap: ProcessingCap, budget: &DuplicationBudget, manifest: &InstrumentationManifest) -> Result<Worklist> {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();
    for (group, test) in manifest.entries() {
        if !cap.allows(items.len()) {
            break;
        }
        if !seen.insert(test) {
            continue;
        }
        items.push(WorkItem {
            group: group.to_string(),
            test: test.clone(),
            duplicates: budget.resolve(&test.full_name())?,
        });
    }

    let mut groups: Vec<(String, Vec<TestIdentifier>)> = Vec::new();
    for item in &items {
        match groups.last_mut() {
            Some((group, tests)) if *group == item.group => tests.push(item.test.clone()),
            _ => groups.push((item.group.clone(), vec![item.test.clone()])),
        }
    }

    Ok(Worklist {
        items,
        manifest: InstrumentationManifest { groups },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmplifierError;

    fn manifest() -> InstrumentationManifest {
        InstrumentationManifest::from_json_str(
            r#"{"batch1": ["p.T#testA", "p.T#testB"], "batch2": ["p.U#testC", "p.T#testA"]}"#,
        )
        .expect("manifest")
    }

    #[test]
    fn preserves_manifest_order_and_drops_repeats() {
        let worklist = sort(ProcessingCap::Unbounded, &DuplicationBudget::uniform(3), &manifest()).expect("sort");
        let names: Vec<String> = worklist.items.iter().map(|item| item.test.to_string()).collect();
        assert_eq!(names, vec!["p.T#testA", "p.T#testB", "p.U#testC"]);
        assert!(worklist.items.iter().all(|item| item.duplicates == 3));
        assert_eq!(worklist.manifest().len(), 3);
    }

    #[test]
    fn truncates_to_cap() {
        let worklist = sort(ProcessingCap::Bounded(2), &DuplicationBudget::uniform(3), &manifest()).expect("sort");
        assert_eq!(worklist.len(), 2);
        assert_eq!(worklist.manifest().groups.len(), 1);
        assert!(worklist.position(&"p.U#testC".parse().expect("id")).is_none());
    }

    #[test]
    fn missing_budget_entry_is_fatal() {
        let budget = DuplicationBudget::from_json_str(r#"{"p.T#testA": 1, "p.T#testB": 2}"#, 10).expect("budget");
        let error = sort(ProcessingCap::Unbounded, &budget, &manifest()).expect_err("p.U#testC missing");
        assert!(matches!(error, AmplifierError::Configuration { test } if test == "p.U#testC"));

        let worklist = sort(ProcessingCap::Bounded(2), &budget, &manifest()).expect("capped before the gap");
        let counts: Vec<u32> = worklist.items.iter().map(|item| item.duplicates).collect();
        assert_eq!(counts, vec![1, 2]);
    }
}
