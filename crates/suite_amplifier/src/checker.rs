//! Manifest admission, including tests a concrete type inherits from a listed ancestor.

use crate::manifest::{InstrumentationManifest, TestIdentifier};
use crate::source_model::{Candidate, SourceModel};

/// Some manifest entry names `method` on `declaring_type`.
#[must_use]
pub fn must_instrument(manifest: &InstrumentationManifest, declaring_type: &str, method: &str) -> bool {
    lookup(manifest, declaring_type, method).is_some()
}

/// The candidate's method name is listed for a proper ancestor of its owner,
/// whether the owner inherits it or overrides it.
#[must_use]
pub fn check_inheritance(manifest: &InstrumentationManifest, model: &SourceModel, candidate: &Candidate) -> bool {
    let name = &model.method(candidate.method).name;
    model
        .ancestors(candidate.owner)
        .into_iter()
        .any(|ancestor| must_instrument(manifest, &model.qualified_name(ancestor), name))
}

/// The manifest entry that admits `candidate`: a direct entry for the owner
/// first, then the nearest listed ancestor.
#[must_use]
pub fn admitting_entry<'a>(
    manifest: &'a InstrumentationManifest,
    model: &SourceModel,
    candidate: &Candidate,
) -> Option<&'a TestIdentifier> {
    let name = &model.method(candidate.method).name;
    std::iter::once(candidate.owner)
        .chain(model.ancestors(candidate.owner))
        .find_map(|ty| lookup(manifest, &model.qualified_name(ty), name))
}

fn lookup<'a>(manifest: &'a InstrumentationManifest, declaring_type: &str, method: &str) -> Option<&'a TestIdentifier> {
    manifest
        .identifiers()
        .find(|id| id.declaring_type == declaring_type && id.method == method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java_parser::model_from_sources;

    const BASE: &str = "package p;\nimport org.junit.Test;\npublic abstract class Base {\n    @Test\n    public void testShared() {}\n}\n";
    const SUB: &str = "package p;\npublic class Sub extends Base {\n    @org.junit.Test\n    public void testOwn() {}\n}\n";
    const OTHER: &str = "package q;\npublic class Other {\n    @org.junit.Test\n    public void testShared() {}\n}\n";

    fn manifest(entries: &[&str]) -> InstrumentationManifest {
        InstrumentationManifest {
            groups: vec![(
                "g".to_string(),
                entries.iter().map(|e| e.parse().expect("identifier")).collect(),
            )],
        }
    }

    fn candidate(model: &SourceModel, owner: &str, method: &str) -> Candidate {
        let owner = model.find_type(owner).expect("owner");
        Candidate {
            owner,
            method: model.lookup_method(owner, method).expect("method"),
        }
    }

    #[test]
    fn direct_entry_admits_only_its_owner() {
        let manifest = manifest(&["p.Sub#testOwn"]);
        assert!(must_instrument(&manifest, "p.Sub", "testOwn"));
        assert!(!must_instrument(&manifest, "p.Base", "testOwn"));
        assert!(!must_instrument(&manifest, "p.Sub", "testShared"));
    }

    #[test]
    fn inherited_test_is_admitted_through_listed_ancestor() {
        let model = model_from_sources(&[("Base.java", BASE), ("Sub.java", SUB), ("Other.java", OTHER)])
            .expect("model");
        let manifest = manifest(&["p.Base#testShared"]);
        let inherited = candidate(&model, "p.Sub", "testShared");
        assert!(inherited.is_inherited(&model));
        assert!(check_inheritance(&manifest, &model, &inherited));
        assert_eq!(
            admitting_entry(&manifest, &model, &inherited).map(ToString::to_string),
            Some("p.Base#testShared".to_string())
        );

        let unrelated = candidate(&model, "q.Other", "testShared");
        assert!(!check_inheritance(&manifest, &model, &unrelated));
        assert!(admitting_entry(&manifest, &model, &unrelated).is_none());
    }

    #[test]
    fn direct_entry_wins_over_ancestor_entry() {
        let model = model_from_sources(&[("Base.java", BASE), ("Sub.java", SUB)]).expect("model");
        let manifest = manifest(&["p.Base#testShared", "p.Sub#testShared"]);
        let inherited = candidate(&model, "p.Sub", "testShared");
        assert_eq!(
            admitting_entry(&manifest, &model, &inherited).map(ToString::to_string),
            Some("p.Sub#testShared".to_string())
        );
    }
}
