// SPDX-License-Identifier: Apache-2.0
//! Test-framework dialects.
//!
//! [`Dialect::ALL`] is the probe order used by [`Dialect::detect`]. JUnit 5 is
//! probed first because a Jupiter suite may still carry JUnit 4 imports through
//! the vintage engine; JUnit 3 goes last because its naming convention is the
//! weakest signal. Candidates no dialect recognises fall back to JUnit 4.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::source_model::{Candidate, Member, MethodDecl, MethodId, SourceModel, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    JUnit5,
    JUnit4,
    JUnit3,
}

/// Fixture role of a lifecycle member; declaration order is relocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleRole {
    SetupAll,
    SetupEach,
    TeardownEach,
    TeardownAll,
}

const JUPITER_TEST_ANNOTATIONS: [&str; 5] = [
    "Test",
    "ParameterizedTest",
    "RepeatedTest",
    "TestFactory",
    "TestTemplate",
];

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::JUnit5, Dialect::JUnit4, Dialect::JUnit3];
    pub const FALLBACK: Dialect = Dialect::JUnit4;

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::JUnit5 => "junit5",
            Self::JUnit4 => "junit4",
            Self::JUnit3 => "junit3",
        }
    }

    #[must_use]
    pub fn failure_statement(self) -> &'static str {
        match self {
            Self::JUnit5 => "org.junit.jupiter.api.Assertions.fail();",
            Self::JUnit4 => "org.junit.Assert.fail();",
            Self::JUnit3 => "junit.framework.TestCase.fail();",
        }
    }

    #[must_use]
    pub fn lifecycle_names(self) -> [&'static str; 4] {
        match self {
            Self::JUnit5 => ["@BeforeAll", "@BeforeEach", "@AfterEach", "@AfterAll"],
            Self::JUnit4 => ["@BeforeClass", "@Before", "@After", "@AfterClass"],
            Self::JUnit3 => ["-", "setUp()", "tearDown()", "-"],
        }
    }

    /// First dialect in probe order that recognises the candidate as a test.
    #[must_use]
    pub fn detect(model: &SourceModel, candidate: &Candidate) -> Dialect {
        Self::ALL
            .into_iter()
            .find(|dialect| dialect.is_test(model, candidate.method))
            .unwrap_or(Self::FALLBACK)
    }

    #[must_use]
    pub fn is_test(self, model: &SourceModel, method: MethodId) -> bool {
        let decl = model.method(method);
        match self {
            Self::JUnit5 => decl.annotation_names().any(|annotation| {
                annotation
                    .strip_prefix("org.junit.jupiter.")
                    .is_some_and(|rest| JUPITER_TEST_ANNOTATIONS.contains(&simple_name(rest)))
                    || (JUPITER_TEST_ANNOTATIONS.contains(&annotation)
                        && imports_jupiter(model, decl.owner, annotation))
            }),
            Self::JUnit4 => decl.annotation_names().any(|annotation| {
                annotation == "org.junit.Test"
                    || (annotation == "Test"
                        && model.type_decl(decl.owner).imports.iter().any(|import| {
                            !import.is_static && (import.path == "org.junit.Test" || import.path == "org.junit.*")
                        }))
            }),
            Self::JUnit3 => {
                extends_test_case(model, decl.owner)
                    && decl.has_modifier("public")
                    && !decl.has_modifier("static")
                    && decl.returns_void()
                    && decl.name.starts_with("test")
                    && decl.params.is_blank()
            }
        }
    }

    #[must_use]
    pub fn lifecycle_role(self, method: &MethodDecl) -> Option<LifecycleRole> {
        match self {
            Self::JUnit5 | Self::JUnit4 => {
                let [setup_all, setup_each, teardown_each, teardown_all] = self.lifecycle_names();
                let roles = [
                    (setup_all, LifecycleRole::SetupAll),
                    (setup_each, LifecycleRole::SetupEach),
                    (teardown_each, LifecycleRole::TeardownEach),
                    (teardown_all, LifecycleRole::TeardownAll),
                ];
                method.annotation_names().find_map(|annotation| {
                    roles.iter().find_map(|(name, role)| {
                        let expected = &name[1..];
                        (annotation == expected || annotation.ends_with(&format!(".{expected}")))
                            .then_some(*role)
                    })
                })
            }
            Self::JUnit3 if method.params.is_blank() && !method.has_modifier("static") => {
                match method.name.as_str() {
                    "setUp" => Some(LifecycleRole::SetupEach),
                    "tearDown" => Some(LifecycleRole::TeardownEach),
                    _ => None,
                }
            }
            Self::JUnit3 => None,
        }
    }

    /// Whether an isolated type holding `kept` keeps `method`. Only other tests
    /// of this dialect are stripped.
    #[must_use]
    pub fn retains(self, model: &SourceModel, method: MethodId, kept: MethodId) -> bool {
        method == kept || !self.is_test(model, method)
    }

    /// Move lifecycle members to the head of `isolated`, in [`LifecycleRole`]
    /// order. Returns the number of relocated members.
    pub fn relocate_lifecycle(self, model: &mut SourceModel, isolated: TypeId) -> usize {
        let members = std::mem::take(&mut model.type_mut(isolated).members);
        let mut lifecycle: Vec<(LifecycleRole, Member)> = Vec::new();
        let mut rest = Vec::with_capacity(members.len());
        for member in members {
            let role = match &member {
                Member::Method(id) => self.lifecycle_role(model.method(*id)),
                _ => None,
            };
            match role {
                Some(role) => lifecycle.push((role, member)),
                None => rest.push(member),
            }
        }
        lifecycle.sort_by_key(|(role, _)| *role);
        let relocated = lifecycle.len();
        let decl = model.type_mut(isolated);
        decl.members = lifecycle.into_iter().map(|(_, member)| member).collect();
        decl.members.extend(rest);
        relocated
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn simple_name(dotted: &str) -> &str {
    dotted.rsplit('.').next().unwrap_or(dotted)
}

fn imports_jupiter(model: &SourceModel, owner: TypeId, annotation: &str) -> bool {
    model.type_decl(owner).imports.iter().any(|import| {
        !import.is_static
            && import.path.starts_with("org.junit.jupiter.")
            && (import.path.ends_with(".*") || simple_name(&import.path) == annotation)
    })
}

fn extends_test_case(model: &SourceModel, owner: TypeId) -> bool {
    std::iter::once(owner)
        .chain(model.ancestors(owner))
        .filter_map(|ty| model.type_decl(ty).extends.as_ref())
        .any(|extends| {
            let rendered = model.render_code(extends);
            matches!(rendered.trim(), "TestCase" | "junit.framework.TestCase")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java_parser::model_from_sources;

    fn candidate(model: &SourceModel, type_name: &str, method: &str) -> Candidate {
        let owner = model.find_type(type_name).expect("type");
        Candidate {
            owner,
            method: model.lookup_method(owner, method).expect("method"),
        }
    }

    const JUPITER: &str = "package p;\nimport org.junit.jupiter.api.*;\nclass J5 {\n    @BeforeEach\n    void init() {}\n    @Test\n    void testA() {}\n    @ParameterizedTest\n    void testB(int x) {}\n    void helper() {}\n    @AfterAll\n    static void done() {}\n}\n";
    const VINTAGE: &str = "package p;\nimport org.junit.Test;\nimport org.junit.Before;\nclass J4 {\n    @Test\n    public void testA() {}\n    @Before\n    public void init() {}\n}\n";
    const LEGACY: &str = "package p;\nimport junit.framework.TestCase;\npublic class J3 extends TestCase {\n    public void testA() {}\n    public void testWith(int x) {}\n    protected void setUp() {}\n}\n";

    #[test]
    fn detection_follows_probe_order() {
        let model = model_from_sources(&[("J5.java", JUPITER), ("J4.java", VINTAGE), ("J3.java", LEGACY)])
            .expect("model");
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.J5", "testA")), Dialect::JUnit5);
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.J5", "testB")), Dialect::JUnit5);
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.J4", "testA")), Dialect::JUnit4);
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.J3", "testA")), Dialect::JUnit3);
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.J3", "testWith")), Dialect::FALLBACK);
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.J5", "helper")), Dialect::FALLBACK);
    }

    #[test]
    fn fully_qualified_annotations_need_no_import() {
        let src = "package p;\nclass Q {\n    @org.junit.jupiter.api.Test\n    void a() {}\n    @org.junit.Test\n    public void b() {}\n}\n";
        let model = model_from_sources(&[("Q.java", src)]).expect("model");
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.Q", "a")), Dialect::JUnit5);
        assert_eq!(Dialect::detect(&model, &candidate(&model, "p.Q", "b")), Dialect::JUnit4);
    }

    #[test]
    fn relocation_orders_lifecycle_members_first() {
        let mut model = model_from_sources(&[("J5.java", JUPITER)]).expect("model");
        let owner = model.find_type("p.J5").expect("type");
        let relocated = Dialect::JUnit5.relocate_lifecycle(&mut model, owner);
        assert_eq!(relocated, 2);
        let names: Vec<String> = model
            .type_decl(owner)
            .methods()
            .map(|id| model.method(id).name.clone())
            .collect();
        assert_eq!(names, vec!["init", "done", "testA", "testB", "helper"]);
    }

    #[test]
    fn junit3_lifecycle_is_named_by_convention() {
        let model = model_from_sources(&[("J3.java", LEGACY)]).expect("model");
        let setup = candidate(&model, "p.J3", "setUp");
        assert_eq!(
            Dialect::JUnit3.lifecycle_role(model.method(setup.method)),
            Some(LifecycleRole::SetupEach)
        );
        assert!(!Dialect::JUnit3.is_test(&model, setup.method));
    }

    #[test]
    fn retention_strips_only_sibling_tests() {
        let model = model_from_sources(&[("J5.java", JUPITER)]).expect("model");
        let kept = candidate(&model, "p.J5", "testA").method;
        let sibling = candidate(&model, "p.J5", "testB").method;
        let helper = candidate(&model, "p.J5", "helper").method;
        assert!(Dialect::JUnit5.retains(&model, kept, kept));
        assert!(!Dialect::JUnit5.retains(&model, sibling, kept));
        assert!(Dialect::JUnit5.retains(&model, helper, kept));
    }
}
