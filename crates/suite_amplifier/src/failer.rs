//! Failure-injection variant: each admitted test is isolated like in the
//! duplication pipeline, gets one dialect failure statement appended, and all
//! mutated types are written together when the run ends.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use clap::Args;

use crate::config::{CommonArgs, RunConfig};
use crate::emission::{OutputLayout, emit_structural};
use crate::error::Result;
use crate::java_parser::parse_directory;
use crate::manifest::{DuplicationBudget, InstrumentationManifest, ProcessingCap};
use crate::pipeline::{IsolatedTest, ProcessedTest, RunContext, TestProcessor, drive, isolate, isolated_name};
use crate::runmeta::RunSummary;
use crate::scheduler::{Worklist, sort};
use crate::source_model::{Candidate, SourceModel, qualify};
use crate::util::{now_utc_iso, to_full_qualified_name};

#[derive(Debug, Clone)]
pub struct FailureInjector {
    worklist: Worklist,
    context: RunContext,
    /// Isolated qualified name → (originating test, isolated type).
    mutated: BTreeMap<String, (String, IsolatedTest)>,
    emitted: Vec<ProcessedTest>,
}

impl FailureInjector {
    #[must_use]
    pub fn new(worklist: Worklist, context: RunContext) -> Self {
        Self {
            worklist,
            context,
            mutated: BTreeMap::new(),
            emitted: Vec::new(),
        }
    }

    pub fn from_inputs(manifest: &InstrumentationManifest, cap: ProcessingCap, layout: OutputLayout) -> Result<Self> {
        let worklist = sort(cap, &DuplicationBudget::uniform(0), manifest)?;
        tracing::info!(scheduled = worklist.len(), %cap, "worklist ready");
        Ok(Self::new(worklist, RunContext::new(layout, cap)))
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.mutated.len()
    }

    /// Types written by [`TestProcessor::processing_done`].
    #[must_use]
    pub fn emitted(&self) -> &[ProcessedTest] {
        &self.emitted
    }
}

impl TestProcessor for FailureInjector {
    fn worklist(&self) -> &Worklist {
        &self.worklist
    }

    fn process(&mut self, model: &mut SourceModel, candidate: &Candidate) -> Result<()> {
        let test = to_full_qualified_name(
            &model.qualified_name(candidate.owner),
            &model.method(candidate.method).name,
        );
        let target = qualify(&model.type_decl(candidate.owner).package, &isolated_name(model, candidate));
        if self.mutated.contains_key(&target) {
            tracing::debug!(test = test.as_str(), "already mutated");
            return Ok(());
        }
        if !self.context.allows_next() {
            tracing::debug!(test = test.as_str(), cap = %self.context.cap(), "cap reached, skipping");
            return Ok(());
        }

        let start = Instant::now();
        let isolated = isolate(model, candidate)?;
        let statement = isolated.dialect.failure_statement();
        if !model.method_mut(isolated.method).append_statement(statement) {
            tracing::debug!(test = test.as_str(), "test has no body to fail");
        }
        self.context.record(&test, start.elapsed().as_millis() as u64);
        self.mutated.insert(target, (test, isolated));
        Ok(())
    }

    fn processing_done(&mut self, model: &mut SourceModel) -> Result<()> {
        for (test, isolated) in std::mem::take(&mut self.mutated).into_values() {
            let start = Instant::now();
            let artifact = emit_structural(model, &self.context.layout, isolated.type_id)?;
            self.emitted.push(ProcessedTest {
                test,
                isolated_type: artifact.type_name,
                dialect: isolated.dialect,
                duplicates: None,
                path: artifact.path,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }
        tracing::info!(
            types = self.emitted.len(),
            root = %self.context.layout.root.display(),
            "failing test types written"
        );
        Ok(())
    }

    fn set_root_path_folder(&mut self, root: &Path) {
        self.context.layout.root = root.to_path_buf();
    }

    /// Start a new run. Mutations not yet written belong to the previous model and are dropped.
    fn reset_progress_counter(&mut self) {
        if !self.mutated.is_empty() {
            tracing::warn!(dropped = self.mutated.len(), "discarding unwritten failing types");
        }
        self.context.reset();
        self.mutated.clear();
        self.emitted.clear();
    }
}

#[derive(Debug, Clone, Args)]
pub struct FailArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run_fail(args: FailArgs) -> Result<()> {
    let started_at = now_utc_iso();
    let config = RunConfig::from_common(&args.common)?;
    let mut model = parse_directory(&config.source_root)?;
    let mut injector = FailureInjector::from_inputs(&config.manifest, config.cap, config.layout.clone())?;
    let outcome = drive(&mut injector, &mut model);

    RunSummary::finish("fail", started_at, &config, injector.emitted(), &outcome)
        .write_to_path(&config.summary_path)?;
    outcome
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::java_parser::model_from_sources;
    use crate::util::read_string;

    const SOURCE: &str = "package p;\nimport org.junit.Test;\npublic class T {\n    @Test\n    public void testA() {\n        int x = 1;\n    }\n    @Test\n    public void testB() {}\n}\n";

    fn injector(root: &Path, entries: &str, cap: ProcessingCap) -> FailureInjector {
        let manifest = InstrumentationManifest::from_json_str(entries).expect("manifest");
        FailureInjector::from_inputs(&manifest, cap, OutputLayout::new(root)).expect("injector")
    }

    #[test]
    fn nothing_is_written_before_processing_done() {
        let temp = tempdir().expect("tempdir");
        let mut model = model_from_sources(&[("T.java", SOURCE)]).expect("model");
        let mut failer = injector(temp.path(), r#"{"p.T": ["testA"]}"#, ProcessingCap::Unbounded);
        let owner = model.find_type("p.T").expect("T");
        let candidate = Candidate {
            owner,
            method: model.lookup_method(owner, "testA").expect("testA"),
        };
        failer.process(&mut model, &candidate).expect("process");
        failer.process(&mut model, &candidate).expect("repeat is ignored");
        assert_eq!(failer.pending(), 1);
        assert!(!temp.path().join("src").exists());

        failer.processing_done(&mut model).expect("done");
        let written = read_string(&failer.emitted()[0].path).expect("read");
        assert_eq!(written.matches("org.junit.Assert.fail();").count(), 1);
        assert!(written.contains("int x = 1;\n        org.junit.Assert.fail();\n    }"));
    }

    #[test]
    fn reset_starts_a_fresh_run_under_the_new_root() {
        let first = tempdir().expect("first");
        let second = tempdir().expect("second");
        let mut failer = injector(first.path(), r#"{"g": ["p.T#testA"]}"#, ProcessingCap::Bounded(1));
        let mut model = model_from_sources(&[("T.java", SOURCE)]).expect("model");
        drive(&mut failer, &mut model).expect("first run");
        assert_eq!(failer.emitted().len(), 1);

        failer.reset_progress_counter();
        failer.set_root_path_folder(second.path());
        assert!(failer.emitted().is_empty());

        let mut fresh = model_from_sources(&[("T.java", SOURCE)]).expect("fresh model");
        drive(&mut failer, &mut fresh).expect("second run");
        assert_eq!(failer.emitted().len(), 1);
        assert!(failer.emitted()[0].path.starts_with(second.path()));
        assert!(second.path().join("src/test/java/p/T_testA.java").exists());
    }

    #[test]
    fn drive_emits_each_admitted_test_once() {
        let temp = tempdir().expect("tempdir");
        let mut model = model_from_sources(&[("T.java", SOURCE)]).expect("model");
        let mut failer = injector(temp.path(), r#"{"g": ["p.T#testA", "p.T#testB"]}"#, ProcessingCap::Unbounded);
        drive(&mut failer, &mut model).expect("drive");
        let names: Vec<&str> = failer.emitted().iter().map(|t| t.isolated_type.as_str()).collect();
        assert_eq!(names, vec!["p.T_testA", "p.T_testB"]);
        let emitted_b = read_string(&temp.path().join("src/test/java/p/T_testB.java")).expect("read");
        assert!(!emitted_b.contains("testA"));
        assert!(emitted_b.contains("public void testB() {\n        org.junit.Assert.fail();\n    }"));
    }
}
