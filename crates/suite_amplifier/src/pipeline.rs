// SPDX-License-Identifier: Apache-2.0
//! Instrumentation pipeline.
//!
//! Each admitted test goes through the same steps: detect its dialect, clone
//! the owner into `<Owner>_<test>`, strip sibling tests, relink the clone,
//! relocate lifecycle members, then emit. [`DuplicationPipeline`] emits the
//! structural copy followed by textual duplicates; the failure variant lives in
//! [`crate::failer`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::checker::{admitting_entry, check_inheritance, must_instrument};
use crate::config::{CommonArgs, DEFAULT_DUPLICATES, RunConfig};
use crate::dialect::Dialect;
use crate::emission::{OutputLayout, append_duplicates, emit_structural};
use crate::error::{AmplifierError, Result};
use crate::java_parser::parse_directory;
use crate::manifest::{DuplicationBudget, InstrumentationManifest, ProcessingCap};
use crate::relink::{localize_type_refs, relink};
use crate::runmeta::RunSummary;
use crate::scheduler::{Worklist, sort};
use crate::source_model::{Candidate, Import, Member, MethodId, SourceModel, TypeId};
use crate::util::{now_utc_iso, to_full_qualified_name};

// ── Processor contract ───────────────────────────────────────────────────

pub trait TestProcessor {
    fn worklist(&self) -> &Worklist;

    /// Listed directly, or inherited from a listed ancestor.
    fn is_to_be_processed(&self, model: &SourceModel, candidate: &Candidate) -> bool {
        let manifest = self.worklist().manifest();
        let owner = model.qualified_name(candidate.owner);
        must_instrument(manifest, &owner, &model.method(candidate.method).name)
            || check_inheritance(manifest, model, candidate)
    }

    /// Worklist position of the entry that admits `candidate`.
    fn admission_rank(&self, model: &SourceModel, candidate: &Candidate) -> Option<usize> {
        admitting_entry(self.worklist().manifest(), model, candidate).and_then(|entry| self.worklist().position(entry))
    }

    fn process(&mut self, model: &mut SourceModel, candidate: &Candidate) -> Result<()>;

    fn processing_done(&mut self, model: &mut SourceModel) -> Result<()>;

    fn set_root_path_folder(&mut self, root: &Path);

    fn reset_progress_counter(&mut self);
}

/// Run-scoped output layout, cap and progress counter.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub layout: OutputLayout,
    cap: ProcessingCap,
    processed: usize,
}

impl RunContext {
    #[must_use]
    pub fn new(layout: OutputLayout, cap: ProcessingCap) -> Self {
        Self {
            layout,
            cap,
            processed: 0,
        }
    }

    #[must_use]
    pub fn cap(&self) -> ProcessingCap {
        self.cap
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed
    }

    #[must_use]
    pub fn allows_next(&self) -> bool {
        self.cap.allows(self.processed)
    }

    /// Count one materialized test and log progress against the cap.
    pub fn record(&mut self, test: &str, elapsed_ms: u64) -> usize {
        self.processed += 1;
        match self.cap.limit() {
            Some(cap) => tracing::info!(
                test,
                processed = self.processed,
                cap,
                elapsed_ms,
                "{}/{} tests materialized",
                self.processed,
                cap
            ),
            None => tracing::info!(test, processed = self.processed, elapsed_ms, "test materialized"),
        }
        self.processed
    }

    pub fn reset(&mut self) {
        self.processed = 0;
    }
}

/// One materialized test, as recorded in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTest {
    pub test: String,
    pub isolated_type: String,
    pub dialect: Dialect,
    /// `None` for the failure variant.
    pub duplicates: Option<u32>,
    pub path: PathBuf,
    /// Time spent isolating and writing this test.
    #[serde(default)]
    pub elapsed_ms: u64,
}

// ── Isolation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolatedTest {
    pub type_id: TypeId,
    /// The retained test inside the isolated type.
    pub method: MethodId,
    pub dialect: Dialect,
}

/// `<Owner>_<test>` in the owner's package.
#[must_use]
pub fn isolated_name(model: &SourceModel, candidate: &Candidate) -> String {
    format!(
        "{}_{}",
        model.type_decl(candidate.owner).name,
        model.method(candidate.method).name
    )
}

/// Clone the candidate's owner into a standalone type holding only this test,
/// the members the dialect retains, and lifecycle members moved to the head.
pub fn isolate(model: &mut SourceModel, candidate: &Candidate) -> Result<IsolatedTest> {
    let dialect = Dialect::detect(model, candidate);
    let name = isolated_name(model, candidate);
    let (isolated, mut table) = model.clone_type(candidate.owner, &name)?;

    let kept = if candidate.is_inherited(model) {
        let declaring = model.method(candidate.method).owner;
        let inherited_imports: Vec<Import> = model.type_decl(declaring).imports.clone();
        let imports = &mut model.type_mut(isolated).imports;
        for import in inherited_imports {
            if !imports.contains(&import) {
                imports.push(import);
            }
        }
        let copied = model.clone_method_into(candidate.method, isolated, &mut table);
        localize_type_refs(model, isolated, copied);
        copied
    } else {
        table
            .method_target(candidate.method)
            .ok_or_else(|| AmplifierError::UnresolvedReference {
                type_name: model.qualified_name(isolated),
                reference: format!(
                    "{}#{}",
                    model.qualified_name(candidate.owner),
                    model.method(candidate.method).name
                ),
            })?
    };

    let members = std::mem::take(&mut model.type_mut(isolated).members);
    let (retained, stripped): (Vec<Member>, Vec<Member>) = members.into_iter().partition(|member| match member {
        Member::Method(id) => dialect.retains(model, *id, kept),
        _ => true,
    });
    model.type_mut(isolated).members = retained;

    let rewritten = relink(model, isolated, &table);
    let relocated = dialect.relocate_lifecycle(model, isolated);
    tracing::debug!(
        isolated = name.as_str(),
        dialect = dialect.name(),
        stripped = stripped.len(),
        rewritten,
        relocated,
        "isolated test type"
    );

    Ok(IsolatedTest {
        type_id: isolated,
        method: kept,
        dialect,
    })
}

// ── Duplication pipeline ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DuplicationPipeline {
    worklist: Worklist,
    budget: DuplicationBudget,
    context: RunContext,
    processed: Vec<ProcessedTest>,
}

impl DuplicationPipeline {
    #[must_use]
    pub fn new(worklist: Worklist, budget: DuplicationBudget, context: RunContext) -> Self {
        Self {
            worklist,
            budget,
            context,
            processed: Vec::new(),
        }
    }

    /// Schedule the manifest and build a pipeline writing below `root`.
    pub fn from_inputs(
        manifest: &InstrumentationManifest,
        budget: DuplicationBudget,
        cap: ProcessingCap,
        layout: OutputLayout,
    ) -> Result<Self> {
        let worklist = sort(cap, &budget, manifest)?;
        tracing::info!(scheduled = worklist.len(), %cap, "worklist ready");
        Ok(Self::new(worklist, budget, RunContext::new(layout, cap)))
    }

    #[must_use]
    pub fn processed(&self) -> &[ProcessedTest] {
        &self.processed
    }

    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.context
    }
}

impl TestProcessor for DuplicationPipeline {
    fn worklist(&self) -> &Worklist {
        &self.worklist
    }

    fn process(&mut self, model: &mut SourceModel, candidate: &Candidate) -> Result<()> {
        let test = to_full_qualified_name(
            &model.qualified_name(candidate.owner),
            &model.method(candidate.method).name,
        );
        if !self.context.allows_next() {
            tracing::debug!(test = test.as_str(), cap = %self.context.cap(), "cap reached, skipping");
            return Ok(());
        }
        let span = tracing::info_span!("amplify", test = test.as_str());
        let _guard = span.enter();
        let start = Instant::now();

        let duplicates = self.budget.resolve(&test)?;
        let isolated = isolate(model, candidate)?;
        let artifact = emit_structural(model, &self.context.layout, isolated.type_id)?;
        append_duplicates(model, &artifact, isolated.method, duplicates)?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.context.record(&test, elapsed_ms);
        self.processed.push(ProcessedTest {
            test,
            isolated_type: artifact.type_name,
            dialect: isolated.dialect,
            duplicates: Some(duplicates),
            path: artifact.path,
            elapsed_ms,
        });
        Ok(())
    }

    fn processing_done(&mut self, _model: &mut SourceModel) -> Result<()> {
        let duplicates: u64 = self
            .processed
            .iter()
            .filter_map(|test| test.duplicates)
            .map(u64::from)
            .sum();
        tracing::info!(
            tests = self.processed.len(),
            duplicates,
            root = %self.context.layout.root.display(),
            "duplication finished"
        );
        Ok(())
    }

    fn set_root_path_folder(&mut self, root: &Path) {
        self.context.layout.root = root.to_path_buf();
    }

    /// Start a new run: the counter and the processed records both go back to empty.
    fn reset_progress_counter(&mut self) {
        self.context.reset();
        self.processed.clear();
    }
}

// ── Driver ───────────────────────────────────────────────────────────────

/// Offer every candidate of the model to `processor`, in worklist order of the
/// entries that admit them, then close the run.
pub fn drive<P: TestProcessor + ?Sized>(processor: &mut P, model: &mut SourceModel) -> Result<()> {
    let mut admitted: Vec<(usize, Candidate)> = model
        .candidates()
        .into_iter()
        .filter(|candidate| processor.is_to_be_processed(model, candidate))
        .map(|candidate| {
            let rank = processor.admission_rank(model, &candidate).unwrap_or(usize::MAX);
            (rank, candidate)
        })
        .collect();
    admitted.sort_by_key(|(rank, _)| *rank);
    tracing::info!(admitted = admitted.len(), "candidates admitted");

    for (_, candidate) in &admitted {
        processor.process(model, candidate)?;
    }
    processor.processing_done(model)
}

// ── Command ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct AmplifyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Per-test duplicate counts: {"pkg.Type#method": n}. Every admitted test must be listed.
    #[arg(long)]
    pub budget: Option<PathBuf>,

    /// Duplicates per test when no budget file is given.
    #[arg(long, default_value_t = DEFAULT_DUPLICATES)]
    pub duplicates: u32,
}

pub fn run_amplify(args: AmplifyArgs) -> Result<()> {
    let started_at = now_utc_iso();
    let config = RunConfig::from_common(&args.common)?;
    let budget = match &args.budget {
        Some(path) => DuplicationBudget::from_path(path, args.duplicates)?,
        None => DuplicationBudget::uniform(args.duplicates),
    };

    let mut model = parse_directory(&config.source_root)?;
    let mut pipeline = DuplicationPipeline::from_inputs(&config.manifest, budget, config.cap, config.layout.clone())?;
    let outcome = drive(&mut pipeline, &mut model);

    RunSummary::finish("amplify", started_at, &config, pipeline.processed(), &outcome)
        .write_to_path(&config.summary_path)?;
    outcome
}
