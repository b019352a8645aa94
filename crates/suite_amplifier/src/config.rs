use std::path::PathBuf;

use clap::Args;

use crate::emission::{OutputLayout, TEST_FOLDER_PATH};
use crate::error::{AmplifierError, Result};
use crate::manifest::{InstrumentationManifest, ProcessingCap};
use crate::util::ensure_exists;

pub const DEFAULT_DUPLICATES: u32 = 10;
pub const SUMMARY_FILE_NAME: &str = "suite_amplifier_summary.json";

/// Options shared by every instrumentation run.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Project whose test sources are read.
    #[arg(long = "project-dir")]
    pub project_dir: PathBuf,

    /// Test sources relative to the project (default: src/test/java).
    #[arg(long = "source-folder")]
    pub source_folder: Option<PathBuf>,

    /// Manifest JSON: {"group": ["pkg.Type#method", ...]}.
    #[arg(long)]
    pub manifest: PathBuf,

    /// Where generated sources go (default: the project directory).
    #[arg(long = "output-root")]
    pub output_root: Option<PathBuf>,

    /// Test folder below the output root (default: src/test/java).
    #[arg(long = "test-folder")]
    pub test_folder: Option<PathBuf>,

    /// Maximum number of tests to materialize; negative means no limit.
    #[arg(long = "max-tests", default_value_t = -1, allow_negative_numbers = true)]
    pub max_tests: i64,

    /// Run summary path (default: <output-root>/suite_amplifier_summary.json).
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

/// Resolved inputs of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_root: PathBuf,
    pub layout: OutputLayout,
    pub manifest_path: PathBuf,
    pub manifest: InstrumentationManifest,
    pub cap: ProcessingCap,
    pub summary_path: PathBuf,
}

impl RunConfig {
    pub fn from_common(args: &CommonArgs) -> Result<Self> {
        ensure_exists(&args.project_dir)?;
        let source_root = args
            .project_dir
            .join(args.source_folder.clone().unwrap_or_else(|| PathBuf::from(TEST_FOLDER_PATH)));
        ensure_exists(&source_root)?;

        let manifest = InstrumentationManifest::from_path(&args.manifest)?;
        if manifest.is_empty() {
            return Err(AmplifierError::invalid(format!(
                "manifest {} lists no tests",
                args.manifest.display()
            )));
        }

        let root = args.output_root.clone().unwrap_or_else(|| args.project_dir.clone());
        let mut layout = OutputLayout::new(&root);
        if let Some(test_folder) = &args.test_folder {
            layout.test_folder = test_folder.clone();
        }
        let summary_path = args.summary.clone().unwrap_or_else(|| root.join(SUMMARY_FILE_NAME));

        Ok(Self {
            source_root,
            layout,
            manifest_path: args.manifest.clone(),
            manifest,
            cap: ProcessingCap::from_raw(args.max_tests),
            summary_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::util::write_string;

    fn args(project_dir: PathBuf, manifest: PathBuf) -> CommonArgs {
        CommonArgs {
            project_dir,
            source_folder: None,
            manifest,
            output_root: None,
            test_folder: None,
            max_tests: -1,
            summary: None,
        }
    }

    #[test]
    fn defaults_point_at_maven_test_layout() {
        let temp = tempdir().expect("tempdir");
        let project = temp.path().join("project");
        std::fs::create_dir_all(project.join("src/test/java")).expect("mkdir");
        let manifest = temp.path().join("manifest.json");
        write_string(&manifest, r#"{"p.T": ["testX"]}"#).expect("manifest");

        let config = RunConfig::from_common(&args(project.clone(), manifest)).expect("config");
        assert_eq!(config.source_root, project.join("src/test/java"));
        assert_eq!(config.layout.root, project);
        assert_eq!(config.cap, ProcessingCap::Unbounded);
        assert_eq!(config.summary_path, project.join(SUMMARY_FILE_NAME));
    }

    #[test]
    fn missing_project_is_reported() {
        let temp = tempdir().expect("tempdir");
        let error = RunConfig::from_common(&args(temp.path().join("nope"), temp.path().join("m.json")))
            .expect_err("missing project");
        assert!(matches!(error, AmplifierError::MissingPath { .. }));
    }

    #[test]
    fn empty_manifest_is_rejected() {
        let temp = tempdir().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("src/test/java")).expect("mkdir");
        let manifest = temp.path().join("manifest.json");
        write_string(&manifest, "{}").expect("manifest");
        let error = RunConfig::from_common(&args(temp.path().to_path_buf(), manifest)).expect_err("empty");
        assert_eq!(error.exit_code(), 2);
    }
}
