use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::Result;
use crate::pipeline::ProcessedTest;
use crate::util::{now_utc_iso, read_string, write_string};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunSummary {
    pub status: String,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub source_root: String,
    pub output_root: String,
    pub manifest: String,
    pub cap: Option<usize>,
    pub tests: Vec<ProcessedTest>,
    pub error: Option<String>,
}

impl RunSummary {
    /// Summary of a finished (or aborted) run; tests emitted before an abort stay listed.
    #[must_use]
    pub fn finish(
        mode: &str,
        started_at: String,
        config: &RunConfig,
        tests: &[ProcessedTest],
        outcome: &Result<()>,
    ) -> Self {
        Self {
            status: if outcome.is_ok() { "ok" } else { "failed" }.to_string(),
            mode: mode.to_string(),
            started_at,
            finished_at: Some(now_utc_iso()),
            source_root: config.source_root.display().to_string(),
            output_root: config.layout.root.display().to_string(),
            manifest: config.manifest_path.display().to_string(),
            cap: config.cap.limit(),
            tests: tests.to_vec(),
            error: outcome.as_ref().err().map(ToString::to_string),
        }
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_string(path, &content)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = read_string(path)?;
        Ok(serde_json::from_str::<Self>(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::RunSummary;
    use crate::dialect::Dialect;
    use crate::pipeline::ProcessedTest;

    #[test]
    fn summary_round_trip_preserves_tests() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("summary.json");

        let original = RunSummary {
            status: "ok".to_string(),
            mode: "amplify".to_string(),
            started_at: "2026-02-17T00:00:00Z".to_string(),
            cap: Some(2),
            tests: vec![ProcessedTest {
                test: "p.T#testX".to_string(),
                isolated_type: "p.T_testX".to_string(),
                dialect: Dialect::JUnit5,
                duplicates: Some(3),
                path: PathBuf::from("/tmp/out/src/test/java/p/T_testX.java"),
                elapsed_ms: 12,
            }],
            ..RunSummary::default()
        };

        original.write_to_path(&path).expect("write summary");
        let decoded = RunSummary::from_path(&path).expect("read summary");
        assert_eq!(decoded.status, original.status);
        assert_eq!(decoded.cap, Some(2));
        assert_eq!(decoded.tests, original.tests);
        let raw = std::fs::read_to_string(&path).expect("raw");
        assert!(raw.contains("\"dialect\": \"junit5\""));
        assert!(raw.contains("\"elapsed_ms\": 12"));
    }

    #[test]
    fn sparse_summary_uses_defaults() {
        let decoded: RunSummary =
            serde_json::from_str(r#"{"status":"failed","error":"boom"}"#).expect("sparse");
        assert_eq!(decoded.status, "failed");
        assert_eq!(decoded.error.as_deref(), Some("boom"));
        assert!(decoded.tests.is_empty());
        assert!(decoded.finished_at.is_none());
    }
}
