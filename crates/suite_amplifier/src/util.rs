use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::error::{AmplifierError, Result};

#[must_use]
pub fn now_utc_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// `pkg.Type#method`, the key used by manifests and duplication budgets.
#[must_use]
pub fn to_full_qualified_name(type_name: &str, method_name: &str) -> String {
    format!("{type_name}#{method_name}")
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| AmplifierError::io_at(path, source))
}

pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AmplifierError::MissingPath {
            path: path.to_path_buf(),
        })
    }
}

pub fn write_string(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content).map_err(|source| AmplifierError::io_at(path, source))
}

pub fn read_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| AmplifierError::io_at(path, source))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{read_string, to_full_qualified_name, write_string};
    use crate::error::AmplifierError;

    #[test]
    fn full_qualified_name_joins_with_hash() {
        assert_eq!(
            to_full_qualified_name("fr.example.CalcTest", "testAdd"),
            "fr.example.CalcTest#testAdd"
        );
    }

    #[test]
    fn write_string_creates_missing_parents() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("a/b/c/Out.java");
        write_string(&path, "class Out {}\n").expect("write");
        assert_eq!(read_string(&path).expect("read"), "class Out {}\n");
    }

    #[test]
    fn read_string_reports_the_missing_path() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("missing.java");
        let error = read_string(&path).expect_err("missing file");
        assert!(matches!(error, AmplifierError::EmissionIo { path: p, .. } if p == path));
    }
}
