// SPDX-License-Identifier: Apache-2.0
//! Two-phase emission of isolated test types.
//!
//! [`emit_structural`] renders the whole type once. [`append_duplicates`] then
//! patches the written file as text: it checks that the file still has the
//! length and `}\n` tail recorded in the [`StructuralArtifact`], drops that
//! closing brace, appends the indexed copies and closes the type again.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{AmplifierError, Result};
use crate::relink::check_resolved;
use crate::source_model::{INDENT, MethodId, SourceModel, TypeId};
use crate::util::{read_string, write_string};

pub const TEST_FOLDER_PATH: &str = "src/test/java";
pub const JAVA_EXTENSION: &str = "java";

/// Stands in for the duplicate index in the rendered method name.
const INDEX_PLACEHOLDER: &str = "__DUPLICATE_INDEX__";
const CLOSING_TAIL: &str = "}\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub test_folder: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            test_folder: PathBuf::from(TEST_FOLDER_PATH),
        }
    }

    /// `<root>/<test folder>/<dotted name as dirs>.java`
    #[must_use]
    pub fn path_for(&self, qualified_name: &str) -> PathBuf {
        let mut path = self.root.join(&self.test_folder);
        for segment in qualified_name.split('.') {
            path.push(segment);
        }
        path.set_extension(JAVA_EXTENSION);
        path
    }
}

/// Handle on a freshly written structural copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralArtifact {
    pub path: PathBuf,
    pub type_name: String,
    pub len: usize,
    /// Offset of the final closing brace.
    pub tail_offset: usize,
}

pub fn emit_structural(model: &SourceModel, layout: &OutputLayout, isolated: TypeId) -> Result<StructuralArtifact> {
    check_resolved(model, isolated)?;
    let type_name = model.qualified_name(isolated);
    let rendered = model.render_type(isolated);
    let path = layout.path_for(&type_name);
    write_string(&path, &rendered)?;
    tracing::debug!(path = %path.display(), bytes = rendered.len(), "wrote structural copy");
    Ok(StructuralArtifact {
        len: rendered.len(),
        tail_offset: rendered.len().saturating_sub(CLOSING_TAIL.len()),
        path,
        type_name,
    })
}

fn contract_violation(path: &Path, message: impl Into<String>) -> AmplifierError {
    AmplifierError::EmissionContract {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Append `count` copies of `method` named `<name>_<i>` to the artifact's file.
pub fn append_duplicates(
    model: &SourceModel,
    artifact: &StructuralArtifact,
    method: MethodId,
    count: u32,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let content = read_string(&artifact.path)?;
    if content.len() != artifact.len {
        return Err(contract_violation(
            &artifact.path,
            format!("expected {} bytes, found {}", artifact.len, content.len()),
        ));
    }
    if content.get(artifact.tail_offset..) != Some(CLOSING_TAIL) {
        return Err(contract_violation(&artifact.path, "file does not end with a single closing brace"));
    }

    let name = &model.method(method).name;
    let template = model.render_method(method, Some(&format!("{name}_{INDEX_PLACEHOLDER}")), INDENT);
    let mut patched = String::with_capacity(content.len() + (template.len() + 2) * count as usize);
    patched.push_str(&content[..artifact.tail_offset]);
    for index in 0..count {
        patched.push('\n');
        patched.push_str(&template.replacen(INDEX_PLACEHOLDER, &index.to_string(), 1));
        patched.push('\n');
    }
    patched.push_str(CLOSING_TAIL);
    write_string(&artifact.path, &patched)
}
