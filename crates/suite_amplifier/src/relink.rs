// SPDX-License-Identifier: Apache-2.0
//! Reference relinking for isolated clones.
//!
//! A clone starts out with every reference still pointing at the original
//! type and its methods. [`relink`] rewrites those references through the
//! [`RemapTable`] produced by the clone. A method copied in from an ancestor
//! may land in another package, so [`localize_type_refs`] imports or qualifies
//! the types it names. [`check_resolved`] runs right before emission and
//! rejects any type or method reference the isolated type can no longer reach.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AmplifierError, Result};
use crate::source_model::{Code, Fragment, Import, MethodId, SourceModel, TypeId};

/// Old id → new id, filled while cloning.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    types: BTreeMap<TypeId, TypeId>,
    methods: BTreeMap<MethodId, MethodId>,
}

impl RemapTable {
    pub fn insert_type(&mut self, from: TypeId, to: TypeId) {
        self.types.insert(from, to);
    }

    pub fn insert_method(&mut self, from: MethodId, to: MethodId) {
        self.methods.insert(from, to);
    }

    #[must_use]
    pub fn type_target(&self, from: TypeId) -> Option<TypeId> {
        self.types.get(&from).copied()
    }

    #[must_use]
    pub fn method_target(&self, from: MethodId) -> Option<MethodId> {
        self.methods.get(&from).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len() + self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn rewrite_code(code: &mut Code, table: &RemapTable) -> usize {
    let mut rewritten = 0;
    for fragment in &mut code.fragments {
        match fragment {
            Fragment::TypeRef { target, .. } => {
                if let Some(next) = table.type_target(*target) {
                    *target = next;
                    rewritten += 1;
                }
            }
            Fragment::MethodRef(target) => {
                if let Some(next) = table.method_target(*target) {
                    *target = next;
                    rewritten += 1;
                }
            }
            Fragment::Text(_) => {}
        }
    }
    rewritten
}

/// Rewrite every reference inside `isolated` (header, fields, blocks and member
/// methods) that the table maps. Returns the number of rewritten sites.
pub fn relink(model: &mut SourceModel, isolated: TypeId, table: &RemapTable) -> usize {
    let mut rewritten = 0;
    for code in model.type_mut(isolated).codes_mut() {
        rewritten += rewrite_code(code, table);
    }
    let methods: Vec<MethodId> = model.type_decl(isolated).methods().collect();
    for method in methods {
        for code in model.method_mut(method).codes_mut() {
            rewritten += rewrite_code(code, table);
        }
    }
    tracing::debug!(
        type_name = model.qualified_name(isolated).as_str(),
        rewritten,
        "relinked isolated type"
    );
    rewritten
}

/// Simple name of `target` already denotes another type inside `scope`.
fn simple_name_taken(model: &SourceModel, scope: TypeId, target: TypeId) -> bool {
    let name = model.type_decl(target).name.as_str();
    let qualified = model.qualified_name(target);
    let decl = model.type_decl(scope);
    decl.name == name
        || model
            .types()
            .any(|(id, other)| id != target && other.package == decl.package && other.name == name)
        || decl.imports.iter().any(|import| {
            !import.is_static
                && import.path != qualified
                && import.path.rsplit_once('.').is_some_and(|(_, last)| last == name)
        })
}

/// Keep every simple-name type reference of `method` visible from `isolated`.
///
/// Each target that `isolated` cannot see gets a single-type import, or is
/// rendered fully qualified when its simple name is already taken there.
/// Returns the number of types that needed either.
pub fn localize_type_refs(model: &mut SourceModel, isolated: TypeId, method: MethodId) -> usize {
    let foreign: BTreeSet<TypeId> = model
        .method(method)
        .codes()
        .flat_map(|code| code.fragments.iter())
        .filter_map(|fragment| match fragment {
            Fragment::TypeRef {
                target,
                qualified: false,
            } if !model.type_visible_from(*target, isolated) => Some(*target),
            _ => None,
        })
        .collect();

    let mut qualify = BTreeSet::new();
    for target in &foreign {
        if simple_name_taken(model, isolated, *target) {
            qualify.insert(*target);
        } else {
            let path = model.qualified_name(*target);
            model.type_mut(isolated).imports.push(Import { path, is_static: false });
        }
    }
    if !qualify.is_empty() {
        for code in model.method_mut(method).codes_mut() {
            for fragment in &mut code.fragments {
                if let Fragment::TypeRef { target, qualified } = fragment
                    && qualify.contains(&*target)
                {
                    *qualified = true;
                }
            }
        }
    }
    tracing::debug!(
        type_name = model.qualified_name(isolated).as_str(),
        imported = foreign.len() - qualify.len(),
        qualified = qualify.len(),
        "localized moved type references"
    );
    foreign.len()
}

fn unresolved(model: &SourceModel, isolated: TypeId, reference: String) -> AmplifierError {
    AmplifierError::UnresolvedReference {
        type_name: model.qualified_name(isolated),
        reference,
    }
}

/// Fail with [`AmplifierError::UnresolvedReference`] when `isolated` names a
/// type it cannot see (not imported, or not public across packages), or calls
/// a member that was stripped or that its ancestors do not expose to it.
pub fn check_resolved(model: &SourceModel, isolated: TypeId) -> Result<()> {
    let decl = model.type_decl(isolated);
    let method_codes = decl
        .methods()
        .flat_map(|method| model.method(method).codes());
    for code in decl.codes().chain(method_codes) {
        for fragment in &code.fragments {
            match fragment {
                Fragment::TypeRef { target, qualified } => {
                    let target_decl = model.type_decl(*target);
                    let named = *qualified || model.type_visible_from(*target, isolated);
                    let accessible = target_decl.package == decl.package || target_decl.is_public();
                    if !(named && accessible) {
                        return Err(unresolved(model, isolated, model.qualified_name(*target)));
                    }
                }
                Fragment::MethodRef(target) => {
                    let method = model.method(*target);
                    let reachable = if method.owner == isolated {
                        decl.has_member_method(*target)
                    } else {
                        let owner = model.type_decl(method.owner);
                        model.is_ancestor(method.owner, isolated)
                            && !method.has_modifier("private")
                            && (owner.package == decl.package
                                || method.has_modifier("public")
                                || method.has_modifier("protected"))
                    };
                    if !reachable {
                        let reference = format!("{}#{}", model.qualified_name(method.owner), method.name);
                        return Err(unresolved(model, isolated, reference));
                    }
                }
                Fragment::Text(_) => {}
            }
        }
    }
    Ok(())
}
