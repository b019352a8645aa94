// SPDX-License-Identifier: Apache-2.0
//! Arena-backed structural model of Java test sources.
//!
//! Types and methods live in flat arenas addressed by [`TypeId`] and
//! [`MethodId`]. Code is kept as text interleaved with resolved references
//! ([`Fragment::TypeRef`], [`Fragment::MethodRef`]) so that a cloned type can
//! be relinked by id instead of by string search.
//!
//! Originals are never mutated by the pipelines: [`SourceModel::clone_type`]
//! produces a fresh subtree together with the [`RemapTable`] mapping every
//! original id to its copy.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AmplifierError, Result};
use crate::relink::RemapTable;

/// Indentation unit used when rendering members.
pub const INDENT: usize = 4;

// ── Ids ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId(pub usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

// ── Code ───────────────────────────────────────────────────────────────

/// A piece of source text, or a resolved reference rendered from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    /// Reference to a type; rendered as its simple or qualified name.
    TypeRef { target: TypeId, qualified: bool },
    /// Unqualified (or `this.`-qualified) call of a method in the enclosing hierarchy.
    MethodRef(MethodId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    pub fragments: Vec<Fragment>,
}

impl Code {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut code = Self::default();
        code.push_text(&text);
        code
    }

    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Fragment::Text(last)) = self.fragments.last_mut() {
            last.push_str(text);
        } else {
            self.fragments.push(Fragment::Text(text.to_string()));
        }
    }

    pub fn push(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Text(text) => self.push_text(&text),
            other => self.fragments.push(other),
        }
    }

    /// True when the code holds nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.fragments
            .iter()
            .all(|fragment| matches!(fragment, Fragment::Text(text) if text.trim().is_empty()))
    }

    pub fn type_refs(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.fragments.iter().filter_map(|fragment| match fragment {
            Fragment::TypeRef { target, .. } => Some(*target),
            _ => None,
        })
    }

    pub fn method_refs(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.fragments.iter().filter_map(|fragment| match fragment {
            Fragment::MethodRef(target) => Some(*target),
            _ => None,
        })
    }
}

// ── Declarations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

impl TypeKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Annotation => "@interface",
        }
    }

    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "enum" => Some(Self::Enum),
            "@interface" => Some(Self::Annotation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub is_static: bool,
}

impl Import {
    /// Whether this import makes `qualified` visible by its simple name.
    #[must_use]
    pub fn imports_type(&self, qualified: &str) -> bool {
        if self.is_static {
            return false;
        }
        if self.path == qualified {
            return true;
        }
        match (self.path.strip_suffix(".*"), qualified.rsplit_once('.')) {
            (Some(package), Some((owner_package, _))) => package == owner_package,
            _ => false,
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        if self.is_static {
            format!("import static {};", self.path)
        } else {
            format!("import {};", self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Method(MethodId),
    /// Field declaration, annotations included.
    Field(Code),
    /// Initializer blocks, nested types and anything else kept verbatim.
    Block(Code),
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub package: String,
    pub imports: Vec<Import>,
    pub annotations: Vec<String>,
    pub modifiers: Vec<String>,
    pub kind: TypeKind,
    pub name: String,
    pub type_params: String,
    pub extends: Option<Code>,
    pub implements: Option<Code>,
    pub members: Vec<Member>,
}

impl TypeDecl {
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(&self.package, &self.name)
    }

    /// Abstract classes, interfaces, enums and annotations are never candidate owners.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.kind != TypeKind::Class || self.modifiers.iter().any(|m| m == "abstract")
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.members.iter().filter_map(|member| match member {
            Member::Method(id) => Some(*id),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.modifiers.iter().any(|m| m == "public")
    }

    #[must_use]
    pub fn has_member_method(&self, id: MethodId) -> bool {
        self.methods().any(|candidate| candidate == id)
    }

    pub fn codes_mut(&mut self) -> impl Iterator<Item = &mut Code> {
        let members = self.members.iter_mut().filter_map(|member| match member {
            Member::Field(code) | Member::Block(code) => Some(code),
            Member::Method(_) => None,
        });
        self.extends
            .iter_mut()
            .chain(self.implements.iter_mut())
            .chain(members)
    }

    pub fn codes(&self) -> impl Iterator<Item = &Code> {
        let members = self.members.iter().filter_map(|member| match member {
            Member::Field(code) | Member::Block(code) => Some(code),
            Member::Method(_) => None,
        });
        self.extends.iter().chain(self.implements.iter()).chain(members)
    }
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub owner: TypeId,
    pub annotations: Vec<String>,
    pub modifiers: Vec<String>,
    pub type_params: String,
    /// `None` for constructors.
    pub return_type: Option<Code>,
    pub name: String,
    pub params: Code,
    pub throws: Option<Code>,
    /// Inner text of the body; `None` for abstract and interface methods.
    pub body: Option<Code>,
}

impl MethodDecl {
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.return_type.is_none()
    }

    #[must_use]
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn annotation_names(&self) -> impl Iterator<Item = &str> {
        self.annotations.iter().map(|raw| annotation_name(raw))
    }

    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.return_type
            .as_ref()
            .is_some_and(|code| matches!(code.fragments.as_slice(), [Fragment::Text(t)] if t.trim() == "void"))
    }

    pub fn codes_mut(&mut self) -> impl Iterator<Item = &mut Code> {
        self.return_type
            .iter_mut()
            .chain(std::iter::once(&mut self.params))
            .chain(self.throws.iter_mut())
            .chain(self.body.iter_mut())
    }

    pub fn codes(&self) -> impl Iterator<Item = &Code> {
        self.return_type
            .iter()
            .chain(std::iter::once(&self.params))
            .chain(self.throws.iter())
            .chain(self.body.iter())
    }

    /// Append one statement at the end of the body. Returns false for body-less methods.
    pub fn append_statement(&mut self, statement: &str) -> bool {
        let Some(body) = self.body.as_mut() else {
            return false;
        };
        if body.is_blank() {
            *body = Code::text(statement);
        } else {
            body.push_text("\n");
            body.push_text(statement);
        }
        true
    }
}

/// `@org.junit.Test(timeout = 10)` → `org.junit.Test`.
#[must_use]
pub fn annotation_name(raw: &str) -> &str {
    let name = raw.trim().trim_start_matches('@');
    name.split('(').next().unwrap_or(name).trim()
}

#[must_use]
pub fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

/// A method considered for instrumentation in the context of a concrete owner type.
///
/// For inherited tests `method` is declared by an ancestor of `owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub owner: TypeId,
    pub method: MethodId,
}

impl Candidate {
    #[must_use]
    pub fn is_inherited(&self, model: &SourceModel) -> bool {
        model.method(self.method).owner != self.owner
    }
}

// ── Model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SourceModel {
    types: Vec<TypeDecl>,
    methods: Vec<MethodDecl>,
}

impl SourceModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a type to the model. Qualified names are unique.
    pub fn add_type(&mut self, decl: TypeDecl) -> Result<TypeId> {
        let qualified_name = decl.qualified_name();
        if self.find_type(&qualified_name).is_some() {
            return Err(AmplifierError::NameCollision { qualified_name });
        }
        self.types.push(decl);
        Ok(TypeId(self.types.len() - 1))
    }

    pub fn push_method(&mut self, decl: MethodDecl) -> MethodId {
        self.methods.push(decl);
        MethodId(self.methods.len() - 1)
    }

    #[must_use]
    pub fn type_decl(&self, id: TypeId) -> &TypeDecl {
        &self.types[id.0]
    }

    pub fn type_mut(&mut self, id: TypeId) -> &mut TypeDecl {
        &mut self.types[id.0]
    }

    #[must_use]
    pub fn method(&self, id: MethodId) -> &MethodDecl {
        &self.methods[id.0]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDecl {
        &mut self.methods[id.0]
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeId, &TypeDecl)> {
        self.types
            .iter()
            .enumerate()
            .map(|(index, decl)| (TypeId(index), decl))
    }

    #[must_use]
    pub fn find_type(&self, qualified_name: &str) -> Option<TypeId> {
        self.types()
            .find(|(_, decl)| decl.qualified_name() == qualified_name)
            .map(|(id, _)| id)
    }

    #[must_use]
    pub fn qualified_name(&self, id: TypeId) -> String {
        self.type_decl(id).qualified_name()
    }

    /// Direct superclass, when it is part of the model.
    #[must_use]
    pub fn super_type(&self, id: TypeId) -> Option<TypeId> {
        self.type_decl(id)
            .extends
            .as_ref()
            .and_then(|code| code.type_refs().next())
    }

    /// Proper ancestors found in the model, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut current = self.super_type(id);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = self.super_type(parent);
        }
        chain
    }

    #[must_use]
    pub fn is_ancestor(&self, ancestor: TypeId, of: TypeId) -> bool {
        self.ancestors(of).contains(&ancestor)
    }

    /// Whether code inside `from` can name `target` by its simple name: the type
    /// itself, a type of the same package, or one covered by an import of `from`.
    #[must_use]
    pub fn type_visible_from(&self, target: TypeId, from: TypeId) -> bool {
        if target == from {
            return true;
        }
        let scope = self.type_decl(from);
        if self.type_decl(target).package == scope.package {
            return true;
        }
        let qualified = self.qualified_name(target);
        scope.imports.iter().any(|import| import.imports_type(&qualified))
    }

    /// Resolve a method name against `owner` and then its ancestors.
    #[must_use]
    pub fn lookup_method(&self, owner: TypeId, name: &str) -> Option<MethodId> {
        std::iter::once(owner)
            .chain(self.ancestors(owner))
            .flat_map(|ty| self.type_decl(ty).methods())
            .find(|id| {
                let method = self.method(*id);
                !method.is_constructor() && method.name == name
            })
    }

    /// Every `(concrete owner, method)` pair a test processor may be asked about:
    /// methods declared by a concrete class plus the non-private methods it inherits
    /// from model ancestors without overriding them.
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for (owner, decl) in self.types() {
            if decl.is_abstract() {
                continue;
            }
            let mut seen = BTreeSet::new();
            for method_id in decl.methods() {
                let method = self.method(method_id);
                if method.is_constructor() || method.body.is_none() {
                    continue;
                }
                seen.insert(method.name.clone());
                candidates.push(Candidate {
                    owner,
                    method: method_id,
                });
            }
            for ancestor in self.ancestors(owner) {
                for method_id in self.type_decl(ancestor).methods() {
                    let method = self.method(method_id);
                    if method.is_constructor()
                        || method.body.is_none()
                        || method.has_modifier("private")
                        || method.has_modifier("static")
                    {
                        continue;
                    }
                    if seen.insert(method.name.clone()) {
                        candidates.push(Candidate {
                            owner,
                            method: method_id,
                        });
                    }
                }
            }
        }
        candidates
    }

    /// Deep-clone `original` under `new_name` in the same package.
    ///
    /// Every member method is copied with a fresh id; the returned table maps the
    /// original type and each original method to its copy.
    pub fn clone_type(&mut self, original: TypeId, new_name: &str) -> Result<(TypeId, RemapTable)> {
        let source = self.type_decl(original).clone();
        let qualified_name = qualify(&source.package, new_name);
        if self.find_type(&qualified_name).is_some() {
            return Err(AmplifierError::NameCollision { qualified_name });
        }

        let new_id = TypeId(self.types.len());
        let mut table = RemapTable::default();
        table.insert_type(original, new_id);

        let mut members = Vec::with_capacity(source.members.len());
        for member in &source.members {
            let copied = match member {
                Member::Method(method_id) => {
                    let mut copy = self.method(*method_id).clone();
                    copy.owner = new_id;
                    let copy_id = self.push_method(copy);
                    table.insert_method(*method_id, copy_id);
                    Member::Method(copy_id)
                }
                other => other.clone(),
            };
            members.push(copied);
        }

        self.types.push(TypeDecl {
            name: new_name.to_string(),
            members,
            ..source
        });
        Ok((new_id, table))
    }

    /// Copy `method` into `owner` as a new member and record the mapping.
    pub fn clone_method_into(
        &mut self,
        method: MethodId,
        owner: TypeId,
        table: &mut RemapTable,
    ) -> MethodId {
        let mut copy = self.method(method).clone();
        copy.owner = owner;
        let copy_id = self.push_method(copy);
        self.type_mut(owner).members.push(Member::Method(copy_id));
        table.insert_method(method, copy_id);
        copy_id
    }

    // ── Rendering ──────────────────────────────────────────────────────

    #[must_use]
    pub fn render_code(&self, code: &Code) -> String {
        let mut out = String::new();
        for fragment in &code.fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::TypeRef {
                    target,
                    qualified: true,
                } => out.push_str(&self.qualified_name(*target)),
                Fragment::TypeRef { target, .. } => out.push_str(&self.type_decl(*target).name),
                Fragment::MethodRef(target) => out.push_str(&self.method(*target).name),
            }
        }
        out
    }

    /// Render a whole compilation unit for `id`. The output always ends in `"}\n"`.
    #[must_use]
    pub fn render_type(&self, id: TypeId) -> String {
        let decl = self.type_decl(id);
        let mut out = String::new();
        if !decl.package.is_empty() {
            out.push_str(&format!("package {};\n\n", decl.package));
        }
        if !decl.imports.is_empty() {
            for import in &decl.imports {
                out.push_str(&import.render());
                out.push('\n');
            }
            out.push('\n');
        }
        for annotation in &decl.annotations {
            out.push_str(annotation);
            out.push('\n');
        }
        for modifier in &decl.modifiers {
            out.push_str(modifier);
            out.push(' ');
        }
        out.push_str(decl.kind.keyword());
        out.push(' ');
        out.push_str(&decl.name);
        out.push_str(&decl.type_params);
        if let Some(extends) = &decl.extends {
            out.push_str(" extends ");
            out.push_str(self.render_code(extends).trim());
        }
        if let Some(implements) = &decl.implements {
            out.push_str(" implements ");
            out.push_str(self.render_code(implements).trim());
        }
        out.push_str(" {\n");
        for member in &decl.members {
            out.push('\n');
            out.push_str(&self.render_member(member, INDENT));
            out.push('\n');
        }
        out.push_str("}\n");
        out
    }

    fn render_member(&self, member: &Member, indent: usize) -> String {
        match member {
            Member::Method(id) => self.render_method(*id, None, indent),
            Member::Field(code) | Member::Block(code) => {
                indent_lines(&self.render_code(code), indent)
            }
        }
    }

    /// Render a single method, optionally under another name.
    #[must_use]
    pub fn render_method(&self, id: MethodId, name_override: Option<&str>, indent: usize) -> String {
        let method = self.method(id);
        let pad = " ".repeat(indent);
        let mut out = String::new();
        for annotation in &method.annotations {
            out.push_str(&pad);
            out.push_str(annotation);
            out.push('\n');
        }
        out.push_str(&pad);
        for modifier in &method.modifiers {
            out.push_str(modifier);
            out.push(' ');
        }
        if !method.type_params.is_empty() {
            out.push_str(&method.type_params);
            out.push(' ');
        }
        if let Some(return_type) = &method.return_type {
            out.push_str(self.render_code(return_type).trim());
            out.push(' ');
        }
        let name = match name_override {
            Some(name) => name,
            None if method.is_constructor() => self.type_decl(method.owner).name.as_str(),
            None => method.name.as_str(),
        };
        out.push_str(name);
        out.push('(');
        out.push_str(self.render_code(&method.params).trim());
        out.push(')');
        if let Some(throws) = &method.throws {
            out.push_str(" throws ");
            out.push_str(self.render_code(throws).trim());
        }
        match &method.body {
            None => out.push(';'),
            Some(body) => {
                out.push_str(" {\n");
                let text = self.render_code(body);
                if !text.trim().is_empty() {
                    out.push_str(&indent_lines(&text, indent + INDENT));
                    out.push('\n');
                }
                out.push_str(&pad);
                out.push('}');
            }
        }
        out
    }
}

/// Prefix every non-blank line with `indent` spaces; blank lines become empty.
#[must_use]
pub fn indent_lines(text: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_type(package: &str, name: &str) -> TypeDecl {
        TypeDecl {
            package: package.to_string(),
            imports: Vec::new(),
            annotations: Vec::new(),
            modifiers: vec!["public".to_string()],
            kind: TypeKind::Class,
            name: name.to_string(),
            type_params: String::new(),
            extends: None,
            implements: None,
            members: Vec::new(),
        }
    }

    fn void_method(owner: TypeId, name: &str, body: Code) -> MethodDecl {
        MethodDecl {
            owner,
            annotations: vec!["@Test".to_string()],
            modifiers: vec!["public".to_string()],
            type_params: String::new(),
            return_type: Some(Code::text("void")),
            name: name.to_string(),
            params: Code::default(),
            throws: None,
            body: Some(body),
        }
    }

    #[test]
    fn add_type_rejects_colliding_qualified_names() {
        let mut model = SourceModel::new();
        model.add_type(bare_type("p", "T")).expect("first");
        let error = model.add_type(bare_type("p", "T")).expect_err("collision");
        assert!(matches!(
            error,
            AmplifierError::NameCollision { qualified_name } if qualified_name == "p.T"
        ));
    }

    #[test]
    fn clone_type_copies_methods_with_fresh_ids() {
        let mut model = SourceModel::new();
        let owner = model.add_type(bare_type("p", "T")).expect("type");
        let method = model.push_method(void_method(owner, "testX", Code::text("run();")));
        model.type_mut(owner).members.push(Member::Method(method));

        let (clone, table) = model.clone_type(owner, "T_testX").expect("clone");
        assert_ne!(clone, owner);
        assert_eq!(model.qualified_name(clone), "p.T_testX");
        let copied = table.method_target(method).expect("mapped");
        assert_ne!(copied, method);
        assert_eq!(model.method(copied).owner, clone);
        assert_eq!(model.method(method).owner, owner);
        assert!(model.type_decl(owner).has_member_method(method));
    }

    #[test]
    fn render_method_indents_body_and_honours_name_override() {
        let mut model = SourceModel::new();
        let owner = model.add_type(bare_type("p", "T")).expect("type");
        let method = model.push_method(void_method(owner, "testX", Code::text("int a = 1;\nrun(a);")));
        let rendered = model.render_method(method, Some("testX_0"), 4);
        assert_eq!(
            rendered,
            "    @Test\n    public void testX_0() {\n        int a = 1;\n        run(a);\n    }"
        );
    }

    #[test]
    fn render_type_ends_with_single_closing_brace_line() {
        let mut model = SourceModel::new();
        let owner = model.add_type(bare_type("p", "T")).expect("type");
        let rendered = model.render_type(owner);
        assert!(rendered.starts_with("package p;\n\npublic class T {\n"));
        assert!(rendered.ends_with("}\n"));
    }

    #[test]
    fn append_statement_targets_end_of_body() {
        let mut model = SourceModel::new();
        let owner = model.add_type(bare_type("p", "T")).expect("type");
        let method = model.push_method(void_method(owner, "testX", Code::text("run();")));
        assert!(model.method_mut(method).append_statement("fail();"));
        let body = model.method(method).body.as_ref().expect("body");
        assert_eq!(model.render_code(body), "run();\nfail();");
    }

    #[test]
    fn on_demand_import_makes_package_types_visible() {
        let import = Import {
            path: "org.junit.jupiter.api.*".to_string(),
            is_static: false,
        };
        assert!(import.imports_type("org.junit.jupiter.api.Test"));
        assert!(!import.imports_type("org.junit.Test"));
    }

    #[test]
    fn annotation_name_strips_arguments() {
        assert_eq!(annotation_name("@Test(timeout = 10)"), "Test");
        assert_eq!(annotation_name("@org.junit.Test"), "org.junit.Test");
    }
}
