// SPDX-License-Identifier: Apache-2.0
//! Lightweight Java source reader that builds a [`SourceModel`].
//!
//! This is not a full Java parser. It masks comments and literals, splits
//! type bodies into member declarations by brace and semicolon depth, and
//! reads declaration headers with regexes. Identifiers in member code are then
//! resolved against the types found under the scanned root, so that cloned
//! types can later be relinked by id:
//!
//! - a dotted chain whose prefix is a known qualified type name becomes a
//!   qualified type reference;
//! - a simple name visible through the package or an import becomes a simple
//!   type reference;
//! - `name(` or `this.name(` matching a method of the enclosing hierarchy
//!   becomes a method reference.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use regex_lite::Regex;

use crate::error::{AmplifierError, Result};
use crate::source_model::{
    Code, Fragment, Import, Member, MethodDecl, SourceModel, TypeDecl, TypeId, TypeKind, qualify,
};

// ── Raw declarations ─────────────────────────────────────────────────────

/// Source text plus a same-length copy with comments and literal contents blanked.
#[derive(Debug, Clone, Default)]
struct Snippet {
    text: String,
    masked: String,
}

impl Snippet {
    /// For header pieces that no longer contain comments.
    fn from_code(text: &str) -> Self {
        Self {
            text: text.to_string(),
            masked: mask_source(text, true),
        }
    }

    /// Drop surrounding blank lines and the common indentation, keeping both
    /// copies byte-aligned.
    fn dedented(text: &str, masked: &str) -> Self {
        let text_lines: Vec<&str> = text.split('\n').collect();
        let masked_lines: Vec<&str> = masked.split('\n').collect();
        let first = text_lines.iter().position(|line| !line.trim().is_empty());
        let last = text_lines.iter().rposition(|line| !line.trim().is_empty());
        let (Some(first), Some(last)) = (first, last) else {
            return Self::default();
        };

        let indent = text_lines[first..=last]
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| leading_ws(line))
            .min()
            .unwrap_or(0);

        let mut out = Self::default();
        for index in first..=last {
            let cut = leading_ws(text_lines[index]).min(indent);
            if index > first {
                out.text.push('\n');
                out.masked.push('\n');
            }
            out.text.push_str(text_lines[index][cut..].trim_end_matches('\r'));
            let masked_line = masked_lines.get(index).copied().unwrap_or_default();
            out.masked
                .push_str(masked_line.get(cut..).unwrap_or_default().trim_end_matches('\r'));
        }
        out
    }
}

#[derive(Debug, Clone)]
struct RawMethod {
    annotations: Vec<String>,
    modifiers: Vec<String>,
    type_params: String,
    return_type: Option<Snippet>,
    name: String,
    params: Snippet,
    throws: Option<Snippet>,
    body: Option<Snippet>,
}

#[derive(Debug, Clone)]
enum RawMember {
    Method(RawMethod),
    Field(Snippet),
    Block(Snippet),
}

#[derive(Debug, Clone)]
struct RawType {
    annotations: Vec<String>,
    modifiers: Vec<String>,
    kind: TypeKind,
    name: String,
    type_params: String,
    extends: Option<Snippet>,
    implements: Option<Snippet>,
    members: Vec<RawMember>,
}

/// One `.java` file before reference resolution.
#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub path: String,
    pub package: String,
    pub imports: Vec<Import>,
    types: Vec<RawType>,
}

impl ParsedUnit {
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        self.types
            .iter()
            .map(|raw| qualify(&self.package, &raw.name))
            .collect()
    }
}

// ── Masking ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum MaskState {
    Code,
    LineComment,
    BlockComment,
    Str,
    Char,
    TextBlock,
}

fn blank(out: &mut String, ch: char) {
    if ch == '\n' || ch == '\r' {
        out.push(ch);
    } else {
        for _ in 0..ch.len_utf8() {
            out.push(' ');
        }
    }
}

/// Replace comments (and, when `literals` is set, string/char literal contents)
/// with spaces. The result has exactly the byte layout of `src`.
#[must_use]
pub fn mask_source(src: &str, literals: bool) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.char_indices().peekable();
    let mut state = MaskState::Code;

    while let Some((index, ch)) = chars.next() {
        let next = chars.peek().map(|(_, c)| *c);
        match state {
            MaskState::Code => match ch {
                '/' if next == Some('/') => {
                    state = MaskState::LineComment;
                    out.push(' ');
                }
                '/' if next == Some('*') => {
                    state = MaskState::BlockComment;
                    chars.next();
                    out.push_str("  ");
                }
                '"' if src[index..].starts_with("\"\"\"") => {
                    state = MaskState::TextBlock;
                    chars.next();
                    chars.next();
                    out.push_str("\"\"\"");
                }
                '"' => {
                    state = MaskState::Str;
                    out.push('"');
                }
                '\'' => {
                    state = MaskState::Char;
                    out.push('\'');
                }
                _ => out.push(ch),
            },
            MaskState::LineComment => {
                if ch == '\n' {
                    state = MaskState::Code;
                }
                blank(&mut out, ch);
            }
            MaskState::BlockComment => {
                if ch == '*' && next == Some('/') {
                    chars.next();
                    out.push_str("  ");
                    state = MaskState::Code;
                } else {
                    blank(&mut out, ch);
                }
            }
            MaskState::Str | MaskState::Char | MaskState::TextBlock => {
                let closes = match state {
                    MaskState::Str => ch == '"',
                    MaskState::Char => ch == '\'',
                    _ => src[index..].starts_with("\"\"\""),
                };
                if ch == '\\' {
                    for escaped in [Some(ch), chars.next().map(|(_, c)| c)].into_iter().flatten() {
                        if literals {
                            blank(&mut out, escaped);
                        } else {
                            out.push(escaped);
                        }
                    }
                } else if closes {
                    if state == MaskState::TextBlock {
                        chars.next();
                        chars.next();
                        out.push_str("\"\"\"");
                    } else {
                        out.push(ch);
                    }
                    state = MaskState::Code;
                } else if literals {
                    blank(&mut out, ch);
                } else {
                    out.push(ch);
                }
            }
        }
    }
    out
}

// ── Structural scanning ──────────────────────────────────────────────────

fn leading_ws(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn skip_ws(bytes: &[u8], mut index: usize, end: usize) -> usize {
    while index < end && bytes[index].is_ascii_whitespace() {
        index += 1;
    }
    index
}

fn find_matching(bytes: &[u8], open: usize, end: usize, open_byte: u8, close_byte: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (index, byte) in bytes.iter().enumerate().take(end).skip(open) {
        if *byte == open_byte {
            depth += 1;
        } else if *byte == close_byte {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `=` at parenthesis depth zero, ignoring comparison operators.
fn has_top_level_assign(header: &str) -> bool {
    let bytes = header.as_bytes();
    let mut depth = 0i32;
    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b'(' | b'<' => depth += 1,
            b')' | b'>' => depth -= 1,
            b'=' if depth <= 0 => {
                let prev = index.checked_sub(1).map(|i| bytes[i]);
                let next = bytes.get(index + 1).copied();
                if !matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) && next != Some(b'=') {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// A declaration inside a type body (or at file level).
#[derive(Debug, Clone, Copy)]
struct Item {
    start: usize,
    end: usize,
    block: Option<(usize, usize)>,
}

/// Split `masked[start..end]` into `;`-terminated and `{...}`-bodied items.
/// Braces that belong to an initializer expression stay inside their item.
/// Errors with the offset of an unbalanced brace.
fn split_items(masked: &str, start: usize, end: usize) -> std::result::Result<Vec<Item>, usize> {
    let bytes = masked.as_bytes();
    let mut items = Vec::new();
    let mut item_start = skip_ws(bytes, start, end);
    let mut paren = 0i32;
    let mut index = item_start;

    while index < end {
        match bytes[index] {
            b'(' => paren += 1,
            b')' => paren -= 1,
            b'{' if paren == 0 => {
                let close = find_matching(bytes, index, end, b'{', b'}').ok_or(index)?;
                if !has_top_level_assign(&masked[item_start..index]) {
                    items.push(Item {
                        start: item_start,
                        end: close + 1,
                        block: Some((index, close)),
                    });
                    item_start = skip_ws(bytes, close + 1, end);
                    index = item_start;
                    continue;
                }
                index = close;
            }
            b'}' if paren == 0 => return Err(index),
            b';' if paren == 0 => {
                if !masked[item_start..index].trim().is_empty() {
                    items.push(Item {
                        start: item_start,
                        end: index + 1,
                        block: None,
                    });
                }
                item_start = skip_ws(bytes, index + 1, end);
                index = item_start;
                continue;
            }
            _ => {}
        }
        index += 1;
    }
    Ok(items)
}

/// Leading annotations of a declaration and the offset where the rest begins.
fn split_annotations(content: &str, masked: &str, start: usize, end: usize) -> (Vec<String>, usize) {
    let bytes = masked.as_bytes();
    let mut annotations = Vec::new();
    let mut index = skip_ws(bytes, start, end);
    while index < end && bytes[index] == b'@' && !masked[index..end].starts_with("@interface") {
        let annotation_start = index;
        index += 1;
        while index < end && (is_ident_byte(bytes[index]) || bytes[index] == b'.') {
            index += 1;
        }
        let after_name = skip_ws(bytes, index, end);
        if after_name < end
            && bytes[after_name] == b'('
            && let Some(close) = find_matching(bytes, after_name, end, b'(', b')')
        {
            index = close + 1;
        }
        annotations.push(content[annotation_start..index].trim().to_string());
        index = skip_ws(bytes, index, end);
    }
    (annotations, index)
}

/// Move `start` back to the beginning of its line when only indentation precedes it.
fn line_start(content: &str, start: usize) -> usize {
    let before = &content[..start];
    match before.rfind('\n') {
        Some(newline) if before[newline + 1..].trim().is_empty() => newline + 1,
        None if before.trim().is_empty() => 0,
        _ => start,
    }
}

// ── Declaration parsing ──────────────────────────────────────────────────

struct Sources<'a> {
    path: &'a str,
    content: &'a str,
    stripped: &'a str,
    masked: &'a str,
}

impl Sources<'_> {
    fn snippet(&self, start: usize, end: usize) -> Snippet {
        let start = line_start(self.content, start);
        Snippet::dedented(&self.content[start..end], &self.masked[start..end])
    }

    fn unbalanced(&self, offset: usize) -> AmplifierError {
        let line = self.content[..offset.min(self.content.len())].matches('\n').count() + 1;
        AmplifierError::parse(self.path, format!("unbalanced braces near line {line}"))
    }
}

fn parse_type(src: &Sources<'_>, item: &Item) -> Result<Option<RawType>> {
    let Some((open, close)) = item.block else {
        return Ok(None);
    };
    let (annotations, rest) = split_annotations(src.content, src.masked, item.start, open);
    let header = collapse_ws(&src.stripped[rest..open]);

    let re_type = Regex::new(
        r"^((?:[\w-]+\s+)*)(class|interface|enum|record|@interface)\s+([\w$]+)\s*(.*)$",
    )
    .expect("type header regex");
    let Some(caps) = re_type.captures(&header) else {
        return Ok(None);
    };
    let keyword = caps.get(2).map_or("", |m| m.as_str());
    let Some(kind) = TypeKind::from_keyword(keyword) else {
        tracing::debug!(path = src.path, keyword, "skipping unsupported type declaration");
        return Ok(None);
    };
    let modifiers = caps
        .get(1)
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let name = caps.get(3).map_or("", |m| m.as_str()).to_string();
    let mut tail = caps.get(4).map_or("", |m| m.as_str()).trim().to_string();

    let mut type_params = String::new();
    if tail.starts_with('<')
        && let Some(close_angle) = find_matching(tail.as_bytes(), 0, tail.len(), b'<', b'>')
    {
        type_params = tail[..=close_angle].to_string();
        tail = tail[close_angle + 1..].trim().to_string();
    }

    let re_extends = Regex::new(r"\bextends\b").expect("extends regex");
    let re_implements = Regex::new(r"\bimplements\b").expect("implements regex");
    let extends_at = re_extends.find(&tail).map(|m| (m.start(), m.end()));
    let implements_at = re_implements.find(&tail).map(|m| (m.start(), m.end()));
    let extends = extends_at.map(|(_, after)| {
        let stop = implements_at
            .map(|(start, _)| start)
            .filter(|start| *start > after)
            .unwrap_or(tail.len());
        Snippet::from_code(tail[after..stop].trim())
    });
    let implements = implements_at.map(|(_, after)| {
        let stop = extends_at
            .map(|(start, _)| start)
            .filter(|start| *start > after)
            .unwrap_or(tail.len());
        Snippet::from_code(tail[after..stop].trim())
    });

    let members = match kind {
        TypeKind::Class | TypeKind::Interface => parse_members(src, open + 1, close)?,
        TypeKind::Enum | TypeKind::Annotation => {
            let body = Snippet::dedented(&src.content[open + 1..close], &src.masked[open + 1..close]);
            if body.text.is_empty() {
                Vec::new()
            } else {
                vec![RawMember::Block(body)]
            }
        }
    };

    Ok(Some(RawType {
        annotations,
        modifiers,
        kind,
        name,
        type_params,
        extends,
        implements,
        members,
    }))
}

fn parse_members(src: &Sources<'_>, start: usize, end: usize) -> Result<Vec<RawMember>> {
    let items = split_items(src.masked, start, end).map_err(|offset| src.unbalanced(offset))?;

    let re_nested_type = Regex::new(r"(?:^|\s)(?:class|interface|enum|record|@interface)\s+[\w$]+")
        .expect("nested type regex");
    let re_method = Regex::new(
        r"^(?P<mods>(?:(?:public|protected|private|static|final|abstract|synchronized|native|default|strictfp)\s+)*)(?:(?P<tp><.*?>)\s*)?(?:(?P<ret>[\w$.<>\[\]?,& ]+?)\s+)?(?P<name>[\w$]+)\s*\((?P<params>.*)\)\s*(?:throws\s+(?P<throws>.+))?$",
    )
    .expect("method header regex");

    let mut members = Vec::new();
    for item in items {
        let header_end = item.block.map_or(item.end - 1, |(open, _)| open);
        let (annotations, rest) = split_annotations(src.content, src.masked, item.start, header_end);
        let header = collapse_ws(&src.stripped[rest..header_end]);
        let masked_header = collapse_ws(&src.masked[rest..header_end]);
        let whole = src.snippet(item.start, item.end);

        if re_nested_type.is_match(&masked_header) {
            members.push(RawMember::Block(whole));
            continue;
        }

        if !has_top_level_assign(&masked_header)
            && let Some(caps) = re_method.captures(&header)
        {
            let group = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());
            let body = item.block.map(|(open, close)| {
                Snippet::dedented(&src.content[open + 1..close], &src.masked[open + 1..close])
            });
            members.push(RawMember::Method(RawMethod {
                annotations,
                modifiers: group("mods")
                    .map(|mods| mods.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                type_params: group("tp").unwrap_or_default(),
                return_type: group("ret").filter(|ret| !ret.is_empty()).map(|ret| Snippet::from_code(&ret)),
                name: group("name").unwrap_or_default(),
                params: Snippet::from_code(&group("params").unwrap_or_default()),
                throws: group("throws").map(|throws| Snippet::from_code(&throws)),
                body,
            }));
            continue;
        }

        if item.block.is_some() {
            members.push(RawMember::Block(whole));
        } else {
            members.push(RawMember::Field(whole));
        }
    }
    Ok(members)
}

/// Parse one compilation unit. `path` is only used for diagnostics.
pub fn parse_unit(content: &str, path: &str) -> Result<ParsedUnit> {
    let stripped = mask_source(content, false);
    let masked = mask_source(content, true);
    let src = Sources {
        path,
        content,
        stripped: &stripped,
        masked: &masked,
    };

    let re_package = Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").expect("package regex");
    let re_import = Regex::new(r"(?m)^\s*import\s+(static\s+)?([\w.]+\*?)\s*;").expect("import regex");

    let package = re_package
        .captures(&masked)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let imports = re_import
        .captures_iter(&masked)
        .filter_map(|caps| {
            caps.get(2).map(|path| Import {
                path: path.as_str().to_string(),
                is_static: caps.get(1).is_some(),
            })
        })
        .collect();

    let items = split_items(&masked, 0, masked.len()).map_err(|offset| src.unbalanced(offset))?;
    let mut types = Vec::new();
    for item in &items {
        if let Some(raw) = parse_type(&src, item)? {
            types.push(raw);
        }
    }

    Ok(ParsedUnit {
        path: path.to_string(),
        package,
        imports,
        types,
    })
}

// ── Reference resolution ─────────────────────────────────────────────────

struct Scope<'a> {
    package: &'a str,
    imports: &'a [Import],
    owner: Option<TypeId>,
}

struct Resolver {
    by_qualified: BTreeMap<String, TypeId>,
    chain: Regex,
}

impl Resolver {
    fn new(model: &SourceModel) -> Self {
        Self {
            by_qualified: model
                .types()
                .map(|(id, decl)| (decl.qualified_name(), id))
                .collect(),
            chain: Regex::new(r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*").expect("identifier chain regex"),
        }
    }

    /// Longest dotted prefix (two segments or more) naming a model type.
    fn qualified_prefix(&self, chain: &str) -> Option<(usize, TypeId)> {
        let mut best = None;
        for (index, _) in chain.match_indices('.') {
            if let Some(id) = self.by_qualified.get(&chain[..index]) {
                best = Some((index, *id));
            }
        }
        if chain.contains('.')
            && let Some(id) = self.by_qualified.get(chain)
        {
            best = Some((chain.len(), *id));
        }
        best
    }

    fn visible_type(&self, model: &SourceModel, name: &str, scope: &Scope<'_>) -> Option<TypeId> {
        let same_package = qualify(scope.package, name);
        if let Some(id) = self.by_qualified.get(&same_package) {
            return Some(*id);
        }
        model
            .types()
            .filter(|(_, decl)| decl.name == name)
            .map(|(id, decl)| (id, decl.qualified_name()))
            .find(|(_, qualified)| scope.imports.iter().any(|import| import.imports_type(qualified)))
            .map(|(id, _)| id)
    }

    fn resolve(&self, model: &SourceModel, snippet: &Snippet, scope: &Scope<'_>) -> Code {
        let mut code = Code::default();
        let masked = snippet.masked.as_str();
        let bytes = masked.as_bytes();
        let mut cursor = 0;

        for found in self.chain.find_iter(masked) {
            let (start, end) = (found.start(), found.end());
            if start > 0 && (bytes[start - 1] == b'.' || is_ident_byte(bytes[start - 1])) {
                continue;
            }
            let chain = found.as_str();

            if let Some((length, target)) = self.qualified_prefix(chain) {
                code.push_text(&snippet.text[cursor..start]);
                code.push(Fragment::TypeRef {
                    target,
                    qualified: true,
                });
                cursor = start + length;
                continue;
            }

            let first = chain.split('.').next().unwrap_or(chain);
            if let Some(target) = self.visible_type(model, first, scope) {
                code.push_text(&snippet.text[cursor..start]);
                code.push(Fragment::TypeRef {
                    target,
                    qualified: false,
                });
                cursor = start + first.len();
                continue;
            }

            let Some(owner) = scope.owner else {
                continue;
            };
            let (offset, name) = match chain.split_once('.') {
                None => (0, chain),
                Some(("this", rest)) if !rest.contains('.') => (5, rest),
                Some(_) => continue,
            };
            let call = masked[end..].trim_start().starts_with('(');
            if call && let Some(method) = model.lookup_method(owner, name) {
                code.push_text(&snippet.text[cursor..start + offset]);
                code.push(Fragment::MethodRef(method));
                cursor = end;
            }
        }
        code.push_text(&snippet.text[cursor..]);
        code
    }
}

// ── Model building ───────────────────────────────────────────────────────

/// Resolve parsed units into one model. Type ids follow unit order, then
/// declaration order within each unit.
pub fn build_model(units: &[ParsedUnit]) -> Result<SourceModel> {
    let mut model = SourceModel::new();
    let mut placed: Vec<(TypeId, &ParsedUnit, &RawType)> = Vec::new();

    for unit in units {
        for raw in &unit.types {
            let id = model.add_type(TypeDecl {
                package: unit.package.clone(),
                imports: unit.imports.clone(),
                annotations: raw.annotations.clone(),
                modifiers: raw.modifiers.clone(),
                kind: raw.kind,
                name: raw.name.clone(),
                type_params: raw.type_params.clone(),
                extends: None,
                implements: None,
                members: Vec::new(),
            })?;
            placed.push((id, unit, raw));
        }
    }

    let resolver = Resolver::new(&model);

    for (id, unit, raw) in &placed {
        let scope = Scope {
            package: &unit.package,
            imports: &unit.imports,
            owner: None,
        };
        let extends = raw.extends.as_ref().map(|s| resolver.resolve(&model, s, &scope));
        let implements = raw.implements.as_ref().map(|s| resolver.resolve(&model, s, &scope));
        let decl = model.type_mut(*id);
        decl.extends = extends;
        decl.implements = implements;
    }

    // Method skeletons first, so calls can be resolved across the hierarchy.
    for (id, _, raw) in &placed {
        for member in &raw.members {
            let placed_member = match member {
                RawMember::Method(method) => Member::Method(model.push_method(MethodDecl {
                    owner: *id,
                    annotations: method.annotations.clone(),
                    modifiers: method.modifiers.clone(),
                    type_params: method.type_params.clone(),
                    return_type: None,
                    name: method.name.clone(),
                    params: Code::default(),
                    throws: None,
                    body: None,
                })),
                RawMember::Field(_) => Member::Field(Code::default()),
                RawMember::Block(_) => Member::Block(Code::default()),
            };
            model.type_mut(*id).members.push(placed_member);
        }
    }

    for (id, unit, raw) in &placed {
        let scope = Scope {
            package: &unit.package,
            imports: &unit.imports,
            owner: Some(*id),
        };
        for (index, member) in raw.members.iter().enumerate() {
            let slot = model.type_decl(*id).members[index].clone();
            match (member, slot) {
                (RawMember::Method(method), Member::Method(method_id)) => {
                    let return_type = method.return_type.as_ref().map(|s| resolver.resolve(&model, s, &scope));
                    let params = resolver.resolve(&model, &method.params, &scope);
                    let throws = method.throws.as_ref().map(|s| resolver.resolve(&model, s, &scope));
                    let body = method.body.as_ref().map(|s| resolver.resolve(&model, s, &scope));
                    let decl = model.method_mut(method_id);
                    decl.return_type = return_type;
                    decl.params = params;
                    decl.throws = throws;
                    decl.body = body;
                }
                (RawMember::Field(snippet), _) => {
                    let code = resolver.resolve(&model, snippet, &scope);
                    model.type_mut(*id).members[index] = Member::Field(code);
                }
                (RawMember::Block(snippet), _) => {
                    let code = resolver.resolve(&model, snippet, &scope);
                    model.type_mut(*id).members[index] = Member::Block(code);
                }
                (RawMember::Method(_), _) => {}
            }
        }
    }

    Ok(model)
}

/// Build a model from in-memory `(path, content)` pairs.
pub fn model_from_sources(sources: &[(&str, &str)]) -> Result<SourceModel> {
    let units = sources
        .iter()
        .map(|(path, content)| parse_unit(content, path))
        .collect::<Result<Vec<_>>>()?;
    build_model(&units)
}

fn collect_java_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(root.to_path_buf());

    let skip_dirs: HashSet<&str> = ["target", "build", "out", ".git", ".gradle", ".idea"]
        .into_iter()
        .collect();

    while let Some(dir) = queue.pop_front() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                if !skip_dirs.contains(name) && !name.starts_with('.') {
                    queue.push_back(path);
                }
            } else if path.extension().and_then(|e| e.to_str()) == Some("java") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

/// Scan every `.java` file below `root` and build the model.
pub fn parse_directory(root: &Path) -> Result<SourceModel> {
    crate::util::ensure_exists(root)?;
    let mut units = Vec::new();
    for path in collect_java_files(root) {
        let content = crate::util::read_string(&path)?;
        let relative = path.strip_prefix(root).unwrap_or(&path).display().to_string();
        units.push(parse_unit(&content, &relative)?);
    }
    tracing::info!(
        root = %root.display(),
        files = units.len(),
        "parsed test sources"
    );
    build_model(&units)
}
