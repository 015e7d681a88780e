// src/source/mod.rs

//! Source pipeline: delegating constructors added to a Java source tree
//!
//! Every `.java` file under the root is parsed with tree-sitter-java and
//! every class, record, interface, enum and annotation declaration
//! (top-level or member) is indexed by its qualified binary name. No
//! classpath is needed; references to types outside the tree are matched by
//! name through each file's imports.
//!
//! Edits are splices into the source text followed by a reparse, so all
//! formatting outside the inserted declaration and imports is kept. Nothing
//! touches the disk until [`SourceTree::write_back`].

pub mod imports;
pub mod printer;
pub mod render;

use crate::archive;
use crate::descriptor::JavaType;
use crate::error::{Error, Result};
use crate::patcher::{AppliedPatch, DeclKind, TypeRef, TypeStore, apply_all};
use crate::spec::{PatchSet, PatchSpec};
use imports::{ImportAnchor, UnitContext, WrittenType, count_dims};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tree_sitter::{Language, Node, Parser, Tree};
use walkdir::WalkDir;

/// Options for loading and editing a source tree
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// One level of indentation, used when a type body has no members to
    /// copy indentation from
    pub indent_unit: String,
    /// Add imports for parameter types instead of writing qualified names
    pub auto_import: bool,
    /// Treat syntax errors in any file as fatal, not only in patched files
    pub strict: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            indent_unit: "    ".to_string(),
            auto_import: true,
            strict: false,
        }
    }
}

impl SourceOptions {
    pub fn indent_unit(mut self, unit: impl Into<String>) -> Self {
        self.indent_unit = unit.into();
        self
    }

    pub fn auto_import(mut self, enabled: bool) -> Self {
        self.auto_import = enabled;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// A type declaration found in a compilation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeDecl {
    /// Qualified binary name, `$` between nested types
    pub binary: String,
    pub kind: DeclKind,
    /// Simple names from the top-level type down to this one
    pub path: Vec<String>,
}

fn decl_kind(node_kind: &str) -> Option<DeclKind> {
    match node_kind {
        "class_declaration" => Some(DeclKind::Class),
        "record_declaration" => Some(DeclKind::Record),
        "interface_declaration" => Some(DeclKind::Interface),
        "enum_declaration" => Some(DeclKind::Enum),
        "annotation_type_declaration" => Some(DeclKind::Annotation),
        _ => None,
    }
}

fn node_text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    src.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

fn decl_name<'a>(node: Node<'_>, src: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name").map(|n| node_text(n, src))
}

/// Member declarations of a type body; enum bodies nest them one level down
fn members(body: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = body.walk();
    let mut out = Vec::new();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            out.extend(child.named_children(&mut inner));
        } else {
            out.push(child);
        }
    }
    out
}

/// Keyword modifiers (`public`, `static`, ...) written on a declaration
fn modifier_keywords<'a>(node: Node<'_>, src: &'a str) -> Vec<&'a str> {
    let mut cursor = node.walk();
    let Some(modifiers) = node.children(&mut cursor).find(|c| c.kind() == "modifiers") else {
        return Vec::new();
    };
    let mut inner = modifiers.walk();
    modifiers
        .children(&mut inner)
        .filter(|c| !c.is_named())
        .map(|c| node_text(c, src))
        .collect()
}

/// Kind of a declaration given the kind of the type enclosing it
///
/// Member classes of classes, enums and records are inner classes unless
/// declared `static`. Members of interfaces and annotations are implicitly
/// static, as are nested records, enums and interfaces.
fn member_kind(node: Node<'_>, src: &str, enclosing: Option<DeclKind>) -> Option<DeclKind> {
    let kind = decl_kind(node.kind())?;
    let in_instance_scope = matches!(
        enclosing,
        Some(DeclKind::Class | DeclKind::Inner | DeclKind::Record | DeclKind::Enum)
    );
    if kind == DeclKind::Class
        && in_instance_scope
        && !modifier_keywords(node, src).contains(&"static")
    {
        return Some(DeclKind::Inner);
    }
    Some(kind)
}

/// Every top-level and member type declared in a compilation unit
pub(crate) fn declared_types(root: Node<'_>, src: &str, package: &str) -> Vec<TypeDecl> {
    fn visit(
        nodes: Vec<Node<'_>>,
        src: &str,
        prefix: &str,
        path: &[String],
        enclosing: Option<DeclKind>,
        out: &mut Vec<TypeDecl>,
    ) {
        for node in nodes {
            let Some(kind) = member_kind(node, src, enclosing) else {
                continue;
            };
            let Some(name) = decl_name(node, src) else {
                continue;
            };
            let binary = if path.is_empty() {
                if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{}.{}", prefix, name)
                }
            } else {
                format!("{}${}", prefix, name)
            };
            let mut decl_path = path.to_vec();
            decl_path.push(name.to_string());

            out.push(TypeDecl {
                binary: binary.clone(),
                kind,
                path: decl_path.clone(),
            });
            if let Some(body) = node.child_by_field_name("body") {
                visit(members(body), src, &binary, &decl_path, Some(kind), out);
            }
        }
    }

    let mut cursor = root.walk();
    let top: Vec<Node<'_>> = root.named_children(&mut cursor).collect();
    let mut out = Vec::new();
    visit(top, src, package, &[], None, &mut out);
    out
}

/// Find a declaration by its path of simple names
fn find_decl<'t>(root: Node<'t>, src: &str, path: &[String]) -> Option<Node<'t>> {
    let mut cursor = root.walk();
    let mut candidates: Vec<Node<'t>> = root.named_children(&mut cursor).collect();
    for (depth, name) in path.iter().enumerate() {
        let found = candidates
            .into_iter()
            .find(|n| decl_kind(n.kind()).is_some() && decl_name(*n, src) == Some(name.as_str()))?;
        if depth + 1 == path.len() {
            return Some(found);
        }
        candidates = members(found.child_by_field_name("body")?);
    }
    None
}

/// Erased parameter types of a `formal_parameters` node
///
/// Varargs count as one more array dimension, as do C-style dimensions on
/// the parameter name. `None` if any type cannot be read.
fn parameter_types(params: Node<'_>, src: &str) -> Option<Vec<WrittenType>> {
    let mut cursor = params.walk();
    let mut out = Vec::new();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => {
                let ty = WrittenType::from_node(param.child_by_field_name("type")?, src)?;
                let extra = param
                    .child_by_field_name("dimensions")
                    .map(|d| count_dims(node_text(d, src)))
                    .unwrap_or(0);
                out.push(ty.with_dims(extra));
            }
            "spread_parameter" => {
                let mut inner = param.walk();
                let ty_node = param.named_children(&mut inner).find(|c| {
                    !matches!(
                        c.kind(),
                        "modifiers" | "variable_declarator" | "annotation" | "marker_annotation"
                    )
                })?;
                out.push(WrittenType::from_node(ty_node, src)?.with_dims(1));
            }
            _ => {}
        }
    }
    Some(out)
}

/// Constructors visible on a class or record declaration
struct Constructors {
    /// Declared constructors; `None` where a parameter type was unreadable
    explicit: Vec<Option<Vec<WrittenType>>>,
    /// Record component types
    canonical: Option<Vec<WrittenType>>,
    is_class: bool,
}

impl Constructors {
    fn of(decl: Node<'_>, src: &str) -> Self {
        let explicit = decl
            .child_by_field_name("body")
            .map(|body| {
                members(body)
                    .into_iter()
                    .filter(|m| m.kind() == "constructor_declaration")
                    .map(|m| {
                        m.child_by_field_name("parameters")
                            .and_then(|p| parameter_types(p, src))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let canonical = if decl.kind() == "record_declaration" {
            decl.child_by_field_name("parameters")
                .and_then(|p| parameter_types(p, src))
        } else {
            None
        };
        Self {
            explicit,
            canonical,
            is_class: decl.kind() == "class_declaration",
        }
    }

    fn count(&self, ctx: &UnitContext, signature: &[JavaType], known: &HashSet<String>) -> usize {
        let declared = self.explicit.iter().flatten();
        let mut count = declared
            .clone()
            .filter(|written| ctx.matches_all(written, signature, known))
            .count();

        // Implicit default constructor
        if self.is_class && self.explicit.is_empty() && signature.is_empty() {
            count += 1;
        }
        // Implicit (or compact) canonical constructor
        if let Some(canonical) = &self.canonical {
            let declared_canonical = declared.clone().any(|written| written == canonical);
            if !declared_canonical && ctx.matches_all(canonical, signature, known) {
                count += 1;
            }
        }
        count
    }
}

/// Where and how a new member is spliced into a type body
struct Insertion {
    offset: usize,
    prefix: &'static str,
    indent: String,
    suffix: String,
}

/// Leading whitespace of the line containing `pos`
fn line_indent(src: &str, pos: usize) -> String {
    let start = src[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    src[start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

/// Indentation before `pos` if only whitespace precedes it on its line
fn own_line_indent(src: &str, pos: usize) -> Option<String> {
    let start = src[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let lead = &src[start..pos];
    lead.chars()
        .all(|c| c == ' ' || c == '\t')
        .then(|| lead.to_string())
}

fn member_insertion(decl: Node<'_>, body: Node<'_>, src: &str, unit: &str) -> Option<Insertion> {
    let close = body.child(body.child_count().checked_sub(1)?)?;
    if close.kind() != "}" {
        return None;
    }
    let close_start = close.start_byte();
    let line_start = src[..close_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let own_line = src[line_start..close_start].trim().is_empty();
    let has_members = !members(body).is_empty();

    let base_indent = if own_line {
        src[line_start..close_start].to_string()
    } else {
        line_indent(src, decl.start_byte())
    };
    let indent = members(body)
        .first()
        .and_then(|m| own_line_indent(src, m.start_byte()))
        .unwrap_or_else(|| format!("{}{}", base_indent, unit));

    Some(if own_line {
        let blank_before = src[..line_start].ends_with("\n\n");
        Insertion {
            offset: line_start,
            prefix: if has_members && !blank_before { "\n" } else { "" },
            indent,
            suffix: String::new(),
        }
    } else {
        Insertion {
            offset: close_start,
            prefix: if has_members { "\n\n" } else { "\n" },
            indent,
            suffix: base_indent,
        }
    })
}

fn new_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    let language: Language = tree_sitter_java::LANGUAGE.into();
    parser.set_language(&language).map_err(|e| Error::SourceParse {
        path: "tree-sitter-java".to_string(),
        reason: e.to_string(),
    })?;
    Ok(parser)
}

struct SourceFile {
    path: PathBuf,
    /// POSIX path relative to the tree root
    name: String,
    original: Vec<u8>,
    /// Normalized text the tree was parsed from
    text: String,
    tree: Tree,
}

#[derive(Debug, Clone)]
struct TypeLocation {
    file: usize,
    kind: DeclKind,
    path: Vec<String>,
}

/// An in-memory, patchable model of a Java source tree
pub struct SourceTree {
    root: PathBuf,
    options: SourceOptions,
    parser: Parser,
    files: Vec<SourceFile>,
    types: HashMap<String, TypeLocation>,
    /// Dotted qualified names of every indexed type
    known: HashSet<String>,
}

impl SourceTree {
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with(root, SourceOptions::default())
    }

    pub fn load_with(root: &Path, options: SourceOptions) -> Result<Self> {
        let mut tree = Self {
            root: root.to_path_buf(),
            options,
            parser: new_parser()?,
            files: Vec::new(),
            types: HashMap::new(),
            known: HashSet::new(),
        };

        for item in WalkDir::new(root).sort_by_file_name() {
            let item = item.map_err(|e| {
                let at = e.path().unwrap_or(root).to_path_buf();
                Error::io(at, std::io::Error::from(e))
            })?;
            let is_java = item.path().extension().is_some_and(|ext| ext == "java");
            if item.file_type().is_file() && is_java {
                tree.add_file(item.path())?;
            }
        }

        info!(
            "Indexed {} types in {} source files under {}",
            tree.types.len(),
            tree.files.len(),
            root.display()
        );
        Ok(tree)
    }

    fn add_file(&mut self, path: &Path) -> Result<()> {
        let name = archive::path::entry_name(&self.root, path)?;
        let original = fs::read(path).map_err(|e| Error::io(path, e))?;
        let Ok(raw) = std::str::from_utf8(&original) else {
            warn!("Skipping {}: not valid UTF-8", name);
            return Ok(());
        };

        let text = printer::normalize(raw);
        let parsed = self.parser.parse(&text, None).ok_or_else(|| Error::SourceParse {
            path: name.clone(),
            reason: "parser produced no tree".to_string(),
        })?;

        let root = parsed.root_node();
        if root.has_error() {
            if self.options.strict {
                return Err(Error::SourceParse {
                    path: name,
                    reason: "syntax errors".to_string(),
                });
            }
            warn!("{} has syntax errors; its types cannot be patched", name);
        }

        let index = self.files.len();
        let package = imports::package_name(root, &text);
        for decl in declared_types(root, &text, &package) {
            if self.types.contains_key(&decl.binary) {
                warn!("{} declared again in {}; keeping the first", decl.binary, name);
                continue;
            }
            self.known.insert(decl.binary.replace('$', "."));
            self.types.insert(
                decl.binary,
                TypeLocation {
                    file: index,
                    kind: decl.kind,
                    path: decl.path,
                },
            );
        }

        debug!("Parsed {}", name);
        self.files.push(SourceFile {
            path: path.to_path_buf(),
            name,
            original,
            text,
            tree: parsed,
        });
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of parsed `.java` files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Whether a type with this binary name is declared in the tree
    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Current (normalized, possibly patched) text of a file
    pub fn text(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.text.as_str())
    }

    fn location(&self, handle: &str) -> Result<&TypeLocation> {
        self.types.get(handle).ok_or_else(|| Error::SourceParse {
            path: handle.to_string(),
            reason: "type is not indexed".to_string(),
        })
    }

    fn declaration<'a>(&'a self, location: &TypeLocation) -> Result<(&'a SourceFile, Node<'a>)> {
        let file = &self.files[location.file];
        let decl = find_decl(file.tree.root_node(), &file.text, &location.path).ok_or_else(|| {
            Error::SourceParse {
                path: file.name.clone(),
                reason: format!("declaration {} not found", location.path.join(".")),
            }
        })?;
        Ok((file, decl))
    }

    /// Write every file whose normalized or patched text differs from disk
    ///
    /// Returns the number of files written.
    pub fn write_back(&self) -> Result<usize> {
        let mut written = 0;
        for file in &self.files {
            if file.text.as_bytes() != file.original.as_slice() {
                fs::write(&file.path, &file.text).map_err(|e| Error::io(&file.path, e))?;
                debug!("Wrote {}", file.name);
                written += 1;
            }
        }
        info!("Regenerated {} of {} source files", written, self.files.len());
        Ok(written)
    }
}

impl TypeStore for SourceTree {
    /// Binary name of the declaration
    type Handle = String;

    fn find_type(&mut self, name: &str) -> Result<Option<TypeRef<String>>> {
        let Some(location) = self.types.get(name) else {
            return Ok(None);
        };
        let file = &self.files[location.file];
        if file.tree.root_node().has_error() {
            return Err(Error::SourceParse {
                path: file.name.clone(),
                reason: format!("syntax errors in the file declaring {}", name),
            });
        }
        Ok(Some(TypeRef {
            handle: name.to_string(),
            kind: location.kind,
        }))
    }

    fn count_constructors(&self, handle: &String, signature: &[JavaType]) -> Result<usize> {
        let location = self.location(handle)?;
        let (file, decl) = self.declaration(location)?;
        let ctx = UnitContext::within(file.tree.root_node(), &file.text, &location.path);
        Ok(Constructors::of(decl, &file.text).count(&ctx, signature, &self.known))
    }

    fn add_constructor(&mut self, handle: &String, spec: &PatchSpec) -> Result<()> {
        let location = self.location(handle)?.clone();
        let (file_name, patched) = {
            let (file, decl) = self.declaration(&location)?;
            let src = file.text.as_str();
            let parse_error = |reason: &str| Error::SourceParse {
                path: file.name.clone(),
                reason: format!("{}: {}", handle, reason),
            };

            let body = decl
                .child_by_field_name("body")
                .ok_or_else(|| parse_error("declaration has no body"))?;
            let insertion = member_insertion(decl, body, src, &self.options.indent_unit)
                .ok_or_else(|| parse_error("type body is not closed"))?;

            let ctx = UnitContext::within(file.tree.root_node(), src, &location.path);
            let mut pending = BTreeSet::new();
            let types: Vec<String> = spec
                .parameters()
                .iter()
                .map(|p| ctx.render(&p.ty, &self.known, self.options.auto_import, &mut pending))
                .collect();

            let class_name = location.path.last().map(String::as_str).unwrap_or_default();
            let mut member = render::constructor(
                spec,
                class_name,
                &types,
                &insertion.indent,
                &self.options.indent_unit,
            );
            let ctors = Constructors::of(decl, src);
            if ctors.is_class && ctors.explicit.is_empty() && spec.delegate().is_empty() {
                let access = modifier_keywords(decl, src)
                    .into_iter()
                    .find(|m| matches!(*m, "public" | "protected" | "private"));
                let default = render::default_constructor(class_name, access, &insertion.indent);
                debug!("Writing out the implicit default constructor of {}", handle);
                member = format!("{}\n{}", default, member);
            }

            let mut edits = vec![(
                insertion.offset,
                format!("{}{}{}", insertion.prefix, member, insertion.suffix),
            )];
            if !pending.is_empty() {
                let lines: Vec<String> = pending.iter().map(|q| render::import(q)).collect();
                let block = lines.join("\n");
                edits.push(match ctx.anchor() {
                    ImportAnchor::AfterImports(end) => (end, format!("\n{}", block)),
                    ImportAnchor::AfterPackage(end) => (end, format!("\n\n{}", block)),
                    ImportAnchor::Start => (0, format!("{}\n\n", block)),
                });
                debug!("Importing {} into {}", lines.join(" "), file.name);
            }

            edits.sort_by(|a, b| b.0.cmp(&a.0));
            let mut patched = src.to_string();
            for (offset, text) in edits {
                patched.insert_str(offset, &text);
            }
            (file.name.clone(), printer::normalize(&patched))
        };

        let tree = self
            .parser
            .parse(&patched, None)
            .filter(|t| !t.root_node().has_error())
            .ok_or_else(|| Error::SourceParse {
                path: file_name.clone(),
                reason: format!("{}: patched source does not parse", handle),
            })?;

        let file = &mut self.files[location.file];
        file.text = patched;
        file.tree = tree;
        debug!("Added constructor to {} in {}", handle, file_name);
        Ok(())
    }
}

/// Patch the source tree under `root` in place
pub fn patch_source_tree(root: &Path, patches: &PatchSet) -> Result<Vec<AppliedPatch>> {
    let mut tree = SourceTree::load(root)?;
    let applied = apply_all(&mut tree, patches)?;
    tree.write_back()?;
    Ok(applied)
}

/// Empty (or create) a working directory
pub fn prepare_work_dir(dir: &Path) -> Result<()> {
    if dir.parent().is_none() {
        return Err(Error::InvalidPath(format!(
            "refusing to use {} as a working directory",
            dir.display()
        )));
    }
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    Ok(())
}

/// Extract a sources jar, patch it and pack the result to `output`
///
/// `work_dir` receives the expanded tree and is emptied first; without one
/// a temporary directory is used and removed afterwards.
pub fn patch_sources_jar(
    input: &Path,
    work_dir: Option<&Path>,
    output: &Path,
    patches: &PatchSet,
) -> Result<Vec<AppliedPatch>> {
    let temp;
    let dir = match work_dir {
        Some(dir) => dir,
        None => {
            temp = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
            temp.path()
        }
    };

    info!("Patching sources in {}", input.display());
    prepare_work_dir(dir)?;
    archive::extract(input, dir)?;
    let applied = patch_source_tree(dir, patches)?;
    archive::pack(dir, output)?;
    Ok(applied)
}
