// src/source/imports.rs

//! Name resolution inside one compilation unit
//!
//! Sources are parsed without a classpath, so a written type name is
//! matched against an expected qualified name rather than resolved to a
//! single answer. Scopes are tried in Java's order: the file's top-level
//! types and the member types of enclosing declarations, single-type
//! imports, the file's own package, then `java.lang` and on-demand imports. A single-type import with the same simple name as the
//! expected type but a different qualified name shadows everything after it.

use crate::descriptor::{JavaType, Primitive};
use std::collections::{BTreeSet, HashMap, HashSet};
use tree_sitter::Node;

/// Type name as written in source, generic arguments and annotations erased
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrittenType {
    Primitive(Primitive),
    /// Dotted name exactly as written (`Path`, `Map.Entry`, `java.nio.file.Path`)
    Named(String),
    Array(Box<WrittenType>),
}

impl WrittenType {
    /// Read a type node; `None` for anything that is not a type
    pub fn from_node(node: Node<'_>, src: &str) -> Option<Self> {
        match node.kind() {
            "integral_type" | "floating_point_type" | "boolean_type" => {
                Primitive::from_keyword(text(node, src).trim()).map(Self::Primitive)
            }
            "type_identifier" | "scoped_type_identifier" | "generic_type" => {
                type_name(node, src).map(Self::Named)
            }
            "array_type" => {
                let element = Self::from_node(node.child_by_field_name("element")?, src)?;
                let dims = node
                    .child_by_field_name("dimensions")
                    .map(|d| count_dims(text(d, src)))
                    .unwrap_or(1);
                Some(element.with_dims(dims))
            }
            "annotated_type" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .filter(|c| !is_annotation(*c))
                    .last()?;
                Self::from_node(inner, src)
            }
            _ => None,
        }
    }

    /// Wrap in `dims` array dimensions
    pub fn with_dims(self, dims: usize) -> Self {
        (0..dims).fold(self, |t, _| Self::Array(Box::new(t)))
    }
}

fn text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    src.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

fn is_annotation(node: Node<'_>) -> bool {
    matches!(node.kind(), "annotation" | "marker_annotation")
}

/// Number of `[]` pairs in a dimensions node
pub fn count_dims(dimensions: &str) -> usize {
    dimensions.matches('[').count()
}

/// Dotted name of a class type node with type arguments dropped
fn type_name(node: Node<'_>, src: &str) -> Option<String> {
    match node.kind() {
        "type_identifier" => Some(text(node, src).to_string()),
        "scoped_type_identifier" => {
            let mut cursor = node.walk();
            let parts = node
                .named_children(&mut cursor)
                .filter(|c| !is_annotation(*c))
                .map(|c| type_name(c, src))
                .collect::<Option<Vec<_>>>()?;
            (!parts.is_empty()).then(|| parts.join("."))
        }
        "generic_type" => {
            let mut cursor = node.walk();
            let base = node
                .named_children(&mut cursor)
                .find(|c| matches!(c.kind(), "type_identifier" | "scoped_type_identifier"))?;
            type_name(base, src)
        }
        _ => None,
    }
}

/// Last segment of a dotted or binary name
pub fn simple_name(name: &str) -> &str {
    name.rsplit(['.', '$']).next().unwrap_or(name)
}

/// Package part of a dotted top-level name, empty for the default package
fn package_of(qualified: &str) -> &str {
    qualified.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Where a new import declaration goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportAnchor {
    /// End of the last existing import
    AfterImports(usize),
    /// End of the package declaration
    AfterPackage(usize),
    /// Start of the file
    Start,
}

/// Names visible in one compilation unit
#[derive(Debug, Clone)]
pub struct UnitContext {
    package: String,
    /// Qualified (dotted) single-type imports
    single: Vec<String>,
    /// Packages or types imported on demand
    on_demand: Vec<String>,
    /// Simple name -> dotted qualified name of types declared in this file
    declared: HashMap<String, String>,
    /// Every simple type identifier written anywhere in the file
    used: HashSet<String>,
    anchor: ImportAnchor,
}

impl UnitContext {
    /// Collect package, imports and top-level declarations of a parsed `program`
    pub fn from_tree(root: Node<'_>, src: &str) -> Self {
        Self::within(root, src, &[])
    }

    /// Names visible inside the type declared at `scope`
    ///
    /// `scope` is the path of simple names from a top-level type down.
    /// Member types are in scope only inside their enclosing declarations,
    /// and a nearer member shadows a farther one of the same simple name.
    /// Inherited member types are not seen without a classpath.
    pub fn within(root: Node<'_>, src: &str, scope: &[String]) -> Self {
        let mut ctx = Self {
            package: String::new(),
            single: Vec::new(),
            on_demand: Vec::new(),
            declared: HashMap::new(),
            used: HashSet::new(),
            anchor: ImportAnchor::Start,
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => {
                    ctx.package = qualified_name_of(child, src).unwrap_or_default();
                    ctx.anchor = ImportAnchor::AfterPackage(child.end_byte());
                }
                "import_declaration" => {
                    ctx.anchor = ImportAnchor::AfterImports(child.end_byte());
                    ctx.add_import(child, src);
                }
                _ => {}
            }
        }

        let mut visible: HashMap<String, (usize, String)> = HashMap::new();
        for decl in super::declared_types(root, src, &ctx.package) {
            let depth = decl.path.len() - 1;
            if !scope.starts_with(&decl.path[..depth]) {
                continue;
            }
            let simple = simple_name(&decl.binary).to_string();
            let nearer = visible.get(&simple).is_none_or(|(seen, _)| depth > *seen);
            if nearer {
                visible.insert(simple, (depth, decl.binary.replace('$', ".")));
            }
        }
        ctx.declared = visible
            .into_iter()
            .map(|(simple, (_, qualified))| (simple, qualified))
            .collect();
        collect_identifiers(root, src, &mut ctx.used);
        ctx
    }

    fn add_import(&mut self, node: Node<'_>, src: &str) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        if children.iter().any(|c| c.kind() == "static") {
            return;
        }
        let Some(name) = qualified_name_of(node, src) else {
            return;
        };
        if children.iter().any(|c| c.kind() == "asterisk") {
            self.on_demand.push(name);
        } else {
            self.single.push(name);
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn anchor(&self) -> ImportAnchor {
        self.anchor
    }

    /// Whether `written` can denote `expected` in this unit
    pub fn matches(&self, written: &WrittenType, expected: &JavaType, known: &HashSet<String>) -> bool {
        match (written, expected) {
            (WrittenType::Primitive(a), JavaType::Primitive(b)) => a == b,
            (WrittenType::Array(a), JavaType::Array(b)) => self.matches(a, b, known),
            (WrittenType::Named(name), JavaType::Class(binary)) => {
                self.names(name, &binary.replace('$', "."), known)
            }
            _ => false,
        }
    }

    /// Whether every written parameter type matches, position by position
    pub fn matches_all(
        &self,
        written: &[WrittenType],
        expected: &[JavaType],
        known: &HashSet<String>,
    ) -> bool {
        written.len() == expected.len()
            && written
                .iter()
                .zip(expected)
                .all(|(w, e)| self.matches(w, e, known))
    }

    /// Whether the dotted `name` can refer to the dotted `qualified` type
    fn names(&self, name: &str, qualified: &str, known: &HashSet<String>) -> bool {
        let (first, rest) = match name.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        let extend = |base: &str| match rest {
            Some(rest) => format!("{}.{}", base, rest),
            None => base.to_string(),
        };

        if let Some(declared) = self.declared.get(first) {
            return extend(declared) == qualified;
        }
        if let Some(import) = self.single.iter().find(|i| simple_name(i) == first) {
            return extend(import) == qualified;
        }
        if rest.is_some() && name == qualified {
            return true;
        }

        let in_package = join(&self.package, first);
        if known.contains(&in_package) {
            return extend(&in_package) == qualified;
        }

        std::iter::once(in_package)
            .chain(std::iter::once(format!("java.lang.{}", first)))
            .chain(self.on_demand.iter().map(|p| format!("{}.{}", p, first)))
            .any(|candidate| extend(&candidate) == qualified)
    }

    /// What the simple name of `qualified` refers to, when that is certain
    fn certain_meaning(&self, simple: &str, pending: &BTreeSet<String>, known: &HashSet<String>) -> Option<String> {
        if let Some(declared) = self.declared.get(simple) {
            return Some(declared.clone());
        }
        if let Some(import) = self
            .single
            .iter()
            .chain(pending.iter())
            .find(|i| simple_name(i) == simple)
        {
            return Some(import.clone());
        }
        let in_package = join(&self.package, simple);
        known.contains(&in_package).then_some(in_package)
    }

    /// Source spelling for `ty`, importing it when that is safe
    ///
    /// Returns the simple name when the unit already resolves it to `ty`.
    /// Otherwise, when the simple name is unused in the file, an import is
    /// queued in `pending`. On a clash the qualified name is written out.
    pub fn render(
        &self,
        ty: &JavaType,
        known: &HashSet<String>,
        auto_import: bool,
        pending: &mut BTreeSet<String>,
    ) -> String {
        let binary = match ty {
            JavaType::Primitive(p) => return p.keyword().to_string(),
            JavaType::Array(element) => {
                return format!("{}[]", self.render(element, known, auto_import, pending));
            }
            JavaType::Class(binary) => binary,
        };

        let qualified = binary.replace('$', ".");
        let simple = simple_name(binary);

        if let Some(meaning) = self.certain_meaning(simple, pending, known) {
            return if meaning == qualified {
                simple.to_string()
            } else {
                qualified
            };
        }

        let top_level = !binary.contains('$');
        let package = package_of(&qualified);
        if top_level && (package == self.package || package == "java.lang") {
            return simple.to_string();
        }

        if self.used.contains(simple) {
            let on_demand = top_level && self.on_demand.iter().any(|p| p == package);
            return if on_demand { simple.to_string() } else { qualified };
        }

        if auto_import {
            pending.insert(qualified);
            simple.to_string()
        } else {
            qualified
        }
    }
}

/// Package declared by a parsed `program`, empty for the default package
pub fn package_name(root: Node<'_>, src: &str) -> String {
    let mut cursor = root.walk();
    let package = root
        .named_children(&mut cursor)
        .find(|c| c.kind() == "package_declaration");
    package
        .and_then(|p| qualified_name_of(p, src))
        .unwrap_or_default()
}

/// Dotted name held by a package or import declaration
fn qualified_name_of(node: Node<'_>, src: &str) -> Option<String> {
    let mut cursor = node.walk();
    let name = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))?;
    let raw = text(name, src);
    Some(raw.split_whitespace().collect::<String>())
}

fn collect_identifiers(node: Node<'_>, src: &str, out: &mut HashSet<String>) {
    if node.kind() == "type_identifier" {
        out.insert(text(node, src).to_string());
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_identifiers(child, src, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
        parser.set_language(&language).unwrap();
        parser.parse(src, None).unwrap()
    }

    fn ty(name: &str) -> JavaType {
        JavaType::parse(name).unwrap()
    }

    const UNIT: &str = r#"package org.example;

import java.nio.file.Path;
import java.util.*;
import static java.util.Objects.requireNonNull;

public class Widget {
    static class Handler {}
    Widget(Map<String, Path> m) {}
}
"#;

    fn known() -> HashSet<String> {
        ["org.example.Widget", "org.example.Widget.Handler", "org.example.Helper"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn in_widget(tree: &tree_sitter::Tree) -> UnitContext {
        UnitContext::within(tree.root_node(), UNIT, &["Widget".to_string()])
    }

    #[test]
    fn test_context_collects_package_and_imports() {
        let tree = parse(UNIT);
        let ctx = in_widget(&tree);
        assert_eq!(ctx.package(), "org.example");
        assert_eq!(ctx.single, vec!["java.nio.file.Path"]);
        assert_eq!(ctx.on_demand, vec!["java.util"]);
        assert!(matches!(ctx.anchor(), ImportAnchor::AfterImports(_)));
        assert!(ctx.used.contains("Map"));
    }

    #[test]
    fn test_matching_through_scopes() {
        let tree = parse(UNIT);
        let ctx = in_widget(&tree);
        let known = known();
        let named = |n: &str| WrittenType::Named(n.to_string());

        assert!(ctx.matches(&named("Path"), &ty("java.nio.file.Path"), &known));
        assert!(!ctx.matches(&named("Path"), &ty("org.example.Path"), &known));
        assert!(ctx.matches(&named("java.nio.file.Path"), &ty("java.nio.file.Path"), &known));
        assert!(ctx.matches(&named("Handler"), &ty("org.example.Widget$Handler"), &known));
        assert!(ctx.matches(&named("Helper"), &ty("org.example.Helper"), &known));
        assert!(ctx.matches(&named("String"), &ty("java.lang.String"), &known));
        assert!(ctx.matches(&named("Map"), &ty("java.util.Map"), &known));
        assert!(ctx.matches(&named("Map.Entry"), &ty("java.util.Map$Entry"), &known));
        assert!(!ctx.matches(&named("Map"), &ty("java.util.concurrent.Map"), &known));
        assert!(ctx.matches(
            &WrittenType::Array(Box::new(named("Path"))),
            &ty("java.nio.file.Path[]"),
            &known
        ));
        assert!(!ctx.matches(&named("Path"), &ty("java.nio.file.Path[]"), &known));
    }

    #[test]
    fn test_render_choices() {
        let tree = parse(UNIT);
        let ctx = in_widget(&tree);
        let known = known();
        let mut pending = BTreeSet::new();

        assert_eq!(ctx.render(&ty("java.nio.file.Path"), &known, true, &mut pending), "Path");
        assert_eq!(ctx.render(&ty("long"), &known, true, &mut pending), "long");
        assert_eq!(ctx.render(&ty("java.lang.String[]"), &known, true, &mut pending), "String[]");
        assert_eq!(ctx.render(&ty("org.example.Widget$Handler"), &known, true, &mut pending), "Handler");
        assert_eq!(ctx.render(&ty("java.util.Map"), &known, true, &mut pending), "Map");
        assert!(pending.is_empty());

        assert_eq!(
            ctx.render(&ty("java.util.concurrent.ThreadFactory"), &known, true, &mut pending),
            "ThreadFactory"
        );
        assert!(pending.contains("java.util.concurrent.ThreadFactory"));

        // Clashes with the imported java.nio.file.Path
        assert_eq!(ctx.render(&ty("other.Path"), &known, true, &mut pending), "other.Path");
        // Map is already used through java.util.*
        assert_eq!(ctx.render(&ty("other.Map"), &known, true, &mut pending), "other.Map");
        // No auto-import: qualified
        let mut none = BTreeSet::new();
        assert_eq!(
            ctx.render(&ty("java.time.Duration"), &known, false, &mut none),
            "java.time.Duration"
        );
    }

    #[test]
    fn test_member_types_scoped_to_enclosing_declaration() {
        let src = "package p;\nimport other.X;\nclass A { class X {} static class Y { class X {} } }\nclass B { B(X x) {} }\n";
        let tree = parse(src);
        let root = tree.root_node();
        let known: HashSet<String> = ["p.A", "p.A.X", "p.A.Y", "p.A.Y.X", "p.B"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let x = WrittenType::Named("X".to_string());
        let scope = |path: &[&str]| {
            let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
            UnitContext::within(root, src, &path)
        };

        let in_b = scope(&["B"]);
        assert!(in_b.matches(&x, &ty("other.X"), &known));
        assert!(!in_b.matches(&x, &ty("p.A$X"), &known));

        let in_a = scope(&["A"]);
        assert!(in_a.matches(&x, &ty("p.A$X"), &known));
        assert!(!in_a.matches(&x, &ty("other.X"), &known));

        // nearest enclosing member wins
        let in_y = scope(&["A", "Y"]);
        assert!(in_y.matches(&x, &ty("p.A$Y$X"), &known));
        let mut pending = BTreeSet::new();
        assert_eq!(in_y.render(&ty("p.A$X"), &known, true, &mut pending), "p.A.X");
        assert_eq!(in_b.render(&ty("other.X"), &known, true, &mut pending), "X");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_written_type_from_parameters() {
        let src = "class A { A(final java.util.List<String>[] xs, Map.Entry<K, V> e, int... n) {} }";
        let tree = parse(src);
        let mut found = Vec::new();
        fn walk(node: Node<'_>, src: &str, out: &mut Vec<WrittenType>) {
            if node.kind() == "formal_parameter" {
                let ty = node.child_by_field_name("type").unwrap();
                out.push(WrittenType::from_node(ty, src).unwrap());
            }
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(child, src, out);
            }
        }
        walk(tree.root_node(), src, &mut found);
        assert_eq!(
            found,
            vec![
                WrittenType::Array(Box::new(WrittenType::Named("java.util.List".to_string()))),
                WrittenType::Named("Map.Entry".to_string()),
            ]
        );
    }
}
