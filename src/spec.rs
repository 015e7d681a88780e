// src/spec.rs

//! Patch specifications and patch list loading
//!
//! A patch list is plain configuration: a TOML file of `[[patch]]` tables
//! or one of the presets compiled into the binary. Each entry is validated
//! once when it is built, so both pipelines work from the same checked
//! description.
//!
//! ```toml
//! [[patch]]
//! name = "watchdog"
//! target = "org.apache.commons.exec.ExecuteWatchdog"
//! delegate = ["java.util.concurrent.ThreadFactory", "java.time.Duration"]
//! arguments = [1, 0]
//!
//! [[patch.parameters]]
//! type = "java.time.Duration"
//! name = "timeout"
//! doc = "The timeout for the process."
//!
//! [[patch.parameters]]
//! type = "java.util.concurrent.ThreadFactory"
//! name = "threadFactory"
//! ```

use crate::descriptor::{JavaType, display_signature, is_java_identifier};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Java keywords that cannot name a parameter
const RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while", "true", "false", "null", "_",
];

/// One parameter of a synthesized constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub ty: JavaType,
    pub name: String,
    /// Javadoc text for `@param`; empty when undocumented
    pub doc: String,
}

impl Parameter {
    pub fn new(ty: JavaType, name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            doc: doc.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameter {
    #[serde(rename = "type")]
    ty: String,
    name: String,
    #[serde(default)]
    doc: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPatchSpec {
    #[serde(default)]
    name: Option<String>,
    target: String,
    #[serde(default)]
    delegate: Vec<String>,
    #[serde(default)]
    parameters: Vec<RawParameter>,
    #[serde(default)]
    arguments: Vec<usize>,
}

/// A validated description of one constructor to add
///
/// The new constructor takes `parameters` in order and forwards
/// `arguments` (indices into `parameters`) to the existing constructor
/// whose parameter types are exactly `delegate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPatchSpec")]
pub struct PatchSpec {
    name: Option<String>,
    target: String,
    delegate: Vec<JavaType>,
    parameters: Vec<Parameter>,
    arguments: Vec<usize>,
}

impl TryFrom<RawPatchSpec> for PatchSpec {
    type Error = Error;

    fn try_from(raw: RawPatchSpec) -> Result<Self> {
        let delegate = raw
            .delegate
            .iter()
            .map(|name| parse_type(&raw.target, name))
            .collect::<Result<Vec<_>>>()?;
        let parameters = raw
            .parameters
            .into_iter()
            .map(|p| Ok(Parameter::new(parse_type(&raw.target, &p.ty)?, p.name, p.doc)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(raw.name, raw.target, delegate, parameters, raw.arguments)
    }
}

fn parse_type(target: &str, name: &str) -> Result<JavaType> {
    JavaType::parse(name).ok_or_else(|| {
        Error::InvalidSpec(format!(
            "{}: '{}' is not a primitive or fully qualified type name",
            target, name
        ))
    })
}

impl PatchSpec {
    /// Build and validate a patch specification
    pub fn new(
        name: Option<String>,
        target: impl Into<String>,
        delegate: Vec<JavaType>,
        parameters: Vec<Parameter>,
        arguments: Vec<usize>,
    ) -> Result<Self> {
        let spec = Self {
            name,
            target: target.into(),
            delegate,
            parameters,
            arguments,
        };
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        let label = self.label();
        let invalid = |reason: String| Error::InvalidSpec(format!("{}: {}", label, reason));

        match JavaType::parse(&self.target) {
            Some(JavaType::Class(_)) => {}
            _ => return Err(invalid(format!("target '{}' is not a qualified class name", self.target))),
        }

        let mut seen_names = HashSet::new();
        for param in &self.parameters {
            if !is_java_identifier(&param.name) || RESERVED.contains(&param.name.as_str()) {
                return Err(invalid(format!("'{}' is not a valid parameter name", param.name)));
            }
            if !seen_names.insert(param.name.as_str()) {
                return Err(invalid(format!("parameter '{}' declared twice", param.name)));
            }
        }

        if self.arguments.len() != self.delegate.len() {
            return Err(invalid(format!(
                "{} forwarded arguments for a delegate taking {}",
                self.arguments.len(),
                self.delegate.len()
            )));
        }

        let mut seen_indices = HashSet::new();
        for (position, &index) in self.arguments.iter().enumerate() {
            let param = self.parameters.get(index).ok_or_else(|| {
                invalid(format!(
                    "argument index {} out of range for {} parameters",
                    index,
                    self.parameters.len()
                ))
            })?;
            if !seen_indices.insert(index) {
                return Err(invalid(format!("parameter index {} forwarded twice", index)));
            }
            if param.ty != self.delegate[position] {
                return Err(invalid(format!(
                    "argument {} forwards '{}' of type {} where the delegate expects {}",
                    position, param.name, param.ty, self.delegate[position]
                )));
            }
        }

        if self.signature() == self.delegate {
            return Err(invalid(format!(
                "new constructor {} would duplicate its delegate",
                display_signature(&self.delegate)
            )));
        }

        Ok(())
    }

    /// Name used in logs and error messages
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.target)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn delegate(&self) -> &[JavaType] {
        &self.delegate
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn arguments(&self) -> &[usize] {
        &self.arguments
    }

    /// Parameter types of the new constructor, in declared order
    pub fn signature(&self) -> Vec<JavaType> {
        self.parameters.iter().map(|p| p.ty.clone()).collect()
    }

    /// Forwarded parameters in the order the delegate receives them
    pub fn forwarded(&self) -> impl Iterator<Item = &Parameter> {
        self.arguments.iter().map(|&i| &self.parameters[i])
    }
}

/// An ordered list of patches, applied in sequence by both pipelines
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSet {
    #[serde(default, rename = "patch")]
    pub patches: Vec<PatchSpec>,
}

impl PatchSet {
    pub fn new(patches: Vec<PatchSpec>) -> Self {
        Self { patches }
    }

    /// Load a patch list from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    /// Parse a patch list from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let set: PatchSet = toml::from_str(content)?;
        if set.patches.is_empty() {
            return Err(Error::InvalidSpec("patch list is empty".to_string()));
        }
        Ok(set)
    }

    /// Look up a preset compiled into the binary
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "commons-exec" => Some(Self::commons_exec()),
            _ => None,
        }
    }

    /// Names accepted by [`PatchSet::preset`]
    pub fn preset_names() -> &'static [&'static str] {
        &["commons-exec"]
    }

    /// Constructors Apache Commons Exec hides behind its builders
    ///
    /// Adds `ExecuteWatchdog(Duration, ThreadFactory)` and
    /// `DefaultExecutor(Path, ThreadFactory, ExecuteStreamHandler)` so
    /// subclasses can reach the private-ish constructors directly.
    pub fn commons_exec() -> Self {
        const DURATION: &str = "java.time.Duration";
        const THREAD_FACTORY: &str = "java.util.concurrent.ThreadFactory";
        const PATH: &str = "java.nio.file.Path";
        const STREAM_HANDLER: &str = "org.apache.commons.exec.ExecuteStreamHandler";

        let ty = |name: &str| JavaType::Class(name.to_string());

        let watchdog = PatchSpec {
            name: Some("execute-watchdog".to_string()),
            target: "org.apache.commons.exec.ExecuteWatchdog".to_string(),
            delegate: vec![ty(THREAD_FACTORY), ty(DURATION)],
            parameters: vec![
                Parameter::new(
                    ty(DURATION),
                    "timeout",
                    "The timeout Duration for the process. It must be greater than 0 or {@code INFINITE_TIMEOUT_DURATION}.",
                ),
                Parameter::new(ty(THREAD_FACTORY), "threadFactory", "The thread factory."),
            ],
            arguments: vec![1, 0],
        };

        let executor = PatchSpec {
            name: Some("default-executor".to_string()),
            target: "org.apache.commons.exec.DefaultExecutor".to_string(),
            delegate: vec![ty(THREAD_FACTORY), ty(STREAM_HANDLER), ty(PATH)],
            parameters: vec![
                Parameter::new(ty(PATH), "workingDirectory", "The working directory of the process."),
                Parameter::new(ty(THREAD_FACTORY), "threadFactory", "The thread factory."),
                Parameter::new(
                    ty(STREAM_HANDLER),
                    "executeStreamHandler",
                    "Taking care of output and error stream.",
                ),
            ],
            arguments: vec![1, 2, 0],
        };

        Self::new(vec![watchdog, executor])
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchSpec> {
        self.patches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(name: &str) -> JavaType {
        JavaType::parse(name).unwrap()
    }

    fn widget_params() -> Vec<Parameter> {
        vec![
            Parameter::new(ty("java.nio.file.Path"), "dir", "The directory."),
            Parameter::new(ty("java.util.concurrent.ThreadFactory"), "tf", ""),
            Parameter::new(ty("pkg.Handler"), "h", ""),
        ]
    }

    #[test]
    fn test_subset_mapping_is_valid() {
        let spec = PatchSpec::new(
            None,
            "pkg.Widget",
            vec![ty("java.util.concurrent.ThreadFactory"), ty("pkg.Handler")],
            widget_params(),
            vec![1, 2],
        )
        .unwrap();
        assert_eq!(spec.label(), "pkg.Widget");
        let forwarded: Vec<&str> = spec.forwarded().map(|p| p.name.as_str()).collect();
        assert_eq!(forwarded, vec!["tf", "h"]);
    }

    #[test]
    fn test_mapping_type_mismatch_rejected() {
        let err = PatchSpec::new(
            None,
            "pkg.Widget",
            vec![ty("java.util.concurrent.ThreadFactory"), ty("pkg.Handler")],
            widget_params(),
            vec![2, 1],
        )
        .unwrap_err();
        assert!(err.to_string().contains("delegate expects"));
    }

    #[test]
    fn test_mapping_out_of_range_and_repeats_rejected() {
        let delegate = vec![ty("pkg.Handler"), ty("pkg.Handler")];
        let params = vec![Parameter::new(ty("pkg.Handler"), "h", "")];
        assert!(PatchSpec::new(None, "pkg.Widget", delegate.clone(), params.clone(), vec![0, 0]).is_err());
        assert!(PatchSpec::new(None, "pkg.Widget", delegate, params, vec![0, 3]).is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let params = vec![Parameter::new(ty("int"), "class", "")];
        assert!(PatchSpec::new(None, "pkg.Widget", vec![], params, vec![]).is_err());

        let params = vec![
            Parameter::new(ty("int"), "a", ""),
            Parameter::new(ty("long"), "a", ""),
        ];
        assert!(PatchSpec::new(None, "pkg.Widget", vec![], params, vec![]).is_err());

        assert!(PatchSpec::new(None, "Widget", vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_parse_toml_patch_list() {
        let toml = r#"
[[patch]]
name = "widget"
target = "pkg.Widget"
delegate = ["java.util.concurrent.ThreadFactory", "pkg.Handler"]
arguments = [1, 2]

[[patch.parameters]]
type = "java.nio.file.Path"
name = "dir"
doc = "The directory."

[[patch.parameters]]
type = "java.util.concurrent.ThreadFactory"
name = "tf"

[[patch.parameters]]
type = "pkg.Handler"
name = "h"
"#;
        let set = PatchSet::parse(toml).unwrap();
        assert_eq!(set.len(), 1);
        let spec = &set.patches[0];
        assert_eq!(spec.label(), "widget");
        assert_eq!(spec.parameters()[0].doc, "The directory.");
        assert_eq!(spec.parameters()[1].doc, "");
        assert_eq!(spec.arguments(), &[1, 2]);
    }

    #[test]
    fn test_parse_toml_rejects_unqualified_type() {
        let toml = r#"
[[patch]]
target = "pkg.Widget"
delegate = ["Handler"]
arguments = [0]

[[patch.parameters]]
type = "Handler"
name = "h"
"#;
        let err = PatchSet::parse(toml).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidSpec);
    }

    #[test]
    fn test_empty_patch_list_rejected() {
        assert!(PatchSet::parse("").is_err());
    }

    #[test]
    fn test_commons_exec_preset_validates() {
        let set = PatchSet::preset("commons-exec").unwrap();
        assert_eq!(set.len(), 2);
        for spec in set.iter() {
            spec.validate().unwrap();
        }
        assert!(PatchSet::preset("nope").is_none());
    }
}
