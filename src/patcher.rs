// src/patcher.rs

//! Patch application shared by the binary and source pipelines
//!
//! A pipeline exposes its loaded artifact as a [`TypeStore`]: something that
//! can find a type declaration by qualified name, count constructors with a
//! given erased signature, and add a delegating constructor. The lookup
//! order and failure rules live here once, so both artifacts are judged the
//! same way.

use crate::descriptor::{JavaType, display_signature};
use crate::error::{Error, Result};
use crate::spec::{PatchSet, PatchSpec};
use std::fmt;
use tracing::info;

/// Kind of a type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    /// A non-static nested class; its constructors take the enclosing instance
    Inner,
    Record,
    Interface,
    Enum,
    Annotation,
    Module,
}

impl DeclKind {
    /// Whether a constructor can be added to a declaration of this kind
    pub fn accepts_constructors(&self) -> bool {
        matches!(self, Self::Class | Self::Record)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Class => "class",
            Self::Inner => "inner (non-static) class",
            Self::Record => "record",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Annotation => "annotation",
            Self::Module => "module",
        };
        f.write_str(name)
    }
}

/// A located type declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef<H> {
    pub handle: H,
    pub kind: DeclKind,
}

/// A loaded artifact that patches can be applied to
pub trait TypeStore {
    /// Store-specific reference to one declaration
    type Handle;

    /// Locate a type by qualified binary name (`pkg.Outer$Inner`)
    fn find_type(&mut self, name: &str) -> Result<Option<TypeRef<Self::Handle>>>;

    /// Number of constructors of `handle` whose erased parameter types are
    /// exactly `signature`
    fn count_constructors(&self, handle: &Self::Handle, signature: &[JavaType]) -> Result<usize>;

    /// Add the constructor described by `spec` to `handle`
    fn add_constructor(&mut self, handle: &Self::Handle, spec: &PatchSpec) -> Result<()>;
}

/// What applying a patch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Added,
    /// The new signature was already declared; nothing was changed
    AlreadyPresent,
}

/// Record of one applied patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    pub patch: String,
    pub target: String,
    pub signature: Vec<JavaType>,
    pub delegate: Vec<JavaType>,
    pub outcome: Outcome,
}

impl fmt::Display for AppliedPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.outcome {
            Outcome::Added => "added",
            Outcome::AlreadyPresent => "already present",
        };
        write!(
            f,
            "{}{} -> this{} ({})",
            self.target,
            display_signature(&self.signature),
            display_signature(&self.delegate),
            verb
        )
    }
}

/// Apply one patch to a store
///
/// The delegate is resolved before the idempotency check, so a patch whose
/// delegate vanished upstream fails even when its constructor is present.
pub fn apply_patch<S: TypeStore>(store: &mut S, spec: &PatchSpec) -> Result<AppliedPatch> {
    let patch = spec.label().to_string();
    let target = spec.target().to_string();

    let found = store.find_type(&target)?.ok_or_else(|| Error::TypeNotFound {
        patch: patch.clone(),
        type_name: target.clone(),
    })?;
    if !found.kind.accepts_constructors() {
        return Err(Error::NotAClass {
            patch,
            type_name: target,
            kind: found.kind.to_string(),
        });
    }

    let delegates = store.count_constructors(&found.handle, spec.delegate())?;
    match delegates {
        0 => {
            return Err(Error::DelegateNotFound {
                patch,
                type_name: target,
                signature: display_signature(spec.delegate()),
            });
        }
        1 => {}
        count => {
            return Err(Error::AmbiguousDelegate {
                patch,
                type_name: target,
                signature: display_signature(spec.delegate()),
                count,
            });
        }
    }

    let signature = spec.signature();
    let outcome = if store.count_constructors(&found.handle, &signature)? > 0 {
        Outcome::AlreadyPresent
    } else {
        store.add_constructor(&found.handle, spec)?;
        Outcome::Added
    };

    Ok(AppliedPatch {
        patch,
        target,
        signature,
        delegate: spec.delegate().to_vec(),
        outcome,
    })
}

/// Apply every patch in order, stopping at the first failure
pub fn apply_all<S: TypeStore>(store: &mut S, patches: &PatchSet) -> Result<Vec<AppliedPatch>> {
    let mut applied = Vec::with_capacity(patches.len());
    for spec in patches.iter() {
        let result = apply_patch(store, spec)?;
        match result.outcome {
            Outcome::Added => info!("Patch '{}': {}", result.patch, result),
            Outcome::AlreadyPresent => {
                info!("Patch '{}': {}, skipping", result.patch, result)
            }
        }
        applied.push(result);
    }
    Ok(applied)
}
