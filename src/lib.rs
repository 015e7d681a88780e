// src/lib.rs

//! ctorgraft
//!
//! Adds delegating constructors to a prebuilt JVM library, in both of its
//! artifacts: the compiled jar and the sources jar. One patch list drives
//! both pipelines, so the classes and the sources expose the same new
//! constructors.
//!
//! # Architecture
//!
//! - `spec`: validated patch lists (TOML or built-in presets)
//! - `patcher`: lookup and idempotency rules shared by both pipelines,
//!   over the [`TypeStore`] trait
//! - `classfile` + `binary`: class file codec, bytecode synthesis, jar store
//! - `source`: tree-sitter model of a Java source tree, import-aware
//!   matching, constructor rendering, deterministic printing
//! - `archive`: zip extraction and packing with atomic output
//! - `consistency`: agreement check between the two pipelines and publishing
//!   of both outputs together

pub mod archive;
pub mod binary;
pub mod classfile;
pub mod consistency;
pub mod descriptor;
mod error;
pub mod patcher;
pub mod source;
pub mod spec;

pub use binary::{JarStore, patch_jar};
pub use consistency::{PairResults, patch_pair};
pub use descriptor::JavaType;
pub use error::{Error, ErrorKind, Result};
pub use patcher::{AppliedPatch, DeclKind, Outcome, TypeStore, apply_all, apply_patch};
pub use source::{SourceOptions, SourceTree, patch_source_tree, patch_sources_jar};
pub use spec::{Parameter, PatchSet, PatchSpec};
