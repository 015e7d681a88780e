// src/cli/mod.rs
//! CLI definitions for ctorgraft
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `jar` - Add constructors to the classes of a jar
//! - `sources` - Add constructors to a sources jar
//! - `tree` - Add constructors to an expanded source tree in place
//! - `patch` - Run both pipelines and check they agree
//! - `check` - Validate and print a patch list

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ctorgraft")]
#[command(version)]
#[command(about = "Add delegating constructors to a compiled JVM library and its sources", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the patch list comes from
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct PatchArgs {
    /// TOML file of [[patch]] tables
    #[arg(short, long, value_name = "FILE")]
    pub patches: Option<PathBuf>,

    /// Built-in patch list (commons-exec)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add constructors to the classes of a jar
    Jar {
        #[command(flatten)]
        patch: PatchArgs,

        /// Input jar
        #[arg(short, long)]
        input: PathBuf,

        /// Patched jar to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Add constructors to the Java sources of a sources jar
    Sources {
        #[command(flatten)]
        patch: PatchArgs,

        /// Input sources jar
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to expand the sources into (emptied first)
        #[arg(short, long)]
        work_dir: Option<PathBuf>,

        /// Patched sources jar to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Add constructors to a Java source tree in place
    Tree {
        #[command(flatten)]
        patch: PatchArgs,

        /// Root of the source tree
        root: PathBuf,

        /// Fail on syntax errors in any file, not only patched ones
        #[arg(long)]
        strict: bool,

        /// Write qualified type names instead of adding imports
        #[arg(long)]
        no_auto_import: bool,
    },

    /// Patch a jar and its sources jar and check the results agree
    Patch {
        #[command(flatten)]
        patch: PatchArgs,

        /// Input jar
        #[arg(long)]
        jar: PathBuf,

        /// Input sources jar
        #[arg(long)]
        sources: PathBuf,

        /// Directory for both patched artifacts (same file names as inputs)
        #[arg(long)]
        out_dir: PathBuf,

        /// Directory to expand the sources into (emptied first)
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },

    /// Validate a patch list and print it
    Check {
        #[command(flatten)]
        patch: PatchArgs,
    },
}
