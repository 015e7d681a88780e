// src/commands/mod.rs
//! Command handlers for the ctorgraft CLI

mod check;
mod patch;

pub use check::cmd_check;
pub use patch::{cmd_jar, cmd_patch, cmd_sources, cmd_tree};

use crate::cli::PatchArgs;
use anyhow::{Context, Result, anyhow};
use ctorgraft::PatchSet;

/// Load the patch list named on the command line
pub fn load_patches(args: &PatchArgs) -> Result<PatchSet> {
    match (&args.patches, &args.preset) {
        (Some(path), _) => PatchSet::from_file(path)
            .with_context(|| format!("Failed to load patch list {}", path.display())),
        (None, Some(name)) => PatchSet::preset(name).ok_or_else(|| {
            anyhow!(
                "Unknown preset '{}' (available: {})",
                name,
                PatchSet::preset_names().join(", ")
            )
        }),
        (None, None) => Err(anyhow!("Either --patches or --preset is required")),
    }
}
