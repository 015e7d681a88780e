// src/commands/patch.rs

//! Patching commands
//!
//! Each command loads the patch list, runs one or both pipelines and prints
//! what was done plus the SHA-256 of every artifact it wrote.

use anyhow::{Context, Result, bail};
use ctorgraft::archive;
use ctorgraft::binary;
use ctorgraft::consistency;
use ctorgraft::patcher::{AppliedPatch, Outcome, apply_all};
use ctorgraft::source::{self, SourceOptions, SourceTree};
use ctorgraft::PatchSet;
use std::fs;
use std::path::{Path, PathBuf};

fn print_results(pipeline: &str, applied: &[AppliedPatch]) {
    let added = applied.iter().filter(|a| a.outcome == Outcome::Added).count();
    println!(
        "{}: {} added, {} already present",
        pipeline,
        added,
        applied.len() - added
    );
    for result in applied {
        println!("  [{}] {}", result.patch, result);
    }
}

fn print_digest(path: &Path) -> Result<()> {
    let digest = archive::sha256_file(path)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}

/// Patch the classes of a jar
pub fn cmd_jar(patches: &PatchSet, input: &Path, output: &Path) -> Result<()> {
    let applied = binary::patch_jar(input, output, patches)
        .with_context(|| format!("Failed to patch {}", input.display()))?;
    print_results("classes", &applied);
    print_digest(output)
}

/// Patch the sources of a sources jar
pub fn cmd_sources(
    patches: &PatchSet,
    input: &Path,
    work_dir: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let applied = source::patch_sources_jar(input, work_dir, output, patches)
        .with_context(|| format!("Failed to patch {}", input.display()))?;
    print_results("sources", &applied);
    print_digest(output)
}

/// Patch an expanded source tree in place
pub fn cmd_tree(patches: &PatchSet, root: &Path, options: SourceOptions) -> Result<()> {
    let mut tree = SourceTree::load_with(root, options)
        .with_context(|| format!("Failed to load source tree {}", root.display()))?;
    let applied = apply_all(&mut tree, patches)
        .with_context(|| format!("Failed to patch {}", root.display()))?;
    let written = tree.write_back()?;
    print_results("sources", &applied);
    println!("{} files written under {}", written, root.display());
    Ok(())
}

/// Output path for `input` inside `out_dir`, refusing to overwrite the input
fn output_path(input: &Path, out_dir: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .with_context(|| format!("{} has no file name", input.display()))?;
    let output = out_dir.join(name);
    if let (Ok(a), Ok(b)) = (fs::canonicalize(input), fs::canonicalize(&output))
        && a == b
    {
        bail!("Output {} would overwrite its input", output.display());
    }
    Ok(output)
}

/// Patch a jar and its sources jar, writing both only if they agree
pub fn cmd_patch(
    patches: &PatchSet,
    jar: &Path,
    sources: &Path,
    out_dir: &Path,
    work_dir: Option<&Path>,
) -> Result<()> {
    let jar_out = output_path(jar, out_dir)?;
    let sources_out = output_path(sources, out_dir)?;
    if jar_out == sources_out {
        bail!(
            "{} and {} share a file name; both outputs would be {}",
            jar.display(),
            sources.display(),
            jar_out.display()
        );
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let results = consistency::patch_pair(patches, jar, sources, work_dir, &jar_out, &sources_out)
        .with_context(|| {
            format!(
                "Failed to patch {} and {}; no output written",
                jar.display(),
                sources.display()
            )
        })?;

    print_results("classes", &results.classes);
    print_results("sources", &results.sources);
    print_digest(&jar_out)?;
    print_digest(&sources_out)
}
