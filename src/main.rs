// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use ctorgraft::source::SourceOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Jar {
            patch,
            input,
            output,
        } => {
            let patches = commands::load_patches(&patch)?;
            commands::cmd_jar(&patches, &input, &output)
        }
        Commands::Sources {
            patch,
            input,
            work_dir,
            output,
        } => {
            let patches = commands::load_patches(&patch)?;
            commands::cmd_sources(&patches, &input, work_dir.as_deref(), &output)
        }
        Commands::Tree {
            patch,
            root,
            strict,
            no_auto_import,
        } => {
            let patches = commands::load_patches(&patch)?;
            let options = SourceOptions::default()
                .strict(strict)
                .auto_import(!no_auto_import);
            commands::cmd_tree(&patches, &root, options)
        }
        Commands::Patch {
            patch,
            jar,
            sources,
            out_dir,
            work_dir,
        } => {
            let patches = commands::load_patches(&patch)?;
            commands::cmd_patch(&patches, &jar, &sources, &out_dir, work_dir.as_deref())
        }
        Commands::Check { patch } => {
            let patches = commands::load_patches(&patch)?;
            commands::cmd_check(&patches)
        }
    }
}
