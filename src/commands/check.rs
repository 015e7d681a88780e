// src/commands/check.rs

//! Patch list validation

use anyhow::Result;
use ctorgraft::PatchSet;
use ctorgraft::descriptor::{constructor_descriptor, display_signature};

/// Print every patch of a validated list
pub fn cmd_check(patches: &PatchSet) -> Result<()> {
    println!("{} patches OK", patches.len());
    for spec in patches.iter() {
        let forwarded: Vec<&str> = spec.forwarded().map(|p| p.name.as_str()).collect();
        let params: Vec<String> = spec
            .parameters()
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect();

        println!("\n[{}] {}", spec.label(), spec.target());
        println!("  new:      ({})  {}", params.join(", "), constructor_descriptor(&spec.signature()));
        println!(
            "  delegate: {}  {}",
            display_signature(spec.delegate()),
            constructor_descriptor(spec.delegate())
        );
        println!("  body:     this({});", forwarded.join(", "));
    }
    Ok(())
}
