// src/consistency.rs

//! Agreement check between the binary and source pipelines
//!
//! Both pipelines report one [`AppliedPatch`] per patch, in list order. A
//! jar and sources jar from different library versions show up here as a
//! patch that was added on one side and already present on the other.
//!
//! [`patch_pair`] runs both pipelines over a jar and its sources jar and
//! publishes the two outputs together, only after they agree.

use crate::archive;
use crate::binary::JarStore;
use crate::descriptor::display_signature;
use crate::error::{Error, Result};
use crate::patcher::{AppliedPatch, apply_all};
use crate::source::{self, SourceTree};
use crate::spec::PatchSet;
use std::path::Path;
use tracing::{debug, info};

/// Results of [`patch_pair`], one list per pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResults {
    pub classes: Vec<AppliedPatch>,
    pub sources: Vec<AppliedPatch>,
}

/// Patch a jar and its sources jar, writing both outputs or neither
///
/// Both outputs are staged next to their destinations and renamed into
/// place only after every patch applied on both sides and the results
/// agree. `work_dir` receives the expanded sources; without one a temporary
/// directory is used.
pub fn patch_pair(
    patches: &PatchSet,
    jar: &Path,
    sources: &Path,
    work_dir: Option<&Path>,
    jar_out: &Path,
    sources_out: &Path,
) -> Result<PairResults> {
    let same_output = match (std::path::absolute(jar_out), std::path::absolute(sources_out)) {
        (Ok(a), Ok(b)) => a == b,
        _ => jar_out == sources_out,
    };
    if same_output {
        return Err(Error::InvalidPath(format!(
            "jar and sources jar would both be written to {}",
            jar_out.display()
        )));
    }

    let mut store = JarStore::open(jar)?;
    let classes = apply_all(&mut store, patches)?;

    let temp;
    let dir = match work_dir {
        Some(dir) => dir,
        None => {
            temp = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
            temp.path()
        }
    };
    source::prepare_work_dir(dir)?;
    archive::extract(sources, dir)?;
    let mut tree = SourceTree::load(dir)?;
    let sources_applied = apply_all(&mut tree, patches)?;

    check(&classes, &sources_applied)?;
    info!("Both pipelines agree on {} patches", patches.len());

    tree.write_back()?;
    let staged_jar = store.stage(jar_out)?;
    let (staged_sources, _) = archive::stage_pack(dir, sources_out)?;
    archive::persist_all(vec![staged_jar, staged_sources])?;
    info!("Wrote {} and {}", jar_out.display(), sources_out.display());

    Ok(PairResults {
        classes,
        sources: sources_applied,
    })
}

/// Compare the two result lists entry by entry
pub fn check(binary: &[AppliedPatch], source: &[AppliedPatch]) -> Result<()> {
    if binary.len() != source.len() {
        let (patch, type_name) = binary
            .iter()
            .chain(source)
            .nth(binary.len().min(source.len()))
            .map(|p| (p.patch.clone(), p.target.clone()))
            .unwrap_or_default();
        return Err(Error::Divergence {
            patch,
            type_name,
            reason: format!(
                "binary applied {} patches, source applied {}",
                binary.len(),
                source.len()
            ),
        });
    }

    for (bin, src) in binary.iter().zip(source) {
        let diverge = |reason: String| Error::Divergence {
            patch: bin.patch.clone(),
            type_name: bin.target.clone(),
            reason,
        };

        if bin.patch != src.patch || bin.target != src.target {
            return Err(diverge(format!(
                "results out of order (source reports {} on {})",
                src.patch, src.target
            )));
        }
        if bin.signature != src.signature || bin.delegate != src.delegate {
            return Err(diverge(format!(
                "binary constructor {} differs from source constructor {}",
                display_signature(&bin.signature),
                display_signature(&src.signature)
            )));
        }
        if bin.outcome != src.outcome {
            return Err(diverge(format!(
                "binary outcome {:?}, source outcome {:?}; jar and sources jar are likely different versions",
                bin.outcome, src.outcome
            )));
        }
        debug!("Patch '{}' consistent across pipelines", bin.patch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::descriptor::JavaType;
    use crate::patcher::Outcome;

    fn applied(outcome: Outcome) -> AppliedPatch {
        AppliedPatch {
            patch: "widget".to_string(),
            target: "pkg.Widget".to_string(),
            signature: vec![JavaType::parse("int").unwrap()],
            delegate: vec![],
            outcome,
        }
    }

    #[test]
    fn test_matching_results_pass() {
        let a = vec![applied(Outcome::Added)];
        check(&a, &a.clone()).unwrap();
        check(&[], &[]).unwrap();
    }

    #[test]
    fn test_outcome_mismatch_diverges() {
        let err = check(&[applied(Outcome::Added)], &[applied(Outcome::AlreadyPresent)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Divergence);
        assert!(err.to_string().contains("pkg.Widget"));
    }

    #[test]
    fn test_length_mismatch_diverges() {
        let err = check(&[applied(Outcome::Added)], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Divergence);
        assert!(err.to_string().contains("widget"));
    }
}
