// src/archive/mod.rs

//! Archive I/O for jar and sources-jar artifacts
//!
//! Extraction writes every entry of a zip archive under a destination
//! directory; packing walks a directory depth-first in file-name order and
//! writes each regular file as one entry. Entry contents are copied byte for
//! byte in both directions. Archive metadata (timestamps, compression
//! levels) is not preserved.
//!
//! Outputs are staged in a temporary sibling and renamed into place (see
//! [`stage`] and [`persist_all`]): a failed run leaves no archive at the
//! destination path. Published files get mode 0644 on Unix.

pub mod path;

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One regular file of a walked tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// POSIX-style path relative to the walked root
    pub name: String,
    pub content: Vec<u8>,
}

/// Counts reported by [`extract`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
}

/// Extract every entry of `archive` under `dest`
///
/// Directory entries create directories; file entries create their parent
/// directories and are written verbatim, empty files included.
pub fn extract(archive: &Path, dest: &Path) -> Result<ExtractSummary> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| Error::zip(archive, e))?;
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

    let mut summary = ExtractSummary::default();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| Error::zip(archive, e))?;
        let out_path = path::safe_join(dest, entry.name())?;

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| Error::io(&out_path, e))?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| Error::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io(&out_path, e))?;
        summary.files += 1;
    }

    info!(
        "Extracted {} files ({} directory entries) from {} into {}",
        summary.files,
        summary.directories,
        archive.display(),
        dest.display()
    );
    Ok(summary)
}

/// Walk every regular file under `root` as a flat, ordered entry list
///
/// Traversal is depth-first with siblings sorted by file name, so the order
/// is stable across runs and platforms. Symlinks are not followed.
pub fn walk(root: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for item in WalkDir::new(root).sort_by_file_name() {
        let item = item.map_err(|e| {
            let at = e.path().unwrap_or(root).to_path_buf();
            Error::io(at, io::Error::from(e))
        })?;
        if !item.file_type().is_file() {
            continue;
        }

        let name = path::entry_name(root, item.path())?;
        let content = fs::read(item.path()).map_err(|e| Error::io(item.path(), e))?;
        entries.push(Entry { name, content });
    }

    Ok(entries)
}

/// Pack every regular file under `root` into a new archive at `dest`
///
/// Returns the number of entries written.
pub fn pack(root: &Path, dest: &Path) -> Result<usize> {
    let (staged, count) = stage_pack(root, dest)?;
    staged.persist()?;
    info!("Packed {} files from {} into {}", count, root.display(), dest.display());
    Ok(count)
}

/// Like [`pack`], but leave the archive staged beside `dest`
pub fn stage_pack(root: &Path, dest: &Path) -> Result<(Staged, usize)> {
    let entries = walk(root)?;
    let staged = stage(dest, |file| {
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &entries {
            debug!("Packing {}", entry.name);
            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| Error::zip(dest, e))?;
            zip.write_all(&entry.content).map_err(|e| Error::io(dest, e))?;
        }
        zip.finish().map_err(|e| Error::zip(dest, e))?;
        Ok(())
    })?;
    Ok((staged, entries.len()))
}

/// Permissions of published outputs; temporary files start owner-only
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// A completely written output in a temporary sibling of its destination
///
/// Dropping it without [`Staged::persist`] removes the temporary file.
#[derive(Debug)]
pub struct Staged {
    tmp: tempfile::NamedTempFile,
    dest: PathBuf,
}

impl Staged {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Rename the staged file onto its destination
    pub fn persist(self) -> Result<()> {
        let dest = self.dest;
        self.tmp.persist(&dest).map_err(|e| Error::io(&dest, e.error))?;
        debug!("Published {}", dest.display());
        Ok(())
    }
}

/// Write a file to a temporary sibling of `dest` without publishing it
///
/// The temporary file lives in the destination directory so the final
/// rename stays on one filesystem. If `write` fails the temporary file is
/// removed.
pub fn stage<F>(dest: &Path, write: F) -> Result<Staged>
where
    F: FnOnce(&File) -> Result<()>,
{
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir().map_err(|e| Error::io(dest, e))?,
    };
    fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;

    let tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| Error::io(&parent, e))?;
    write(tmp.as_file())?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(OUTPUT_MODE))
            .map_err(|e| Error::io(tmp.path(), e))?;
    }
    Ok(Staged {
        tmp,
        dest: dest.to_path_buf(),
    })
}

/// Publish staged outputs together
///
/// When a rename fails, outputs already published by this call are removed
/// again and the remaining staged files are discarded, so either every
/// destination is written or none of them is.
pub fn persist_all(staged: Vec<Staged>) -> Result<()> {
    let mut published: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for item in staged {
        let dest = item.dest.clone();
        if let Err(e) = item.persist() {
            for path in &published {
                if let Err(cleanup) = fs::remove_file(path) {
                    warn!("Could not remove {}: {}", path.display(), cleanup);
                }
            }
            return Err(e);
        }
        published.push(dest);
    }
    Ok(())
}

/// Hex SHA-256 digest of a file, streamed
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
