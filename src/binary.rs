// src/binary.rs

//! Binary pipeline: delegating constructors added to class files in a jar
//!
//! [`JarStore`] keeps the input archive open, parses class entries lazily
//! as patches ask for them, and on [`JarStore::write`] produces a new jar in
//! which modified classes are re-encoded and every other entry is copied
//! raw, compressed bytes included.

use crate::archive::{self, Staged};
use crate::classfile::{ACC_STATIC, ClassFile, ClassKind};
use crate::descriptor::JavaType;
use crate::error::{Error, Result};
use crate::patcher::{AppliedPatch, DeclKind, TypeRef, TypeStore, apply_all};
use crate::spec::{PatchSet, PatchSpec};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Superclass of every record class
const RECORD_SUPERCLASS: &str = "java/lang/Record";

/// Jar entry holding the class with binary name `name`
pub fn class_entry_name(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

/// Whether an entry is part of a jar signature
fn is_signature_entry(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.starts_with("META-INF/")
        && !upper["META-INF/".len()..].contains('/')
        && [".SF", ".RSA", ".DSA", ".EC"].iter().any(|ext| upper.ends_with(ext))
}

/// A jar opened for patching
pub struct JarStore {
    path: PathBuf,
    archive: ZipArchive<File>,
    /// Entry name -> index in the archive
    entries: HashMap<String, usize>,
    /// Parsed classes by entry name
    classes: BTreeMap<String, ClassFile>,
    modified: BTreeSet<String>,
}

impl JarStore {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| Error::zip(path, e))?;

        let mut entries = HashMap::with_capacity(archive.len());
        let mut signed = false;
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(|e| Error::zip(path, e))?;
            let name = entry.name().to_string();
            signed |= is_signature_entry(&name);
            entries.insert(name, index);
        }

        if signed {
            warn!(
                "{} is signed; patched classes will not match its signature files",
                path.display()
            );
        }
        debug!("Opened {} with {} entries", path.display(), entries.len());

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            entries,
            classes: BTreeMap::new(),
            modified: BTreeSet::new(),
        })
    }

    /// Entry names of the classes changed so far
    pub fn modified(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// Parsed class for an entry, if it has been loaded
    pub fn class(&self, entry: &str) -> Option<&ClassFile> {
        self.classes.get(entry)
    }

    fn load_class(&mut self, entry_name: &str, index: usize) -> Result<()> {
        if self.classes.contains_key(entry_name) {
            return Ok(());
        }

        let mut bytes = Vec::new();
        let mut entry = self
            .archive
            .by_index(index)
            .map_err(|e| Error::zip(&self.path, e))?;
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| Error::io(&self.path, e))?;
        drop(entry);

        let class = ClassFile::parse(&bytes, entry_name)?;
        let expected = entry_name.trim_end_matches(".class");
        match class.internal_name() {
            Some(name) if name == expected => {}
            other => {
                return Err(Error::class_format(
                    entry_name,
                    format!("declares {}", other.unwrap_or_default()),
                ));
            }
        }

        debug!(
            "Loaded {} (version {}.{}, {} methods)",
            entry_name,
            class.major_version,
            class.minor_version,
            class.methods.len()
        );
        self.classes.insert(entry_name.to_string(), class);
        Ok(())
    }

    fn class_for(&self, entry: &str) -> Result<&ClassFile> {
        self.classes
            .get(entry)
            .ok_or_else(|| Error::class_format(entry, "class not loaded"))
    }

    /// Write the patched jar to `dest`
    ///
    /// Entries keep their order. Only modified classes are recompressed.
    pub fn write(&mut self, dest: &Path) -> Result<()> {
        self.stage(dest)?.persist()?;
        info!(
            "Wrote {} ({} of {} entries rewritten)",
            dest.display(),
            self.modified.len(),
            self.entries.len()
        );
        Ok(())
    }

    /// Write the patched jar beside `dest` without publishing it
    pub fn stage(&mut self, dest: &Path) -> Result<Staged> {
        let mut replacements = HashMap::with_capacity(self.modified.len());
        for name in &self.modified {
            replacements.insert(name.clone(), self.class_for(name)?.to_bytes()?);
        }

        let input = &mut self.archive;
        let source = &self.path;
        archive::stage(dest, |file| {
            let mut zip = ZipWriter::new(file);
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            for index in 0..input.len() {
                let entry = input.by_index_raw(index).map_err(|e| Error::zip(source, e))?;
                match replacements.get(entry.name()) {
                    Some(bytes) => {
                        let name = entry.name().to_string();
                        drop(entry);
                        debug!("Rewriting {}", name);
                        zip.start_file(name.as_str(), options)
                            .map_err(|e| Error::zip(dest, e))?;
                        zip.write_all(bytes).map_err(|e| Error::io(dest, e))?;
                    }
                    None => zip.raw_copy_file(entry).map_err(|e| Error::zip(dest, e))?,
                }
            }

            zip.finish().map_err(|e| Error::zip(dest, e))?;
            Ok(())
        })
    }
}

impl TypeStore for JarStore {
    /// Entry name of the class
    type Handle = String;

    fn find_type(&mut self, name: &str) -> Result<Option<TypeRef<String>>> {
        let entry = class_entry_name(name);
        let Some(&index) = self.entries.get(&entry) else {
            return Ok(None);
        };
        self.load_class(&entry, index)?;

        let class = self.class_for(&entry)?;
        let kind = match class.kind() {
            ClassKind::Class => {
                let super_name = class.constant_pool.class_name(class.super_class);
                if super_name.as_deref() == Some(RECORD_SUPERCLASS) {
                    DeclKind::Record
                } else if class
                    .inner_class_flags(&entry)?
                    .is_some_and(|flags| flags & ACC_STATIC == 0)
                {
                    DeclKind::Inner
                } else {
                    DeclKind::Class
                }
            }
            ClassKind::Interface => DeclKind::Interface,
            ClassKind::Annotation => DeclKind::Annotation,
            ClassKind::Enum => DeclKind::Enum,
            ClassKind::Module => DeclKind::Module,
        };
        Ok(Some(TypeRef {
            handle: entry,
            kind,
        }))
    }

    fn count_constructors(&self, handle: &String, signature: &[JavaType]) -> Result<usize> {
        let class = self.class_for(handle)?;
        Ok(class
            .constructors()
            .iter()
            .filter(|params| params.as_slice() == signature)
            .count())
    }

    fn add_constructor(&mut self, handle: &String, spec: &PatchSpec) -> Result<()> {
        let class = self
            .classes
            .get_mut(handle)
            .ok_or_else(|| Error::class_format(handle.as_str(), "class not loaded"))?;
        class.add_delegating_constructor(spec)?;
        self.modified.insert(handle.clone());
        Ok(())
    }
}

/// Patch the jar at `input` and write the result to `output`
///
/// Nothing is written unless every patch succeeds.
pub fn patch_jar(input: &Path, output: &Path, patches: &PatchSet) -> Result<Vec<AppliedPatch>> {
    info!("Patching classes in {}", input.display());
    let mut store = JarStore::open(input)?;
    let applied = apply_all(&mut store, patches)?;
    store.write(output)?;
    Ok(applied)
}
