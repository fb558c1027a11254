//! Zip/jar plumbing shared by the patch engine, metadata archives and server bundles.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::result::ZipError;
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::fs::ensure_clean;

/// File entries keyed by forward-slash relative path.
pub type Entries = BTreeMap<String, Vec<u8>>;

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("{} is not a valid zip archive", path.display()))
}

/// Read every file entry; directory entries and paths escaping the root are skipped.
pub fn read_entries(path: &Path) -> Result<Entries> {
    let mut archive = open_archive(path)?;
    let mut entries = Entries::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("failed to read entry {i} of {}", path.display()))?;
        if entry.is_dir() || entry.enclosed_name().is_none() {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {name} from {}", path.display()))?;
        entries.insert(name, bytes);
    }
    Ok(entries)
}

/// Write `entries` as a fresh archive at `path`, replacing anything already there.
pub fn write_entries<'a, I>(path: &Path, entries: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    ensure_clean(path)?;
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut written = 0;
    for (name, bytes) in entries {
        zip.start_file(name, options)
            .with_context(|| format!("failed to add {name} to {}", path.display()))?;
        zip.write_all(bytes)?;
        written += 1;
    }
    zip.finish()
        .with_context(|| format!("failed to finish {}", path.display()))?;
    Ok(written)
}

/// Read a single entry, returning `None` when the archive does not contain it.
pub fn read_entry(path: &Path, name: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = open_archive(path)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {name} from {}", path.display()))
        }
    };
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {name} from {}", path.display()))?;
    Ok(Some(bytes))
}

/// Stream one entry to `dest`. Errors when the entry is missing.
pub fn extract_entry(path: &Path, name: &str, dest: &Path) -> Result<()> {
    let mut archive = open_archive(path)?;
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("{} does not contain {name}", path.display()))?;
    ensure_clean(dest)?;
    let mut out = File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    io::copy(&mut entry, &mut out)
        .with_context(|| format!("failed to extract {name} to {}", dest.display()))?;
    Ok(())
}

/// Entry names under `prefix`, in archive order.
pub fn entry_names(path: &Path, prefix: &str) -> Result<Vec<String>> {
    let archive = open_archive(path)?;
    Ok(archive
        .file_names()
        .filter(|name| name.starts_with(prefix) && !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}

/// Write `entries` as plain files below `dest`, clearing it first.
pub fn write_tree(dest: &Path, entries: &Entries) -> Result<()> {
    ensure_clean(dest)?;
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    for (name, bytes) in entries {
        let target = dest.join(name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, bytes).with_context(|| format!("failed to write {}", target.display()))?;
    }
    Ok(())
}
