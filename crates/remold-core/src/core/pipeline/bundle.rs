//! Server downloads are bundles: the real server jar and its libraries are
//! nested under `META-INF/` and described by two list files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remold_domain::{hash_file, HashAlgorithm, LibraryList};
use tracing::{debug, info};

use crate::error::Error;
use crate::jar;

const VERSIONS_LIST: &str = "META-INF/versions.list";
const LIBRARIES_LIST: &str = "META-INF/libraries.list";
const VERSIONS_PREFIX: &str = "META-INF/versions/";
const LIBRARIES_PREFIX: &str = "META-INF/libraries/";

/// One `libraries.list` line: `<sha256> <coordinate> <path>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundledLibrary {
    pub sha256: String,
    pub coordinate: String,
    pub path: String,
}

fn list_text(bundle: &Path, name: &str) -> Result<String> {
    let bytes = jar::read_entry(bundle, name)?.ok_or_else(|| {
        Error::config(format!("{} does not contain {name}", bundle.display()))
    })?;
    String::from_utf8(bytes).with_context(|| format!("{name} is not UTF-8"))
}

fn three_fields<'a>(line: &'a str, list: &str) -> Result<[&'a str; 3]> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(Error::config(format!("{list} line is invalid: '{line}'"))),
    }
}

/// Copy the jar named by `versions.list` out of the bundle.
pub fn extract_embedded_jar(bundle: &Path, dest: &Path) -> Result<()> {
    let text = list_text(bundle, VERSIONS_LIST)?;
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let [line] = lines.as_slice() else {
        return Err(Error::config(format!(
            "{VERSIONS_LIST} must hold exactly one entry, found {}",
            lines.len()
        )));
    };
    let [_, _, path] = three_fields(line, VERSIONS_LIST)?;
    jar::extract_entry(bundle, &format!("{VERSIONS_PREFIX}{path}"), dest)?;
    debug!(jar = %dest.display(), "extracted embedded server jar");
    Ok(())
}

pub fn parse_libraries_list(text: &str) -> Result<Vec<BundledLibrary>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let [sha256, coordinate, path] = three_fields(line, LIBRARIES_LIST)?;
            Ok(BundledLibrary {
                sha256: sha256.to_string(),
                coordinate: coordinate.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}

/// Library coordinates of `bundle`, served from `cache_file` while its hash still matches.
pub fn determine_libraries(bundle: &Path, cache_file: &Path) -> Result<LibraryList> {
    let bundle_hash = hash_file(HashAlgorithm::Sha256, bundle)?;
    if cache_file.is_file() {
        let raw = fs::read_to_string(cache_file)
            .with_context(|| format!("failed to read {}", cache_file.display()))?;
        match serde_json::from_str::<LibraryList>(&raw) {
            Ok(cached) if cached.sha256.eq_ignore_ascii_case(&bundle_hash) => {
                debug!(libraries = cached.libraries.len(), "reusing cached library list");
                return Ok(cached);
            }
            _ => debug!(path = %cache_file.display(), "library list cache is stale"),
        }
    }

    let libraries = parse_libraries_list(&list_text(bundle, LIBRARIES_LIST)?)?;
    let list = LibraryList {
        sha256: bundle_hash,
        libraries: libraries.into_iter().map(|lib| lib.coordinate).collect(),
    };
    if let Some(parent) = cache_file.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(cache_file, serde_json::to_string_pretty(&list)?)
        .with_context(|| format!("failed to write {}", cache_file.display()))?;
    Ok(list)
}

/// Extract every bundled library jar below `dest`, returning them in archive order.
pub fn extract_libraries(bundle: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let names = jar::entry_names(bundle, LIBRARIES_PREFIX)?;
    let mut jars = Vec::with_capacity(names.len());
    for name in names {
        let rel = &name[LIBRARIES_PREFIX.len()..];
        let target = dest.join(rel);
        jar::extract_entry(bundle, &name, &target)?;
        jars.push(target);
    }
    info!(libraries = jars.len(), "extracted bundled libraries");
    Ok(jars)
}
