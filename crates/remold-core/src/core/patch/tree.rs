use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::fs::to_slash;
use crate::jar::{self, Entries};

/// A source tree stored either as a directory or as a zip/jar archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceTree {
    Dir(PathBuf),
    Archive(PathBuf),
}

impl SourceTree {
    /// Existing directories are trees; otherwise a `.zip`/`.jar` name or an existing file means an archive.
    pub fn at(path: &Path) -> Self {
        if path.is_dir() {
            return Self::Dir(path.to_path_buf());
        }
        let archive_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip") || ext.eq_ignore_ascii_case("jar"));
        if archive_ext || path.is_file() {
            Self::Archive(path.to_path_buf())
        } else {
            Self::Dir(path.to_path_buf())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Dir(path) | Self::Archive(path) => path,
        }
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn read(&self) -> Result<Entries> {
        match self {
            Self::Archive(path) => jar::read_entries(path),
            Self::Dir(root) => {
                let mut entries = Entries::new();
                for entry in WalkDir::new(root).sort_by_file_name() {
                    let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let rel = to_slash(entry.path().strip_prefix(root)?);
                    let bytes = fs::read(entry.path())
                        .with_context(|| format!("failed to read {}", entry.path().display()))?;
                    entries.insert(rel, bytes);
                }
                Ok(entries)
            }
        }
    }

    /// Replace whatever is at this location with `entries`.
    pub fn write(&self, entries: &Entries) -> Result<()> {
        match self {
            Self::Archive(path) => {
                jar::write_entries(path, entries.iter().map(|(k, v)| (k.as_str(), v.as_slice())))?;
            }
            Self::Dir(root) => jar::write_tree(root, entries)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_kind_follows_extension_and_disk() -> Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(matches!(SourceTree::at(temp.path()), SourceTree::Dir(_)));
        assert!(matches!(
            SourceTree::at(&temp.path().join("out.jar")),
            SourceTree::Archive(_)
        ));
        assert!(matches!(
            SourceTree::at(&temp.path().join("src/main/java")),
            SourceTree::Dir(_)
        ));
        Ok(())
    }

    #[test]
    fn directory_and_archive_hold_the_same_entries() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut entries = Entries::new();
        entries.insert("a/B.java".into(), b"class B {}\n".to_vec());
        entries.insert("c.txt".into(), b"c".to_vec());

        let dir = SourceTree::at(&temp.path().join("tree"));
        dir.write(&entries)?;
        let archive = SourceTree::at(&temp.path().join("tree.zip"));
        archive.write(&dir.read()?)?;
        assert_eq!(archive.read()?, entries);
        Ok(())
    }
}
