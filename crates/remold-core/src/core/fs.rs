use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Best-effort recursive chmod for paths that may have been hardened read-only.
#[cfg(unix)]
fn make_writable_recursive(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mode = if meta.is_dir() { 0o755 } else { 0o644 };
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    if meta.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                make_writable_recursive(&entry.path());
            }
        }
    }
}

#[cfg(not(unix))]
fn make_writable_recursive(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
    if meta.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                make_writable_recursive(&entry.path());
            }
        }
    }
}

/// Remove whatever lives at `path`; a missing path is not an error.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("failed to stat {}", path.display())),
    };
    if meta.is_dir() && !meta.file_type().is_symlink() {
        make_writable_recursive(path);
        fs::remove_dir_all(path).with_context(|| format!("failed to remove {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))
    }
}

/// Clear `path` and make sure its parent exists, ready for a fresh write.
pub(crate) fn ensure_clean(path: &Path) -> Result<()> {
    remove_path(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Recursively copy `src` into `dest`, refusing to overwrite existing files.
pub(crate) fn copy_dir_all(src: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} escaped {}", entry.path().display(), src.display()))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            if target.exists() {
                anyhow::bail!("refusing to overwrite {}", target.display());
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Forward-slash relative path, the form used inside archives and patch headers.
pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_clean_removes_files_and_dirs() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("out");
        fs::create_dir_all(dir.join("nested"))?;
        fs::write(dir.join("nested/file.txt"), "x")?;
        ensure_clean(&dir)?;
        assert!(!dir.exists());

        let file = temp.path().join("deep/file.jar");
        ensure_clean(&file)?;
        assert!(file.parent().unwrap().is_dir());
        fs::write(&file, "a")?;
        ensure_clean(&file)?;
        assert!(!file.exists());
        Ok(())
    }

    #[test]
    fn copy_dir_all_copies_tree() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("a/b"))?;
        fs::write(src.join("a/b/one.patch"), "1")?;
        fs::write(src.join("two.patch"), "2")?;
        let dest = temp.path().join("dest");
        assert_eq!(copy_dir_all(&src, &dest)?, 2);
        assert_eq!(fs::read_to_string(dest.join("a/b/one.patch"))?, "1");
        assert!(copy_dir_all(&src, &dest).is_err());
        Ok(())
    }

    #[test]
    fn to_slash_joins_components() {
        assert_eq!(to_slash(Path::new("net").join("minecraft").as_path()), "net/minecraft");
    }
}
