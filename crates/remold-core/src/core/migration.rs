use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remold_domain::VersionConfig;
use serde::Serialize;
use tracing::{debug, info};

use crate::effects::GitClient;
use crate::error::Error;
use crate::fs::{copy_dir_all, remove_path};

pub const VERSIONS_DIR: &str = "versions";
pub const PATCHES_DIR: &str = "patches";
const GITIGNORE: &str = ".gitignore";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub from: String,
    pub to: String,
}

pub fn version_dir(root: &Path, name: &str) -> PathBuf {
    root.join(VERSIONS_DIR).join(name)
}

/// Version directory names must be a single plain path component.
pub(crate) fn validate_dir_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && name.trim() == name;
    if plain {
        Ok(())
    } else {
        Err(Error::config(format!("'{name}' is not a valid version directory name")))
    }
}

/// Point `!versions/<dir>` re-include lines at the new directory.
fn rewrite_gitignore(contents: &str, to: &str) -> String {
    contents
        .split_inclusive('\n')
        .map(|line| {
            let body = line.trim_end_matches(['\n', '\r']);
            match body.strip_prefix("!versions/") {
                Some(rest) if !rest.is_empty() => {
                    format!("!versions/{to}{}", &line[body.len()..])
                }
                _ => line.to_string(),
            }
        })
        .collect()
}

/// Carry the patch set and configuration of `versions/<from>` over to `versions/<to>`.
///
/// Every precondition is checked before anything on disk changes.
pub fn migrate_version(
    root: &Path,
    from: &str,
    to: &str,
    git: &dyn GitClient,
) -> Result<MigrationRecord> {
    validate_dir_name(from)?;
    validate_dir_name(to)?;
    let from_dir = version_dir(root, from);
    let to_dir = version_dir(root, to);
    if !from_dir.is_dir() {
        return Err(Error::config(format!(
            "version directory {VERSIONS_DIR}/{from} does not exist"
        )));
    }
    if to_dir.exists() {
        return Err(Error::config(format!(
            "cannot migrate: {VERSIONS_DIR}/{to} already exists"
        )));
    }
    let config_path = VersionConfig::path_in(&from_dir);
    if !config_path.is_file() {
        return Err(Error::config(format!(
            "{} is missing; not a version directory",
            config_path.display()
        )));
    }
    let mut config = VersionConfig::load(&config_path)?;

    let gitignore = root.join(GITIGNORE);
    if gitignore.is_file() {
        let contents = fs::read_to_string(&gitignore)
            .with_context(|| format!("failed to read {}", gitignore.display()))?;
        let rewritten = rewrite_gitignore(&contents, to);
        if rewritten != contents {
            fs::write(&gitignore, rewritten)
                .with_context(|| format!("failed to write {}", gitignore.display()))?;
            debug!(path = %gitignore.display(), "updated version entries");
        }
    }

    fs::create_dir_all(&to_dir).with_context(|| format!("failed to create {}", to_dir.display()))?;
    let patches = from_dir.join(PATCHES_DIR);
    let copied = if patches.is_dir() {
        copy_dir_all(&patches, &to_dir.join(PATCHES_DIR))?
    } else {
        0
    };
    config.set_minecraft_version(to)?;
    config.save(&VersionConfig::path_in(&to_dir))?;
    remove_path(&from_dir)?;

    if git.is_repository(root) {
        git.untrack(root, &format!("{VERSIONS_DIR}/{from}"))?;
        let new_path = format!("{VERSIONS_DIR}/{to}");
        let mut paths = vec![new_path.as_str()];
        if gitignore.is_file() {
            paths.push(GITIGNORE);
        }
        git.add(root, &paths)?;
    }

    info!(from, to, patches = copied, "migrated version directory");
    Ok(MigrationRecord {
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingGit {
        pub(crate) repository: bool,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl RecordingGit {
        pub(crate) fn repository() -> Self {
            Self {
                repository: true,
                calls: Mutex::default(),
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GitClient for RecordingGit {
        fn is_repository(&self, _root: &Path) -> bool {
            self.repository
        }

        fn untrack(&self, _root: &Path, path: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("rm --cached {path}"));
            Ok(())
        }

        fn add(&self, _root: &Path, paths: &[&str]) -> Result<()> {
            self.calls.lock().unwrap().push(format!("add {}", paths.join(" ")));
            Ok(())
        }
    }

    pub(crate) const CONFIG: &str = "# pinned\nminecraftVersion = \"1.20\"\nside = \"server\"\n\n[decompiler]\ncoordinate = \"org.vineflower:vineflower:1.10.1\"\n";

    pub(crate) fn write_version(root: &Path, name: &str, config: &str) -> Result<PathBuf> {
        let dir = version_dir(root, name);
        fs::create_dir_all(dir.join("patches/net/minecraft"))?;
        fs::write(dir.join("patches/net/minecraft/Foo.java.patch"), "--- a/x\n+++ b/x\n")?;
        fs::write(VersionConfig::path_in(&dir), config)?;
        Ok(dir)
    }

    #[test]
    fn migrate_moves_patches_and_rewrites_only_the_version() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        write_version(root, "1.20", CONFIG)?;
        fs::write(root.join(GITIGNORE), "/build\nversions/*\n!versions/1.20\r\n")?;
        let git = RecordingGit::repository();

        let record = migrate_version(root, "1.20", "1.20.1", &git)?;
        assert_eq!(
            record,
            MigrationRecord {
                from: "1.20".into(),
                to: "1.20.1".into()
            }
        );
        assert!(!version_dir(root, "1.20").exists());
        let new_dir = version_dir(root, "1.20.1");
        assert_eq!(
            fs::read_to_string(new_dir.join("patches/net/minecraft/Foo.java.patch"))?,
            "--- a/x\n+++ b/x\n"
        );
        assert_eq!(
            fs::read_to_string(VersionConfig::path_in(&new_dir))?,
            CONFIG.replace("\"1.20\"", "\"1.20.1\"")
        );
        assert_eq!(
            fs::read_to_string(root.join(GITIGNORE))?,
            "/build\nversions/*\n!versions/1.20.1\r\n"
        );
        assert_eq!(
            git.calls(),
            vec![
                "rm --cached versions/1.20".to_string(),
                "add versions/1.20.1 .gitignore".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn preconditions_fail_before_any_change() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        let git = RecordingGit::repository();

        let missing = migrate_version(root, "1.20", "1.20.1", &git).unwrap_err();
        assert_eq!(crate::error::classify(&missing).map(Error::code), Some("RM501"));

        write_version(root, "1.20", CONFIG)?;
        write_version(root, "1.20.1", CONFIG)?;
        let exists = migrate_version(root, "1.20", "1.20.1", &git).unwrap_err();
        assert!(exists.to_string().contains("already exists"));
        assert!(version_dir(root, "1.20").exists());
        assert!(git.calls().is_empty());

        assert!(migrate_version(root, "1.20", "../escape", &git).is_err());
        Ok(())
    }

    #[test]
    fn outside_a_repository_git_is_left_alone() -> Result<()> {
        let temp = tempfile::tempdir()?;
        write_version(temp.path(), "1.20", CONFIG)?;
        let git = RecordingGit::default();
        migrate_version(temp.path(), "1.20", "1.20.1", &git)?;
        assert!(git.calls().is_empty());
        Ok(())
    }

    #[test]
    fn gitignore_rewrite_leaves_other_lines() {
        assert_eq!(
            rewrite_gitignore("a\n!versions/1.19\nversions/\n!versions/\n", "1.20"),
            "a\n!versions/1.20\nversions/\n!versions/\n"
        );
    }
}
