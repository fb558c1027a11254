use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::assets::EnvLookup;
use crate::error::Error;
use crate::net::keep_proxies;

pub const DEFAULT_CATALOG_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const DEFAULT_ASSETS_URL: &str = "https://resources.download.minecraft.net";
pub const DEFAULT_DOWNLOAD_JOBS: usize = 16;

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Non-empty value of `key`.
    pub(crate) fn non_empty(&self, key: &str) -> Option<&str> {
        self.var(key).map(str::trim).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

impl EnvLookup for EnvSnapshot {
    fn var(&self, key: &str) -> Option<String> {
        self.non_empty(key).map(ToOwned::to_owned)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.non_empty("HOME")
            .or_else(|| self.non_empty("USERPROFILE"))
            .map(PathBuf::from)
            .or_else(dirs_next::home_dir)
    }
}

/// Immutable settings handed to each component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) cache: CacheConfig,
    pub(crate) network: NetworkConfig,
    pub(crate) java: JavaConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if the cache root cannot be resolved or a setting is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let download_jobs = match snapshot.non_empty("REMOLD_DOWNLOAD_JOBS") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(Error::config(format!(
                        "REMOLD_DOWNLOAD_JOBS must be a positive integer (got '{raw}')"
                    )))
                }
                Ok(value) => value,
            },
            None => DEFAULT_DOWNLOAD_JOBS,
        };
        Ok(Self {
            cache: resolve_cache_root(snapshot)?,
            network: NetworkConfig {
                catalog_url: snapshot
                    .non_empty("REMOLD_CATALOG_URL")
                    .unwrap_or(DEFAULT_CATALOG_URL)
                    .to_string(),
                assets_url: snapshot
                    .non_empty("REMOLD_ASSETS_URL")
                    .unwrap_or(DEFAULT_ASSETS_URL)
                    .trim_end_matches('/')
                    .to_string(),
                download_jobs,
                keep_proxies: keep_proxies(snapshot),
            },
            java: JavaConfig {
                java: resolve_java(snapshot),
            },
        })
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    #[must_use]
    pub fn java(&self) -> &JavaConfig {
        &self.java
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub source: &'static str,
}

impl CacheConfig {
    /// Directory of the managed asset store.
    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    #[must_use]
    pub fn jsons_dir(&self) -> PathBuf {
        self.root.join("jsons")
    }

    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    #[must_use]
    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub catalog_url: String,
    pub assets_url: String,
    pub download_jobs: usize,
    pub keep_proxies: bool,
}

#[derive(Debug, Clone)]
pub struct JavaConfig {
    pub java: String,
}

fn resolve_java(snapshot: &EnvSnapshot) -> String {
    if let Some(java) = snapshot.non_empty("REMOLD_JAVA") {
        return java.to_string();
    }
    if let Some(home) = snapshot.non_empty("JAVA_HOME") {
        let exe = if cfg!(windows) { "java.exe" } else { "java" };
        return PathBuf::from(home)
            .join("bin")
            .join(exe)
            .display()
            .to_string();
    }
    "java".to_string()
}

fn resolve_cache_root(snapshot: &EnvSnapshot) -> Result<CacheConfig> {
    if let Some(path) = snapshot.non_empty("REMOLD_CACHE_PATH") {
        return Ok(CacheConfig {
            root: absolutize(PathBuf::from(path))?,
            source: "REMOLD_CACHE_PATH",
        });
    }

    #[cfg(target_os = "windows")]
    let (base, source) = if let Some(local) = snapshot.non_empty("LOCALAPPDATA") {
        (PathBuf::from(local), "LOCALAPPDATA")
    } else {
        let home = snapshot
            .home_dir()
            .ok_or_else(|| Error::config("unable to determine home directory"))?;
        (home.join("AppData").join("Local"), "home/AppData/Local")
    };
    #[cfg(not(target_os = "windows"))]
    let (base, source) = if let Some(xdg) = snapshot.non_empty("XDG_CACHE_HOME") {
        (PathBuf::from(xdg), "XDG_CACHE_HOME")
    } else {
        let home = snapshot
            .home_dir()
            .ok_or_else(|| Error::config("unable to determine home directory"))?;
        (home.join(".cache"), "~/.cache")
    };

    Ok(CacheConfig {
        root: base.join("remold"),
        source,
    })
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()
            .context("unable to read the current directory")?
            .join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;

    #[test]
    fn cache_override_wins() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[
            ("REMOLD_CACHE_PATH", "/tmp/remold-cache"),
            ("XDG_CACHE_HOME", "/tmp/xdg"),
        ]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.cache().root, PathBuf::from("/tmp/remold-cache"));
        assert_eq!(config.cache().source, "REMOLD_CACHE_PATH");
        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn cache_falls_back_to_xdg_then_home() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[("XDG_CACHE_HOME", "/tmp/xdg")]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.cache().root, PathBuf::from("/tmp/xdg/remold"));

        let snapshot = EnvSnapshot::testing(&[("HOME", "/home/dev")]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.cache().root, PathBuf::from("/home/dev/.cache/remold"));
        Ok(())
    }

    #[test]
    fn defaults_apply_without_overrides() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[("REMOLD_CACHE_PATH", "/tmp/c")]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.network().download_jobs, DEFAULT_DOWNLOAD_JOBS);
        assert_eq!(config.network().catalog_url, DEFAULT_CATALOG_URL);
        assert_eq!(config.java().java, "java");
        Ok(())
    }

    #[test]
    fn java_home_locates_launcher() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[
            ("REMOLD_CACHE_PATH", "/tmp/c"),
            ("JAVA_HOME", "/opt/jdk"),
        ]);
        let config = Config::from_snapshot(&snapshot)?;
        assert!(config.java().java.starts_with("/opt/jdk"));

        let snapshot = EnvSnapshot::testing(&[
            ("REMOLD_CACHE_PATH", "/tmp/c"),
            ("JAVA_HOME", "/opt/jdk"),
            ("REMOLD_JAVA", "/usr/bin/java21"),
        ]);
        assert_eq!(Config::from_snapshot(&snapshot)?.java().java, "/usr/bin/java21");
        Ok(())
    }

    #[test]
    fn zero_download_jobs_is_a_config_error() {
        let snapshot = EnvSnapshot::testing(&[
            ("REMOLD_CACHE_PATH", "/tmp/c"),
            ("REMOLD_DOWNLOAD_JOBS", "0"),
        ]);
        let err = Config::from_snapshot(&snapshot).unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Config(_))));
    }

    #[test]
    fn assets_url_drops_trailing_slash() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[
            ("REMOLD_CACHE_PATH", "/tmp/c"),
            ("REMOLD_ASSETS_URL", "http://127.0.0.1:9000/objects/"),
        ]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.network().assets_url, "http://127.0.0.1:9000/objects");
        Ok(())
    }
}
