use std::path::{Path, PathBuf};

/// Environment lookups the locator needs; injected so tests can fake a home.
pub trait EnvLookup {
    /// Non-empty value of an environment variable.
    fn var(&self, key: &str) -> Option<String>;
    fn home_dir(&self) -> Option<PathBuf>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

// Launcher asset directories, most common first.
const LINUX_TEMPLATES: &[&str] = &[
    "~/.minecraft/assets",
    "$XDG_DATA_HOME/PrismLauncher/assets",
    "~/.var/app/org.prismlauncher.PrismLauncher/data/PrismLauncher/assets",
    "$XDG_CONFIG_HOME/com.modrinth.theseus/meta/assets",
    "$XDG_DATA_HOME/multimc/assets",
];

const MACOS_TEMPLATES: &[&str] = &[
    "~/Library/Application Support/minecraft/assets",
    "~/Library/Application Support/PrismLauncher/assets",
];

const WINDOWS_TEMPLATES: &[&str] = &[
    "%appdata%/.minecraft/assets",
    "%appdata%/PrismLauncher/assets",
    "%appdata%/com.modrinth.theseus/meta/assets",
    "~/scoop/persist/multimc/assets",
];

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub fn templates(self) -> &'static [&'static str] {
        match self {
            Self::Windows => WINDOWS_TEMPLATES,
            Self::MacOs => MACOS_TEMPLATES,
            Self::Linux => LINUX_TEMPLATES,
            Self::Other => &[],
        }
    }

    /// Ordered candidate roots with every template variable resolved.
    pub fn candidate_roots(self, env: &dyn EnvLookup) -> Vec<PathBuf> {
        let Some(home) = env.home_dir() else {
            return Vec::new();
        };
        let mut roots: Vec<PathBuf> = Vec::new();
        for template in self.templates() {
            for root in expand(template, &home, env) {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
    }
}

fn expand(template: &str, home: &Path, env: &dyn EnvLookup) -> Vec<PathBuf> {
    let (head, rest) = template.split_once('/').unwrap_or((template, ""));
    let bases = match head {
        "~" => vec![home.to_path_buf()],
        "$XDG_DATA_HOME" => xdg_bases(env, "XDG_DATA_HOME", home.join(".local").join("share")),
        "$XDG_CONFIG_HOME" => xdg_bases(env, "XDG_CONFIG_HOME", home.join(".config")),
        "%appdata%" => {
            let mut bases = vec![home.join("AppData").join("Roaming")];
            if let Some(app_data) = env.var("APPDATA") {
                bases.push(PathBuf::from(app_data));
            }
            bases
        }
        other => vec![PathBuf::from(other)],
    };
    bases
        .into_iter()
        .map(|base| {
            rest.split('/')
                .filter(|segment| !segment.is_empty())
                .fold(base, |path, segment| path.join(segment))
        })
        .collect()
}

// Launchers are not reliably XDG compliant, so the fallback is always tried too.
fn xdg_bases(env: &dyn EnvLookup, key: &str, fallback: PathBuf) -> Vec<PathBuf> {
    match env.var(key) {
        Some(value) => vec![PathBuf::from(value), fallback],
        None => vec![fallback],
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) struct FakeEnv {
        pub(crate) home: PathBuf,
        pub(crate) vars: HashMap<String, String>,
    }

    impl FakeEnv {
        pub(crate) fn new(home: impl Into<PathBuf>, vars: &[(&str, &str)]) -> Self {
            Self {
                home: home.into(),
                vars: vars
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            }
        }
    }

    impl EnvLookup for FakeEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|value| !value.is_empty()).cloned()
        }

        fn home_dir(&self) -> Option<PathBuf> {
            Some(self.home.clone())
        }
    }

    #[test]
    fn linux_uses_xdg_and_fallbacks() {
        let env = FakeEnv::new("/home/dev", &[("XDG_DATA_HOME", "/data")]);
        let roots = Platform::Linux.candidate_roots(&env);
        let home = PathBuf::from("/home/dev");
        assert_eq!(
            roots,
            vec![
                home.join(".minecraft/assets"),
                PathBuf::from("/data/PrismLauncher/assets"),
                home.join(".local/share/PrismLauncher/assets"),
                home.join(".var/app/org.prismlauncher.PrismLauncher/data/PrismLauncher/assets"),
                home.join(".config/com.modrinth.theseus/meta/assets"),
                PathBuf::from("/data/multimc/assets"),
                home.join(".local/share/multimc/assets"),
            ]
        );
    }

    #[test]
    fn windows_adds_appdata_when_set() {
        let env = FakeEnv::new("/users/dev", &[("APPDATA", "/roaming")]);
        let roots = Platform::Windows.candidate_roots(&env);
        assert_eq!(roots[0], PathBuf::from("/users/dev/AppData/Roaming/.minecraft/assets"));
        assert_eq!(roots[1], PathBuf::from("/roaming/.minecraft/assets"));
        assert_eq!(roots.last(), Some(&PathBuf::from("/users/dev/scoop/persist/multimc/assets")));
        assert_eq!(roots.len(), 7);
    }

    #[test]
    fn macos_and_other_tables() {
        let env = FakeEnv::new("/Users/dev", &[]);
        assert_eq!(Platform::MacOs.candidate_roots(&env).len(), 2);
        assert!(Platform::Other.candidate_roots(&env).is_empty());
    }
}
