#![allow(dead_code)]

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use assert_cmd::{assert::Assert, cargo::cargo_bin_cmd, Command};
use remold_domain::VERSION_CONFIG_FILE;
use serde_json::Value;
use zip::write::FileOptions;

pub const CONFIG: &str = r#"minecraftVersion = "1.20.1"
side = "server"
toolchainVersion = "1.20.1+build.2"

[remapper]
coordinate = "net.neoforged:AutoRenamingTool:2.0.3:all"
url = "https://example.invalid/art.jar"
sha256 = "aa"
args = ["--input={input}", "--output={output}", "--map={mappingsFile}"]

[decompiler]
coordinate = "org.vineflower:vineflower:1.10.1"
url = "https://example.invalid/vf.jar"
sha256 = "bb"
args = ["{input}", "{output}"]
"#;

pub const FOO: &str = "package net.minecraft;\n\nclass Foo {\n    int x = 1;\n    int y = 2;\n}\n";

/// A `remold` invocation rooted at `root` with its cache kept under the same temp dir.
pub fn remold(root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("remold");
    cmd.current_dir(root)
        .env("REMOLD_ROOT", root)
        .env("REMOLD_CACHE_PATH", root.join(".cache"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

pub fn version_dir(root: &Path, name: &str) -> PathBuf {
    root.join("versions").join(name)
}

pub fn write_version(root: &Path, name: &str) -> PathBuf {
    let dir = version_dir(root, name);
    fs::create_dir_all(dir.join("patches")).expect("create version dir");
    fs::write(dir.join(VERSION_CONFIG_FILE), CONFIG).expect("write config");
    dir
}

/// Write `build/remold/decompiled.jar` holding the given sources.
pub fn write_baseline(version_dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let jar = version_dir.join("build/remold/decompiled.jar");
    fs::create_dir_all(jar.parent().expect("parent")).expect("create build dir");
    let mut writer = zip::ZipWriter::new(fs::File::create(&jar).expect("create jar"));
    for (name, contents) in files {
        writer
            .start_file(*name, FileOptions::default())
            .expect("start entry");
        writer.write_all(contents.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish jar");
    jar
}

pub fn working_file(version_dir: &Path, rel: &str) -> PathBuf {
    version_dir.join("src/main/java").join(rel)
}

pub fn write_working(version_dir: &Path, rel: &str, contents: &str) {
    let path = working_file(version_dir, rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create working dir");
    fs::write(path, contents).expect("write working file");
}

pub fn stdout(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
