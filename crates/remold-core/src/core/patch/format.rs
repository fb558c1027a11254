use std::fmt::Write as _;

use anyhow::{Context, Result};
use diffy::{DiffOptions, Line, Patch};
use serde::Serialize;

const DEV_NULL: &str = "/dev/null";
const NO_NEWLINE: &str = "\\ No newline at end of file\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Modify,
    Add,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Delete(String),
    Insert(String),
}

impl HunkLine {
    pub fn text(&self) -> &str {
        match self {
            Self::Context(text) | Self::Delete(text) | Self::Insert(text) => text,
        }
    }

    fn prefix(&self) -> char {
        match self {
            Self::Context(_) => ' ',
            Self::Delete(_) => '-',
            Self::Insert(_) => '+',
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}

/// One hunk with its recorded position. Line text keeps its trailing newline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Zero-based index of the first baseline line this hunk covers.
    ///
    /// A zero-length range names the line it follows, so it is already the
    /// zero-based insertion point.
    pub fn anchor(&self) -> usize {
        if self.old_len == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }

    /// Lines the baseline must contain: context plus deletions.
    pub fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| !matches!(line, HunkLine::Insert(_)))
            .map(HunkLine::text)
            .collect()
    }

    pub fn leading_context(&self) -> usize {
        self.lines.iter().take_while(|line| line.is_context()).count()
    }

    pub fn trailing_context(&self) -> usize {
        self.lines
            .iter()
            .rev()
            .take_while(|line| line.is_context())
            .count()
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            range(self.old_start, self.old_len),
            range(self.new_start, self.new_len)
        );
        for line in &self.lines {
            out.push(line.prefix());
            out.push_str(line.text());
            if !line.text().ends_with('\n') {
                out.push('\n');
                out.push_str(NO_NEWLINE);
            }
        }
    }
}

fn range(start: usize, len: usize) -> String {
    if len == 1 {
        start.to_string()
    } else {
        format!("{start},{len}")
    }
}

/// All hunks touching one file, addressed by its forward-slash relative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePatch {
    pub path: String,
    pub kind: ChangeKind,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Diff two versions of a file; `None` on either side marks an add or a delete.
    ///
    /// Adding or deleting an empty file records a header with no hunks.
    /// Returns `None` when there is nothing to record.
    pub fn between(
        path: &str,
        old: Option<&str>,
        new: Option<&str>,
        context: usize,
    ) -> Option<Self> {
        let kind = match (old, new) {
            (None, Some(_)) => ChangeKind::Add,
            (Some(_), None) => ChangeKind::Delete,
            _ => ChangeKind::Modify,
        };
        let old = old.unwrap_or_default();
        let new = new.unwrap_or_default();
        let patch = DiffOptions::new()
            .set_context_len(context)
            .create_patch(old, new);
        let hunks = convert_hunks(&patch);
        if hunks.is_empty() && kind == ChangeKind::Modify {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            kind,
            hunks,
        })
    }

    pub fn parse(path: &str, text: &str) -> Result<Self> {
        if !text.lines().any(|line| line.starts_with("@@")) {
            return Self::parse_header(path, text);
        }
        let patch = Patch::from_str(text).with_context(|| format!("malformed patch for {path}"))?;
        let kind = if patch.original() == Some(DEV_NULL) {
            ChangeKind::Add
        } else if patch.modified() == Some(DEV_NULL) {
            ChangeKind::Delete
        } else {
            ChangeKind::Modify
        };
        Ok(Self {
            path: path.to_string(),
            kind,
            hunks: convert_hunks(&patch),
        })
    }

    fn parse_header(path: &str, text: &str) -> Result<Self> {
        let header = |marker: &str| {
            text.lines()
                .find_map(|line| line.strip_prefix(marker))
                .map(str::trim_end)
                .with_context(|| format!("malformed patch for {path}: missing '{}' line", marker.trim_end()))
        };
        let (old, new) = (header("--- ")?, header("+++ ")?);
        let kind = if old == DEV_NULL {
            ChangeKind::Add
        } else if new == DEV_NULL {
            ChangeKind::Delete
        } else {
            ChangeKind::Modify
        };
        Ok(Self {
            path: path.to_string(),
            kind,
            hunks: Vec::new(),
        })
    }

    pub fn render(&self) -> String {
        self.render_hunks(&self.hunks)
    }

    /// Render a subset of this file's hunks under the same header; rejects use this.
    pub fn render_hunks(&self, hunks: &[Hunk]) -> String {
        let mut out = String::new();
        let (old, new) = match self.kind {
            ChangeKind::Add => (DEV_NULL.to_string(), format!("b/{}", self.path)),
            ChangeKind::Delete => (format!("a/{}", self.path), DEV_NULL.to_string()),
            ChangeKind::Modify => (format!("a/{}", self.path), format!("b/{}", self.path)),
        };
        let _ = writeln!(out, "--- {old}");
        let _ = writeln!(out, "+++ {new}");
        for hunk in hunks {
            hunk.render_into(&mut out);
        }
        out
    }
}

fn convert_hunks(patch: &Patch<'_, str>) -> Vec<Hunk> {
    patch
        .hunks()
        .iter()
        .map(|hunk| Hunk {
            old_start: hunk.old_range().start(),
            old_len: hunk.old_range().len(),
            new_start: hunk.new_range().start(),
            new_len: hunk.new_range().len(),
            lines: hunk
                .lines()
                .iter()
                .map(|line| match line {
                    Line::Context(text) => HunkLine::Context((*text).to_string()),
                    Line::Delete(text) => HunkLine::Delete((*text).to_string()),
                    Line::Insert(text) => HunkLine::Insert((*text).to_string()),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD: &str = "a\nb\nc\nd\ne\nf\ng\n";
    const NEW: &str = "a\nb\nc\nD\ne\nf\ng\n";

    #[test]
    fn between_records_a_single_hunk() {
        let patch = FilePatch::between("pkg/Foo.java", Some(OLD), Some(NEW), 3).unwrap();
        assert_eq!(patch.kind, ChangeKind::Modify);
        assert_eq!(patch.hunks.len(), 1);
        let hunk = &patch.hunks[0];
        assert_eq!((hunk.old_start, hunk.old_len), (1, 7));
        assert_eq!(hunk.anchor(), 0);
        assert_eq!(hunk.leading_context(), 3);
        assert_eq!(hunk.trailing_context(), 3);
        assert_eq!(
            patch.render(),
            "--- a/pkg/Foo.java\n+++ b/pkg/Foo.java\n@@ -1,7 +1,7 @@\n a\n b\n c\n-d\n+D\n e\n f\n g\n"
        );
    }

    #[test]
    fn identical_files_produce_nothing() {
        assert!(FilePatch::between("Foo.java", Some(OLD), Some(OLD), 3).is_none());
    }

    #[test]
    fn parse_reads_back_rendered_text() -> Result<()> {
        let patch = FilePatch::between("Foo.java", Some(OLD), Some(NEW), 1).unwrap();
        let parsed = FilePatch::parse("Foo.java", &patch.render())?;
        assert_eq!(parsed, patch);
        Ok(())
    }

    #[test]
    fn added_and_deleted_files_use_dev_null() -> Result<()> {
        let added = FilePatch::between("New.java", None, Some("x\n"), 3).unwrap();
        assert_eq!(added.kind, ChangeKind::Add);
        let text = added.render();
        assert!(text.starts_with("--- /dev/null\n+++ b/New.java\n@@ "));
        assert!(text.ends_with("+x\n"));
        assert_eq!(FilePatch::parse("New.java", &text)?.kind, ChangeKind::Add);

        let deleted = FilePatch::between("Old.java", Some("x\ny\n"), None, 3).unwrap();
        assert_eq!(deleted.kind, ChangeKind::Delete);
        assert_eq!(
            FilePatch::parse("Old.java", &deleted.render())?.kind,
            ChangeKind::Delete
        );
        Ok(())
    }

    #[test]
    fn empty_files_are_recorded_with_a_bare_header() -> Result<()> {
        let added = FilePatch::between("Empty.java", None, Some(""), 3).unwrap();
        assert!(added.hunks.is_empty());
        assert_eq!(added.render(), "--- /dev/null\n+++ b/Empty.java\n");
        assert_eq!(FilePatch::parse("Empty.java", &added.render())?, added);

        let deleted = FilePatch::between("Gone.java", Some(""), None, 3).unwrap();
        assert_eq!(deleted.render(), "--- a/Gone.java\n+++ /dev/null\n");
        assert_eq!(FilePatch::parse("Gone.java", &deleted.render())?, deleted);

        assert!(FilePatch::between("Same.java", Some(""), Some(""), 3).is_none());
        assert!(FilePatch::parse("Broken.java", "+++ b/Broken.java\n").is_err());
        Ok(())
    }

    #[test]
    fn missing_trailing_newline_is_marked() -> Result<()> {
        let patch = FilePatch::between("Foo.java", Some("a\nb"), Some("a\nc"), 3).unwrap();
        let text = patch.render();
        assert!(text.contains("-b\n\\ No newline at end of file\n+c\n\\ No newline at end of file\n"));
        assert_eq!(FilePatch::parse("Foo.java", &text)?, patch);
        Ok(())
    }

    #[test]
    fn parse_rejects_garbage_hunks() {
        assert!(FilePatch::parse("Foo.java", "--- a/Foo.java\n+++ b/Foo.java\n@@ -1,3 +1,3 @@\n a\n").is_err());
    }
}
