use serde::Serialize;

use super::format::{Hunk, HunkLine};
use crate::error::Error;

pub const DEFAULT_MIN_SCORE: f64 = 0.5;

/// How far the applier may stray from a hunk's recorded text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PatchMode {
    /// Exact context, anywhere in the file, nearest the recorded position first.
    #[default]
    Offset,
    /// Fall back to the best-scoring window when its mean line similarity reaches `min_score`.
    Fuzzy { min_score: f64 },
    /// Fall back to ignoring up to `max_fuzz` leading and trailing context lines.
    MaxFuzz { max_fuzz: usize },
}

impl PatchMode {
    pub fn fuzzy(min_score: f64) -> anyhow::Result<Self> {
        if !(0.0..=1.0).contains(&min_score) {
            return Err(Error::config(format!(
                "minimum fuzzy score must be between 0 and 1, got {min_score}"
            )));
        }
        Ok(Self::Fuzzy { min_score })
    }
}

/// How a hunk, or the worst hunk of a file, found its place.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchQuality {
    Exact { offset: isize },
    Fuzz { distance: usize },
    Fuzzy { score: f64 },
}

impl MatchQuality {
    fn rank(self) -> u8 {
        match self {
            Self::Exact { offset: 0 } => 0,
            Self::Exact { .. } => 1,
            Self::Fuzz { .. } => 2,
            Self::Fuzzy { .. } => 3,
        }
    }

    /// Keep whichever of the two strayed further from the recorded text.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Exact { offset: a }, Self::Exact { offset: b }) => Self::Exact {
                offset: if a.abs() >= b.abs() { a } else { b },
            },
            (Self::Fuzz { distance: a }, Self::Fuzz { distance: b }) => Self::Fuzz {
                distance: a.max(b),
            },
            (Self::Fuzzy { score: a }, Self::Fuzzy { score: b }) => Self::Fuzzy {
                score: a.min(b),
            },
            _ if other.rank() > self.rank() => other,
            _ => self,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileApplication {
    pub content: String,
    pub quality: MatchQuality,
    pub applied: usize,
    pub failed: Vec<Hunk>,
}

/// Exact matches further than this from the recorded position are not trusted.
pub const MAX_OFFSET: usize = 1000;

struct Placement<'h> {
    start: usize,
    body: &'h [HunkLine],
    window: usize,
    /// Context lines dropped from the front of the hunk before matching.
    trimmed: usize,
    quality: MatchQuality,
    /// Fuzzy windows below the threshold still reserve their lines.
    accepted: bool,
}

impl Placement<'_> {
    fn end(&self) -> usize {
        self.start + self.window
    }

    fn drift(&self, hunk: &Hunk) -> isize {
        self.start as isize - (hunk.anchor() + self.trimmed) as isize
    }
}

/// Apply `hunks` in order; hunks that find no place are returned for the reject file.
///
/// Hunks with an exact match are placed first, each after the previous one.
/// The rest are then fitted into the gaps between those exact placements, so
/// a loose match can never push a later exact hunk out of the file.
pub fn apply_hunks(original: &str, hunks: &[Hunk], mode: PatchMode) -> FileApplication {
    let lines: Vec<&str> = original.split_inclusive('\n').collect();
    let mut slots: Vec<Option<Placement<'_>>> = Vec::with_capacity(hunks.len());

    let mut cursor = 0;
    let mut drift: isize = 0;
    for hunk in hunks {
        let expected = shift(hunk.anchor(), drift);
        let old = hunk.old_lines();
        let placement = find_exact(&lines, cursor, lines.len(), expected, &old).map(|start| Placement {
            start,
            body: &hunk.lines,
            window: old.len(),
            trimmed: 0,
            quality: MatchQuality::Exact {
                offset: start as isize - hunk.anchor() as isize,
            },
            accepted: true,
        });
        if let Some(placement) = &placement {
            cursor = placement.end();
            drift = placement.drift(hunk);
        }
        slots.push(placement);
    }

    if mode != PatchMode::Offset {
        for index in 0..hunks.len() {
            if slots[index].is_some() {
                continue;
            }
            let (lower, drift) = slots[..index]
                .iter()
                .zip(&hunks[..index])
                .rev()
                .find_map(|(slot, hunk)| slot.as_ref().map(|p| (p.end(), p.drift(hunk))))
                .unwrap_or((0, 0));
            let upper = slots[index + 1..]
                .iter()
                .flatten()
                .map(|placement| placement.start)
                .next()
                .unwrap_or(lines.len());
            let hunk = &hunks[index];
            let expected = shift(hunk.anchor(), drift);
            slots[index] = place_loose(&lines, lower, upper, expected, hunk, mode);
        }
    }

    let mut out = String::with_capacity(original.len());
    let mut cursor = 0;
    let mut quality = MatchQuality::Exact { offset: 0 };
    let mut applied = 0;
    let mut failed = Vec::new();
    for (hunk, slot) in hunks.iter().zip(&slots) {
        let Some(placement) = slot.as_ref().filter(|placement| placement.accepted) else {
            failed.push(hunk.clone());
            continue;
        };
        for line in &lines[cursor..placement.start] {
            out.push_str(line);
        }
        emit(&mut out, &lines[placement.start..placement.end()], placement.body);
        cursor = placement.end();
        quality = quality.worst(placement.quality);
        applied += 1;
    }
    for line in &lines[cursor..] {
        out.push_str(line);
    }

    FileApplication {
        content: out,
        quality,
        applied,
        failed,
    }
}

fn shift(anchor: usize, drift: isize) -> usize {
    if drift >= 0 {
        anchor.saturating_add(drift.unsigned_abs())
    } else {
        anchor.saturating_sub(drift.unsigned_abs())
    }
}

/// Fuzzy or max-fuzz placement inside `lower..upper`.
fn place_loose<'h>(
    lines: &[&str],
    lower: usize,
    upper: usize,
    expected: usize,
    hunk: &'h Hunk,
    mode: PatchMode,
) -> Option<Placement<'h>> {
    match mode {
        PatchMode::Offset => None,
        PatchMode::Fuzzy { min_score } => {
            let old = hunk.old_lines();
            let (start, score) = best_window(lines, lower, upper, expected, &old)?;
            Some(Placement {
                start,
                body: &hunk.lines,
                window: old.len(),
                trimmed: 0,
                quality: MatchQuality::Fuzzy { score },
                accepted: score >= min_score,
            })
        }
        PatchMode::MaxFuzz { max_fuzz } => {
            place_trimmed(lines, lower, upper, expected, hunk, max_fuzz)
        }
    }
}

/// Retry with up to `max_fuzz` context lines dropped from each end, GNU patch style.
fn place_trimmed<'h>(
    lines: &[&str],
    lower: usize,
    upper: usize,
    expected: usize,
    hunk: &'h Hunk,
    max_fuzz: usize,
) -> Option<Placement<'h>> {
    let leading = hunk.leading_context();
    let trailing = hunk.trailing_context();
    for fuzz in 1..=max_fuzz {
        let front = fuzz.min(leading);
        let back = fuzz.min(trailing);
        if front + back >= hunk.lines.len() {
            break;
        }
        let body = &hunk.lines[front..hunk.lines.len() - back];
        let old: Vec<&str> = body
            .iter()
            .filter(|line| !matches!(line, HunkLine::Insert(_)))
            .map(HunkLine::text)
            .collect();
        if old.is_empty() {
            break;
        }
        if let Some(start) = find_exact(lines, lower, upper, expected + front, &old) {
            return Some(Placement {
                start,
                body,
                window: old.len(),
                trimmed: front,
                quality: MatchQuality::Fuzz { distance: fuzz },
                accepted: true,
            });
        }
        if front == leading && back == trailing {
            break;
        }
    }
    None
}

/// Nearest exact occurrence of `old` inside `lower..upper`, searching outward
/// from `expected` no further than [`MAX_OFFSET`] lines.
fn find_exact(
    lines: &[&str],
    lower: usize,
    upper: usize,
    expected: usize,
    old: &[&str],
) -> Option<usize> {
    let upper = upper.min(lines.len());
    let available = upper.checked_sub(lower)?;
    if old.len() > available {
        return None;
    }
    let last = upper - old.len();
    let matches = |start: usize| lines[start..start + old.len()] == *old;
    let reach = |start: usize| start.abs_diff(expected) <= MAX_OFFSET;
    let first = expected.clamp(lower, last);
    for distance in 0..=(last - lower) {
        if distance > first.abs_diff(expected) + MAX_OFFSET {
            break;
        }
        let forward = first + distance;
        if forward <= last && reach(forward) && matches(forward) {
            return Some(forward);
        }
        if distance > 0 {
            if let Some(back) = first.checked_sub(distance).filter(|back| *back >= lower) {
                if reach(back) && matches(back) {
                    return Some(back);
                }
            }
        }
    }
    None
}

/// Highest-scoring window inside `lower..upper`, ties broken by closeness to `expected`.
///
/// The choice does not depend on any threshold, so a stricter minimum can only
/// turn an accepted window into a rejection.
fn best_window(
    lines: &[&str],
    lower: usize,
    upper: usize,
    expected: usize,
    old: &[&str],
) -> Option<(usize, f64)> {
    let upper = upper.min(lines.len());
    if old.is_empty() || old.len() > upper.saturating_sub(lower) {
        return None;
    }
    let last = upper - old.len();
    let mut best: Option<(usize, f64)> = None;
    for start in lower..=last {
        let score = window_score(&lines[start..start + old.len()], old);
        let better = match best {
            None => true,
            Some((pos, current)) => {
                score > current
                    || (score == current && start.abs_diff(expected) < pos.abs_diff(expected))
            }
        };
        if better {
            best = Some((start, score));
        }
    }
    best
}

fn window_score(window: &[&str], old: &[&str]) -> f64 {
    let total: f64 = window
        .iter()
        .zip(old)
        .map(|(actual, wanted)| similarity(actual.trim(), wanted.trim()))
        .sum();
    total / old.len() as f64
}

/// Normalized Levenshtein similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Write the hunk body over `window`; context lines keep the file's own text.
fn emit(out: &mut String, window: &[&str], body: &[HunkLine]) {
    let mut actual = window.iter();
    for line in body {
        match line {
            HunkLine::Context(text) => out.push_str(actual.next().copied().unwrap_or(text)),
            HunkLine::Delete(_) => {
                actual.next();
            }
            HunkLine::Insert(text) => out.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::format::FilePatch;

    fn foo_java(extra_header_lines: usize) -> String {
        let mut lines = Vec::new();
        lines.push("package net.minecraft;".to_string());
        for i in 0..extra_header_lines {
            lines.push(format!("import net.minecraft.Extra{i};"));
        }
        lines.extend(
            [
                "public class Foo {",
                "    private final String name;",
                "",
                "    public Foo(String name) {",
                "        this.name = name;",
                "    }",
                "",
                "    public int value() {",
                "        int x = 1;",
                "        return x;",
                "    }",
                "}",
            ]
            .map(str::to_string),
        );
        lines.join("\n") + "\n"
    }

    fn hunks(old: &str, new: &str) -> Vec<Hunk> {
        FilePatch::between("Foo.java", Some(old), Some(new), 3)
            .map(|patch| patch.hunks)
            .unwrap_or_default()
    }

    #[test]
    fn applies_at_recorded_position() {
        let old = foo_java(0);
        let new = old.replace("int x = 1;", "int x = 2;");
        let result = apply_hunks(&old, &hunks(&old, &new), PatchMode::Offset);
        assert_eq!(result.content, new);
        assert_eq!(result.quality, MatchQuality::Exact { offset: 0 });
        assert!(result.failed.is_empty());
    }

    #[test]
    fn tolerates_line_drift() {
        let old = foo_java(0);
        assert_eq!(old.lines().position(|l| l.contains("int x = 1;")), Some(10 - 1));
        let new = old.replace("int x = 1;", "int x = 2;");
        let patch = hunks(&old, &new);

        let drifted = foo_java(2);
        assert_eq!(drifted.lines().position(|l| l.contains("int x = 1;")), Some(12 - 1));
        let result = apply_hunks(&drifted, &patch, PatchMode::Offset);
        assert!(result.failed.is_empty());
        assert_eq!(result.quality, MatchQuality::Exact { offset: 2 });
        assert_eq!(result.content, drifted.replace("int x = 1;", "int x = 2;"));
        assert_eq!(
            result.content.lines().nth(12 - 1),
            Some("        int x = 2;")
        );
    }

    #[test]
    fn unmatched_hunk_is_returned() {
        let old = foo_java(0);
        let new = old.replace("int x = 1;", "int x = 2;");
        let patch = hunks(&old, &new);
        let changed = old.replace("return x;", "return x * 3;");
        let result = apply_hunks(&changed, &patch, PatchMode::Offset);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.applied, 0);
        assert_eq!(result.content, changed);
    }

    #[test]
    fn fuzzy_accepts_close_context_and_keeps_file_text() {
        let old = foo_java(0);
        let new = old.replace("int x = 1;", "int x = 2;");
        let patch = hunks(&old, &new);
        let changed = old.replace("return x;", "return x * 3;");

        let result = apply_hunks(&changed, &patch, PatchMode::Fuzzy { min_score: 0.5 });
        assert!(result.failed.is_empty());
        assert!(matches!(result.quality, MatchQuality::Fuzzy { score } if score >= 0.5 && score < 1.0));
        assert!(result.content.contains("int x = 2;"));
        assert!(result.content.contains("return x * 3;"));
    }

    #[test]
    fn raising_the_threshold_never_adds_successes() {
        let old = foo_java(0);
        let new = old.replace("int x = 1;", "int x = 2;");
        let patch = hunks(&old, &new);
        let changed = old
            .replace("return x;", "return x * 3;")
            .replace("    }\n}", "  }\n}");

        let mut previous = usize::MAX;
        for step in 0..=10_u8 {
            let min_score = f64::from(step) / 10.0;
            let result = apply_hunks(&changed, &patch, PatchMode::Fuzzy { min_score });
            if let MatchQuality::Fuzzy { score } = result.quality {
                assert!(score >= min_score);
            }
            assert!(result.applied <= previous);
            previous = result.applied;
        }
        assert_eq!(previous, 0);
    }

    fn section(name: &str) -> Vec<String> {
        ["one", "two", "three", "four", "five", "six", "seven"]
            .iter()
            .map(|word| format!("    {name}.{word}();\n"))
            .collect()
    }

    fn filler(tag: &str) -> Vec<String> {
        (0..8).map(|i| format!("// {tag} {i}\n")).collect()
    }

    /// Three separate hunks, one per section, each changing its fourth line.
    fn sectioned() -> (String, Vec<Hunk>) {
        let old: String = [
            section("alpha"),
            filler("a"),
            section("bravo"),
            filler("b"),
            section("charlie"),
        ]
        .concat()
        .concat();
        let new = ["alpha", "bravo", "charlie"].iter().fold(old.clone(), |text, name| {
            text.replace(&format!("{name}.four();"), &format!("{name}.four(true);"))
        });
        let patch = hunks(&old, &new);
        assert_eq!(patch.len(), 3);
        (old, patch)
    }

    #[test]
    fn loose_matches_stay_between_exact_neighbours() {
        let (old, patch) = sectioned();
        let near_copy: String = section("alpha")
            .iter()
            .map(|line| line.replace("();", "(0);"))
            .collect();
        let rewritten: String = (0..7).map(|i| format!("    // rewritten upstream {i}\n")).collect();
        let alpha: String = section("alpha").concat();
        let changed = old.replacen(&alpha, &rewritten, 1) + &near_copy;

        let mut previous = usize::MAX;
        for step in 0..=10_u8 {
            let min_score = f64::from(step) / 10.0;
            let result = apply_hunks(&changed, &patch, PatchMode::Fuzzy { min_score });
            assert!(result.applied <= previous, "min_score {min_score}");
            assert!(result.applied >= 2, "min_score {min_score}");
            assert!(result.content.contains("bravo.four(true);"));
            assert!(result.content.contains("charlie.four(true);"));
            assert!(result.content.ends_with(&near_copy));
            previous = result.applied;
        }

        let result = apply_hunks(&changed, &patch, PatchMode::Fuzzy { min_score: 0.5 });
        assert_eq!((result.applied, result.failed.len()), (2, 1));
        assert!(result.failed[0].old_lines().contains(&"    alpha.four();\n"));
    }

    #[test]
    fn exact_search_stops_at_the_offset_limit() {
        let (old, patch) = sectioned();
        let padding: String = (0..=MAX_OFFSET).map(|i| format!("// padding {i}\n")).collect();

        let near = format!("// padding\n{old}");
        let result = apply_hunks(&near, &patch, PatchMode::Offset);
        assert!(result.failed.is_empty());
        assert_eq!(result.quality, MatchQuality::Exact { offset: 1 });

        let far = format!("{padding}{old}");
        let result = apply_hunks(&far, &patch, PatchMode::Offset);
        assert_eq!(result.applied, 0);
        assert_eq!(result.content, far);
    }

    #[test]
    fn max_fuzz_drops_outer_context() {
        let old = foo_java(0);
        let new = old.replace("int x = 1;", "int x = 2;");
        let patch = hunks(&old, &new);
        let changed = old.replace("\n}\n", "\n} // end of Foo\n");

        assert_eq!(apply_hunks(&changed, &patch, PatchMode::Offset).failed.len(), 1);
        let result = apply_hunks(&changed, &patch, PatchMode::MaxFuzz { max_fuzz: 2 });
        assert!(result.failed.is_empty());
        assert_eq!(result.quality, MatchQuality::Fuzz { distance: 1 });
        assert_eq!(result.content, changed.replace("int x = 1;", "int x = 2;"));
        assert_eq!(
            apply_hunks(&changed, &patch, PatchMode::MaxFuzz { max_fuzz: 0 })
                .failed
                .len(),
            1
        );
    }

    #[test]
    fn fuzzy_mode_rejects_out_of_range_scores() {
        assert!(PatchMode::fuzzy(0.5).is_ok());
        let err = PatchMode::fuzzy(1.5).unwrap_err();
        assert_eq!(crate::error::classify(&err).map(Error::code), Some("RM501"));
        assert!(PatchMode::fuzzy(f64::NAN).is_err());
    }

    #[test]
    fn similarity_is_normalized() {
        assert!((similarity("abc", "abc") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("abc", "xyz").abs() < f64::EPSILON);
        assert!((similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn worst_quality_prefers_the_loosest_match() {
        let exact = MatchQuality::Exact { offset: 0 };
        assert_eq!(
            exact.worst(MatchQuality::Exact { offset: -4 }),
            MatchQuality::Exact { offset: -4 }
        );
        assert_eq!(
            MatchQuality::Fuzzy { score: 0.9 }.worst(exact),
            MatchQuality::Fuzzy { score: 0.9 }
        );
        assert_eq!(
            MatchQuality::Fuzz { distance: 1 }.worst(MatchQuality::Fuzzy { score: 0.8 }),
            MatchQuality::Fuzzy { score: 0.8 }
        );
    }
}
