//! Unified diff parsing for pull request diffs.
//!
//! Both Bitbucket dialects return the pull request diff as raw `git diff`
//! text. It is split per file and per hunk so callers never handle the raw
//! text.

/// Kind of a line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    /// Unchanged context line.
    Context,
    /// Line added by the change.
    Addition,
    /// Line removed by the change.
    Deletion,
}

/// A single line inside a hunk, without its `+`/`-`/space marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    /// Line kind.
    pub kind: DiffLineKind,
    /// Line text.
    pub content: String,
}

/// A hunk introduced by an `@@ -a,b +c,d @@` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffHunk {
    /// Raw hunk header line.
    pub header: String,
    /// Lines in the hunk.
    pub lines: Vec<DiffLine>,
}

/// Changes to one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// Path before the change; `None` for added files.
    pub from: Option<String>,
    /// Path after the change; `None` for deleted files.
    pub to: Option<String>,
    /// Hunks in file order.
    pub hunks: Vec<DiffHunk>,
    /// Number of added lines.
    pub additions: usize,
    /// Number of deleted lines.
    pub deletions: usize,
}

impl FileDiff {
    /// Path to display: the new path, or the old one for deletions.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.to.as_deref().or(self.from.as_deref())
    }

    fn push_line(&mut self, kind: DiffLineKind, content: &str) {
        match kind {
            DiffLineKind::Addition => self.additions += 1,
            DiffLineKind::Deletion => self.deletions += 1,
            DiffLineKind::Context => {}
        }
        if self.hunks.is_empty() {
            self.hunks.push(DiffHunk::default());
        }
        if let Some(hunk) = self.hunks.last_mut() {
            hunk.lines.push(DiffLine {
                kind,
                content: content.to_owned(),
            });
        }
    }
}

/// Parses unified diff text into per-file changes.
///
/// Lines outside a recognised file section are ignored, so an empty or
/// unrecognised body yields an empty list.
///
/// # Example
///
/// ```
/// use bucketline::bitbucket::diff::parse_unified_diff;
///
/// let text = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-old\n+new\n";
/// let files = parse_unified_diff(text);
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].additions, 1);
/// ```
#[must_use]
pub fn parse_unified_diff(text: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut in_hunk = false;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            files.push(file_from_git_header(rest));
            in_hunk = false;
            continue;
        }

        let Some(current) = files.last_mut() else {
            if line.starts_with("--- ") {
                files.push(FileDiff::default());
                apply_path_header(files.last_mut(), line);
            }
            continue;
        };

        if line.starts_with("@@") {
            current.hunks.push(DiffHunk {
                header: line.to_owned(),
                lines: Vec::new(),
            });
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            apply_path_header(Some(current), line);
            continue;
        }

        if let Some(added) = line.strip_prefix('+') {
            current.push_line(DiffLineKind::Addition, added);
        } else if let Some(removed) = line.strip_prefix('-') {
            current.push_line(DiffLineKind::Deletion, removed);
        } else if let Some(context) = line.strip_prefix(' ') {
            current.push_line(DiffLineKind::Context, context);
        } else if line.is_empty() {
            current.push_line(DiffLineKind::Context, "");
        }
    }

    files
}

fn file_from_git_header(rest: &str) -> FileDiff {
    let (from, to) = rest
        .split_once(" b/")
        .map_or((None, None), |(from, to)| {
            (
                Some(from.strip_prefix("a/").unwrap_or(from).to_owned()),
                Some(to.to_owned()),
            )
        });
    FileDiff {
        from,
        to,
        ..FileDiff::default()
    }
}

fn apply_path_header(file: Option<&mut FileDiff>, line: &str) {
    let Some(file) = file else {
        return;
    };
    if let Some(path) = line.strip_prefix("--- ") {
        file.from = strip_path_marker(path, "a/");
    } else if let Some(path) = line.strip_prefix("+++ ") {
        file.to = strip_path_marker(path, "b/");
    }
}

fn strip_path_marker(path: &str, marker: &str) -> Option<String> {
    let trimmed = path.split('\t').next().unwrap_or(path).trim();
    if trimmed == "/dev/null" {
        return None;
    }
    Some(trimmed.strip_prefix(marker).unwrap_or(trimmed).to_owned())
}
