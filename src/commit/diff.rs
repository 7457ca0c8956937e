//! Staged diff collection using git2.

use std::fmt;
use std::path::Path;

use git2::{
    Delta, Diff, DiffDelta, DiffFormat, ErrorCode, Pathspec, PathspecFlags, Repository, Tree,
};
use tracing::{debug, warn};

use crate::error::CommitError;

/// Maximum characters for the unified diff text before truncation.
const MAX_DIFF_LENGTH: usize = 30_000;

/// Generated files that add noise without helping the message.
const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "bun.lockb",
    "Cargo.lock",
    "Gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "go.sum",
];

/// Status of a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "Added"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Deleted => write!(f, "Deleted"),
            FileStatus::Renamed => write!(f, "Renamed"),
        }
    }
}

/// A file with staged changes.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// Old path for renamed files (None for non-rename changes).
    pub old_path: Option<String>,
}

/// Summary of the staged changes sent to the backends.
#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub diff_text: String,
    pub changed_files: Vec<ChangedFile>,
    /// Staged files left out by `exclude` or the lock-file list.
    pub excluded_files: Vec<String>,
    pub truncated: bool,
    pub additions: usize,
    pub deletions: usize,
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found).
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, CommitError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e)
            if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound =>
        {
            return Ok(None);
        }
        Err(e) => return Err(CommitError::DiffFailed(e)),
    };

    let tree = head_ref.peel_to_tree().map_err(CommitError::DiffFailed)?;
    Ok(Some(tree))
}

/// Collect the staged diff (HEAD tree to index).
///
/// Files matching an `exclude` pattern, and well-known lock files, are
/// skipped. Returns [`CommitError::NoChanges`] when nothing is left.
pub fn collect_staged_diff(
    repo: &Repository,
    exclude: &[String],
) -> Result<DiffSummary, CommitError> {
    let filter = ExcludeFilter::new(exclude)?;
    let head_tree = resolve_head_tree(repo)?;
    let staged = repo
        .diff_tree_to_index(head_tree.as_ref(), None, None)
        .map_err(CommitError::DiffFailed)?;

    let mut changed_files = Vec::new();
    let mut excluded_files = Vec::new();
    for delta in staged.deltas() {
        let Some(file) = changed_file(&delta) else {
            continue;
        };
        if filter.is_excluded(&file.path) {
            excluded_files.push(file.path);
        } else {
            changed_files.push(file);
        }
    }

    if !excluded_files.is_empty() {
        debug!("Excluded from diff: {}", excluded_files.join(", "));
    }
    if changed_files.is_empty() {
        return Err(CommitError::NoChanges);
    }

    let mut summary = DiffSummary {
        diff_text: String::new(),
        changed_files,
        excluded_files,
        truncated: false,
        additions: 0,
        deletions: 0,
    };
    append_diff_text(&staged, &filter, &mut summary);
    Ok(summary)
}

/// Stage modifications and deletions of tracked files (like `git add -u`).
pub fn stage_tracked(repo: &Repository) -> Result<(), CommitError> {
    let mut index = repo.index().map_err(CommitError::StagingFailed)?;
    index
        .update_all(["*"].iter(), None)
        .map_err(CommitError::StagingFailed)?;
    index.write().map_err(CommitError::StagingFailed)
}

/// Compiled `exclude` patterns plus the built-in lock-file list.
///
/// Patterns use git pathspec syntax: globs (`src/*.rs`, `*.generated.*`),
/// exact paths and directory prefixes (`docs`, `vendor/`). A pattern is
/// also tried against the bare file name, so `README.md` matches in any
/// directory.
pub struct ExcludeFilter {
    pathspec: Option<Pathspec>,
}

impl ExcludeFilter {
    pub fn new(patterns: &[String]) -> Result<Self, CommitError> {
        let patterns: Vec<&str> = patterns
            .iter()
            .map(|p| p.trim().trim_start_matches("./").trim_end_matches('/'))
            .filter(|p| !p.is_empty())
            .collect();

        // An empty pathspec matches everything.
        if patterns.is_empty() {
            return Ok(Self { pathspec: None });
        }

        let pathspec = Pathspec::new(patterns).map_err(CommitError::DiffFailed)?;
        Ok(Self {
            pathspec: Some(pathspec),
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if LOCK_FILES.contains(&file_name) {
            return true;
        }

        self.pathspec.as_ref().is_some_and(|spec| {
            spec.matches_path(Path::new(path), PathspecFlags::DEFAULT)
                || spec.matches_path(Path::new(file_name), PathspecFlags::DEFAULT)
        })
    }
}

fn changed_file(delta: &DiffDelta<'_>) -> Option<ChangedFile> {
    let status = match delta.status() {
        Delta::Added | Delta::Untracked | Delta::Copied => FileStatus::Added,
        Delta::Deleted => FileStatus::Deleted,
        Delta::Renamed => FileStatus::Renamed,
        _ => FileStatus::Modified,
    };

    let new_path = delta_path(delta, true);
    let old_path = delta_path(delta, false);

    let (path, old_path) = match status {
        FileStatus::Renamed => (new_path.clone().or_else(|| old_path.clone())?, old_path),
        _ => (new_path.or(old_path)?, None),
    };

    (!path.is_empty()).then_some(ChangedFile { path, status, old_path })
}

fn delta_path(delta: &DiffDelta<'_>, new: bool) -> Option<String> {
    let file = if new { delta.new_file() } else { delta.old_file() };
    file.path().map(|p| p.to_string_lossy().to_string())
}

/// Append unified diff text for the non-excluded files, respecting the max length.
fn append_diff_text(diff: &Diff<'_>, filter: &ExcludeFilter, summary: &mut DiffSummary) {
    let result = diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        if summary.truncated {
            return true;
        }
        let skip = delta_path(&delta, true)
            .or_else(|| delta_path(&delta, false))
            .is_some_and(|path| filter.is_excluded(&path));
        if skip {
            return true;
        }

        let origin = line.origin();
        match origin {
            '+' => summary.additions += 1,
            '-' => summary.deletions += 1,
            _ => {}
        }

        let content = std::str::from_utf8(line.content()).unwrap_or("");
        if summary.diff_text.len() + content.len() + 2 > MAX_DIFF_LENGTH {
            summary.truncated = true;
            return true;
        }

        if origin == '+' || origin == '-' || origin == ' ' {
            summary.diff_text.push(origin);
        }
        summary.diff_text.push_str(content);
        true
    });

    if let Err(e) = result {
        warn!("Failed to collect diff text: {e}");
        summary.truncated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_with_commit(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        {
            let sig = git2::Signature::now("Test", "test@test.com").unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        }
        repo
    }

    fn stage(repo: &Repository, dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    #[test]
    fn test_file_status_display() {
        assert_eq!(FileStatus::Added.to_string(), "Added");
        assert_eq!(FileStatus::Renamed.to_string(), "Renamed");
    }

    #[test]
    fn test_clean_repo_returns_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_commit(dir.path());

        let result = collect_staged_diff(&repo, &[]);
        assert!(matches!(result, Err(CommitError::NoChanges)));
    }

    #[test]
    fn test_unstaged_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_commit(dir.path());
        std::fs::write(dir.path().join("untracked.txt"), "hello\n").unwrap();

        let result = collect_staged_diff(&repo, &[]);
        assert!(matches!(result, Err(CommitError::NoChanges)));
    }

    #[test]
    fn test_staged_file_in_empty_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        stage(&repo, dir.path(), "new.txt", "hello world\n");

        let summary = collect_staged_diff(&repo, &[]).unwrap();
        assert_eq!(summary.changed_files.len(), 1);
        assert_eq!(summary.changed_files[0].status, FileStatus::Added);
        assert!(summary.diff_text.contains("+hello world"));
        assert_eq!(summary.additions, 1);
    }

    #[test]
    fn test_exclude_and_lock_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_commit(dir.path());
        stage(&repo, dir.path(), "src/main.rs", "fn main() {}\n");
        stage(&repo, dir.path(), "Cargo.lock", "# lock\n");
        stage(&repo, dir.path(), "docs/guide.md", "# Guide\n");

        let summary = collect_staged_diff(&repo, &["docs".to_string()]).unwrap();
        let paths: Vec<&str> = summary.changed_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.rs"]);
        assert_eq!(summary.excluded_files.len(), 2);
        assert!(!summary.diff_text.contains("# lock"));
        assert!(!summary.diff_text.contains("# Guide"));
    }

    #[test]
    fn test_only_excluded_changes_is_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_commit(dir.path());
        stage(&repo, dir.path(), "yarn.lock", "x\n");

        let result = collect_staged_diff(&repo, &[]);
        assert!(matches!(result, Err(CommitError::NoChanges)));
    }

    #[test]
    fn test_corrupt_head_propagates_error() {
        let dir = tempfile::tempdir().unwrap();
        init_with_commit(dir.path());
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/\0invalid").unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let result = collect_staged_diff(&repo, &[]);
        assert!(
            matches!(result, Err(CommitError::DiffFailed(_))),
            "Expected DiffFailed for corrupt HEAD, got: {:?}",
            result
        );
    }

    #[test]
    fn test_stage_tracked_picks_up_modifications_only() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        stage(&repo, dir.path(), "tracked.txt", "v1\n");
        {
            let sig = git2::Signature::now("Test", "test@test.com").unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        }

        std::fs::write(dir.path().join("tracked.txt"), "v2\n").unwrap();
        std::fs::write(dir.path().join("untracked.txt"), "new\n").unwrap();
        stage_tracked(&repo).unwrap();

        let summary = collect_staged_diff(&repo, &[]).unwrap();
        let paths: Vec<&str> = summary.changed_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["tracked.txt"]);
        assert_eq!(summary.changed_files[0].status, FileStatus::Modified);
    }

    #[test]
    fn test_exclude_filter_patterns() {
        let exclude = vec![
            "*.snap".to_string(),
            "vendor/".to_string(),
            "README.md".to_string(),
            "src/*.rs".to_string(),
            "*.generated.*".to_string(),
        ];
        let filter = ExcludeFilter::new(&exclude).unwrap();
        assert!(filter.is_excluded("tests/__snapshots__/a.snap"));
        assert!(filter.is_excluded("vendor/lib/x.js"));
        assert!(filter.is_excluded("docs/README.md"));
        assert!(filter.is_excluded("src/main.rs"));
        assert!(filter.is_excluded("api.generated.ts"));
        assert!(filter.is_excluded("web/client.generated.js"));
        assert!(!filter.is_excluded("lib/vendor.rs"));
        assert!(!filter.is_excluded("lib/main.rs"));
        assert!(!filter.is_excluded("api.ts"));
    }

    #[test]
    fn test_empty_exclude_only_skips_lock_files() {
        let filter = ExcludeFilter::new(&[" ".to_string()]).unwrap();
        assert!(filter.is_excluded("web/package-lock.json"));
        assert!(!filter.is_excluded("src/lib.rs"));
    }

    #[test]
    fn test_wildcard_exclude_in_staged_diff() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_with_commit(dir.path());
        stage(&repo, dir.path(), "src/main.rs", "fn main() {}\n");
        stage(&repo, dir.path(), "src/api.generated.ts", "export {}\n");
        stage(&repo, dir.path(), "README.md", "# Readme\n");

        let summary = collect_staged_diff(&repo, &["src/*.rs".to_string()]).unwrap();
        let paths: Vec<&str> = summary.changed_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/api.generated.ts"]);
        assert_eq!(summary.excluded_files, vec!["src/main.rs"]);
        assert!(!summary.diff_text.contains("fn main()"));
    }
}
