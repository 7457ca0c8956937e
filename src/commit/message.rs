//! Committing the staged index with the chosen message.

use git2::{Oid, Repository};
use tracing::debug;

use crate::error::CommitError;

/// Create a commit on HEAD from the current index.
///
/// Works on an unborn branch too, producing a root commit.
pub fn commit_staged(repo: &Repository, message: &str) -> Result<Oid, CommitError> {
    let mut index = repo.index().map_err(CommitError::StagingFailed)?;
    let tree_id = index.write_tree().map_err(CommitError::StagingFailed)?;
    let tree = repo.find_tree(tree_id).map_err(CommitError::CommitFailed)?;

    // Get the signature from git config
    let sig = repo.signature().map_err(CommitError::ConfigError)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().map_err(CommitError::CommitFailed)?),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch || e.code() == git2::ErrorCode::NotFound => None,
        Err(e) => return Err(CommitError::CommitFailed(e)),
    };
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message.trim(), &tree, &parents)
        .map_err(CommitError::CommitFailed)?;

    debug!("Created commit {}", oid);
    Ok(oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::path::Path;

    fn repo_with_identity(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        repo
    }

    fn stage(repo: &Repository, dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    #[test]
    fn test_commit_staged_creates_root_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_with_identity(dir.path());
        stage(&repo, dir.path(), "a.txt", "a\n");

        let oid = commit_staged(&repo, "feat: add a\n").unwrap();
        let commit = repo.find_commit(oid).unwrap();
        assert_eq!(commit.message(), Some("feat: add a"));
        assert_eq!(commit.parent_count(), 0);
    }

    #[test]
    fn test_commit_staged_keeps_unstaged_changes_out() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_with_identity(dir.path());
        stage(&repo, dir.path(), "a.txt", "a\n");
        let first = commit_staged(&repo, "feat: add a").unwrap();

        stage(&repo, dir.path(), "b.txt", "b\n");
        std::fs::write(dir.path().join("c.txt"), "c\n").unwrap();
        let oid = commit_staged(&repo, "feat: add b\n\nBody text.").unwrap();

        let commit = repo.find_commit(oid).unwrap();
        assert_eq!(commit.parent_id(0).unwrap(), first);
        assert_eq!(commit.message(), Some("feat: add b\n\nBody text."));
        let tree = commit.tree().unwrap();
        assert!(tree.get_name("b.txt").is_some());
        assert!(tree.get_name("c.txt").is_none());
    }

    #[test]
    fn test_commit_uses_configured_identity() {
        // The author comes from the repo config, not from the parent commit.
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_with_identity(dir.path());
        let sig = Signature::now("Other", "other@test.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();

        stage(&repo, dir.path(), "x.txt", "x\n");
        let oid = commit_staged(&repo, "chore: x").unwrap();
        let commit = repo.find_commit(oid).unwrap();
        assert_eq!(commit.author().name(), Some("Test"));
        assert_eq!(commit.parent_count(), 1);
    }
}
