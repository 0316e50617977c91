//! Recent commit history extraction from git repositories.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository};
use serde::Serialize;

use crate::Result;

/// Information about a single commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Short commit hash (7 characters)
    pub hash: String,

    /// First line of the commit message
    pub message: String,

    /// Commit author name
    pub author: String,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    fn from_commit(commit: &git2::Commit<'_>) -> Self {
        let dt: DateTime<Utc> = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_default();

        let message = commit
            .message()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .to_string();

        let author = commit.author();
        let author_name = author.name().unwrap_or("Unknown").to_string();

        Self {
            hash: format!("{:.7}", commit.id()),
            message,
            author: author_name,
            timestamp: dt,
        }
    }
}

/// Extract the last `max_count` commits reachable from `tip`.
///
/// Performs a time-sorted revwalk. Returns commits in reverse-chronological
/// order (most recent first).
pub fn list_recent_commits(repo: &Repository, tip: Oid, max_count: usize) -> Result<Vec<CommitInfo>> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip)?;
    revwalk.set_sorting(git2::Sort::TIME)?;

    let mut commits = Vec::with_capacity(max_count);
    for oid_result in revwalk.take(max_count) {
        let commit = repo.find_commit(oid_result?)?;
        commits.push(CommitInfo::from_commit(&commit));
    }

    Ok(commits)
}

/// Count every commit reachable from `tip`.
pub fn count_commits(repo: &Repository, tip: Oid) -> Result<usize> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip)?;
    let mut count = 0;
    for oid in revwalk {
        oid?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_empty(repo: &Repository, message: &str) -> Oid {
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit<'_>> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn lists_most_recent_first_with_first_line_only() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_empty(&repo, "Initial");
        let tip = commit_empty(&repo, "Sync: 1 new\n\n  added: a.jpg");

        let commits = list_recent_commits(&repo, tip, 10).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "Sync: 1 new");
        assert_eq!(commits[0].hash.len(), 7);
        assert_eq!(commits[0].author, "Test User");
    }

    #[test]
    fn counts_all_reachable_commits() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_empty(&repo, "one");
        commit_empty(&repo, "two");
        let tip = commit_empty(&repo, "three");

        assert_eq!(count_commits(&repo, tip).unwrap(), 3);
    }
}
