use {
    crate::{
        error::{ReleaseError, Result},
        utils::Git,
    },
    log::info,
    std::path::{Path, PathBuf},
};

/// What to do with pending changes before a release commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanPolicy {
    AutoCommit(String),
    AbortIfDirty,
}

/// Full object id of a commit.
pub type CommitRef = String;

pub struct RepoGate {
    git: Git,
}

impl RepoGate {
    pub fn new(git: Git) -> Self {
        Self { git }
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    pub async fn head(&self) -> Result<CommitRef> {
        self.git.run(&["rev-parse", "HEAD"]).await
    }

    /// Paths with pending changes, as reported by `git status --porcelain -z`.
    ///
    /// Renames and copies report their destination path.
    pub async fn dirty_paths(&self) -> Result<Vec<String>> {
        let args = ["status", "--porcelain", "-z", "--untracked-files=all"];
        let output = self.git.output(&args).await?;
        if !output.status.success() {
            return Err(ReleaseError::git(
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(parse_status(&String::from_utf8_lossy(&output.stdout)))
    }

    pub async fn ensure_clean(&self, policy: &CleanPolicy) -> Result<CommitRef> {
        let dirty = self.dirty_paths().await?;
        if dirty.is_empty() {
            return self.head().await;
        }
        match policy {
            CleanPolicy::AbortIfDirty => Err(ReleaseError::DirtyWorkingTree { paths: dirty }),
            CleanPolicy::AutoCommit(message) => {
                info!("committing {} pending change(s)", dirty.len());
                self.git.run(&["add", "--all"]).await?;
                self.git.run(&["commit", "--quiet", "-m", message]).await?;
                self.head().await
            }
        }
    }

    /// Commits exactly `paths`, leaving any other change unstaged.
    pub async fn commit_paths(&self, paths: &[PathBuf], message: &str) -> Result<CommitRef> {
        if paths.is_empty() {
            return self.head().await;
        }
        let relative: Vec<String> = paths
            .iter()
            .map(|p| self.relative(p).display().to_string())
            .collect();
        let mut add = vec!["add", "--"];
        add.extend(relative.iter().map(String::as_str));
        self.git.run(&add).await?;

        let mut commit = vec!["commit", "--quiet", "-m", message, "--"];
        commit.extend(relative.iter().map(String::as_str));
        self.git.run(&commit).await?;
        self.head().await
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(self.git.root()).unwrap_or(path)
    }
}

/// Parses NUL-separated `XY <path>` records; a rename or copy record is
/// followed by a record holding its source path.
fn parse_status(status: &str) -> Vec<String> {
    let mut paths = vec![];
    let mut records = status.split('\0').filter(|r| !r.is_empty());
    while let Some(record) = records.next() {
        let (Some(xy), Some(path)) = (record.get(..2), record.get(3..)) else {
            continue;
        };
        if xy.contains(['R', 'C']) {
            records.next();
        }
        paths.push(path.to_string());
    }
    paths
}
