use {
    crate::{
        error::{ReleaseError, Result},
        utils::process::{run_with_timeout, tail},
    },
    anyhow::anyhow,
    std::{
        path::{Path, PathBuf},
        process::{Command, Output},
        time::Duration,
    },
};

pub fn get_git_root_path() -> anyhow::Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|e| anyhow!("failed to get git root path, error: {e}"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "failed to get git root path, error: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(root))
}

/// Thin wrapper over the `git` executable rooted at one working tree.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs git and returns the raw output regardless of exit status.
    pub async fn output(&self, args: &[&str]) -> Result<Output> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        run_with_timeout("git", &args, &self.root, &[], self.timeout)
            .await
            .map_err(|e| ReleaseError::git(args.join(" "), e.to_string()))
    }

    /// Runs git, failing on a non-zero exit, and returns trimmed stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(ReleaseError::git(args.join(" "), tail(&output.stderr, 5)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use {super::Git, std::process::Command, tempfile::TempDir};

    pub fn git(dir: &std::path::Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// A working tree with one commit and a bare `origin` remote.
    pub struct TestRepo {
        pub work: TempDir,
        pub remote: TempDir,
    }

    impl TestRepo {
        pub fn new() -> Self {
            let remote = tempfile::tempdir().unwrap();
            git(remote.path(), &["init", "--bare", "-q"]);

            let work = tempfile::tempdir().unwrap();
            git(work.path(), &["init", "-q"]);
            git(work.path(), &["config", "user.name", "Release Bot"]);
            git(work.path(), &["config", "user.email", "release@example.org"]);
            git(work.path(), &["config", "commit.gpgsign", "false"]);
            git(work.path(), &["config", "tag.gpgsign", "false"]);
            git(
                work.path(),
                &["remote", "add", "origin", remote.path().to_str().unwrap()],
            );
            std::fs::write(work.path().join("README.md"), "hfd\n").unwrap();
            git(work.path(), &["add", "-A"]);
            git(work.path(), &["commit", "-q", "-m", "initial"]);

            Self { work, remote }
        }

        pub fn git(&self) -> Git {
            Git::new(self.work.path())
        }

        pub fn head(&self) -> String {
            git(self.work.path(), &["rev-parse", "HEAD"])
        }

        pub fn commit_file(&self, name: &str, content: &str) -> String {
            std::fs::write(self.work.path().join(name), content).unwrap();
            git(self.work.path(), &["add", "-A"]);
            git(self.work.path(), &["commit", "-q", "-m", name]);
            self.head()
        }

        /// `<sha> refs/tags/<name>` lines; `show-ref` exits 1 when there are none.
        pub fn remote_tags(&self) -> Vec<String> {
            let output = Command::new("git")
                .args(["show-ref", "--tags"])
                .current_dir(self.remote.path())
                .output()
                .unwrap();
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::to_string)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{test_support::TestRepo, *},
        pretty_assertions::assert_eq,
        serial_test::serial,
        std::fs,
    };

    #[test]
    #[serial]
    fn test_get_git_root_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let previous = std::env::current_dir().unwrap();
        let _restore = scopeguard::guard(previous, |dir| {
            let _ = std::env::set_current_dir(dir);
        });

        std::env::set_current_dir(temp_dir.path()).unwrap();
        Command::new("git").args(["init"]).output().unwrap();

        let root_path = get_git_root_path().unwrap();

        let canonicalized_root_path = fs::canonicalize(root_path).unwrap();
        let canonicalized_temp_dir_path = fs::canonicalize(temp_dir.path()).unwrap();

        assert_eq!(canonicalized_root_path, canonicalized_temp_dir_path);
    }

    #[tokio::test]
    async fn test_run_reports_failures() {
        let repo = TestRepo::new();
        let git = repo.git();

        assert_eq!(git.run(&["rev-parse", "HEAD"]).await.unwrap(), repo.head());

        let err = git
            .run(&["rev-parse", "--verify", "refs/tags/missing"])
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Git { .. }), "{err}");
    }
}
