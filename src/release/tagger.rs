//! Release tags that are replaced, never merged.

use {
    crate::{error::Result, utils::Git},
    log::{debug, info},
};

pub struct Tagger {
    git: Git,
    /// `None` keeps every operation local.
    remote: Option<String>,
    push_branch: bool,
}

impl Tagger {
    pub fn new(git: Git, remote: Option<String>, push_branch: bool) -> Self {
        Self {
            git,
            remote,
            push_branch,
        }
    }

    /// Points tag `name` at `commit`, locally and on the remote.
    ///
    /// A missing tag is treated as an already satisfied precondition, so calling
    /// this twice with the same arguments leaves the same final state.
    pub async fn retag(&self, name: &str, commit: &str) -> Result<()> {
        let tag_ref = format!("refs/tags/{name}");

        if self.local_tag_exists(&tag_ref).await? {
            debug!("deleting local tag {name}");
            self.git.run(&["tag", "--delete", name]).await?;
        }

        if let Some(remote) = &self.remote {
            if self.remote_tag_exists(remote, &tag_ref).await? {
                info!("deleting tag {name} on {remote}");
                self.git
                    .run(&["push", "--quiet", remote, &format!(":{tag_ref}")])
                    .await?;
            }
        }

        self.git.run(&["tag", name, commit]).await?;
        info!("tagged {commit} as {name}");

        if let Some(remote) = &self.remote {
            if self.push_branch {
                self.git.run(&["push", "--quiet", remote, "HEAD"]).await?;
            }
            self.git.run(&["push", "--quiet", remote, &tag_ref]).await?;
            info!("pushed {name} to {remote}");
        }
        Ok(())
    }

    async fn local_tag_exists(&self, tag_ref: &str) -> Result<bool> {
        let output = self
            .git
            .output(&["rev-parse", "--quiet", "--verify", tag_ref])
            .await?;
        Ok(output.status.success())
    }

    async fn remote_tag_exists(&self, remote: &str, tag_ref: &str) -> Result<bool> {
        let listing = self.git.run(&["ls-remote", "--tags", remote, tag_ref]).await?;
        Ok(!listing.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::utils::git::test_support::{git, TestRepo},
        pretty_assertions::assert_eq,
    };

    fn tagger(repo: &TestRepo) -> Tagger {
        Tagger::new(repo.git(), Some("origin".to_string()), true)
    }

    #[tokio::test]
    async fn test_retag_creates_and_pushes() {
        let repo = TestRepo::new();
        let head = repo.head();

        tagger(&repo).retag("v1.2.4", &head).await.unwrap();

        assert_eq!(git(repo.work.path(), &["rev-parse", "v1.2.4"]), head);
        assert_eq!(repo.remote_tags(), vec![format!("{head} refs/tags/v1.2.4")]);
    }

    #[tokio::test]
    async fn test_retag_twice_is_idempotent() {
        let repo = TestRepo::new();
        let head = repo.head();
        let tagger = tagger(&repo);

        tagger.retag("v1.2.4", &head).await.unwrap();
        tagger.retag("v1.2.4", &head).await.unwrap();

        assert_eq!(git(repo.work.path(), &["tag", "--list"]), "v1.2.4");
        assert_eq!(git(repo.work.path(), &["rev-parse", "v1.2.4"]), head);
        assert_eq!(repo.remote_tags(), vec![format!("{head} refs/tags/v1.2.4")]);
    }

    #[tokio::test]
    async fn test_retag_moves_existing_tag() {
        let repo = TestRepo::new();
        let first = repo.head();
        let tagger = tagger(&repo);
        tagger.retag("v0.1.6", &first).await.unwrap();

        let second = repo.commit_file("fix.txt", "fix\n");
        tagger.retag("v0.1.6", &second).await.unwrap();

        assert_eq!(git(repo.work.path(), &["rev-parse", "v0.1.6"]), second);
        assert_eq!(repo.remote_tags(), vec![format!("{second} refs/tags/v0.1.6")]);
    }

    #[tokio::test]
    async fn test_retag_without_remote_stays_local() {
        let repo = TestRepo::new();
        let head = repo.head();

        Tagger::new(repo.git(), None, true)
            .retag("v3.0.0", &head)
            .await
            .unwrap();

        assert_eq!(git(repo.work.path(), &["rev-parse", "v3.0.0"]), head);
        assert!(repo.remote_tags().is_empty());
    }
}
