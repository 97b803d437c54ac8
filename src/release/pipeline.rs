//! The two halves of a release.
//!
//! [`bump`] runs on a developer machine: Versioner → VersionStore → RepoGate →
//! Tagger. Pushing the tag triggers [`ship`] in CI: matrix → aggregation →
//! publish. Any error in [`bump`] happens before the tag exists; nothing after
//! the tag is rolled back.

use {
    crate::{
        commands::bump_version::{bump_version, BumpPolicy},
        error::{ReleaseError, Result},
        release::{
            aggregator,
            matrix::{MatrixReport, MatrixRunner},
            publisher::{publish, RegistryTarget},
            repo_gate::{CleanPolicy, CommitRef, RepoGate},
            tagger::Tagger,
            version_store::VersionStore,
        },
        types::{BuildCell, PublishReport, StagingSet, Version},
        utils::{find_cargo_locks, refresh_cargo_lock},
    },
    log::info,
    std::{
        path::{Path, PathBuf},
        sync::Arc,
    },
};

#[derive(Debug, Clone)]
pub struct BumpRequest {
    pub policy: BumpPolicy,
    /// Commit every pending change with the release commit instead of aborting.
    pub auto_commit: bool,
    /// `{version}` and `{tag}` are substituted.
    pub commit_message: String,
    /// Re-pin the `Cargo.lock` files of rewritten Cargo manifests.
    pub refresh_lockfiles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpOutcome {
    pub previous: Version,
    pub version: Version,
    pub tag: String,
    pub commit: CommitRef,
    pub rewritten: Vec<PathBuf>,
}

/// Current and next version, without touching anything.
pub fn plan_bump(store: &VersionStore, policy: &BumpPolicy) -> Result<(Version, Version)> {
    let current = store.read()?;
    let next = bump_version(policy, &current)?;
    Ok((current, next))
}

pub fn render_message(template: &str, version: &Version) -> String {
    template
        .replace("{version}", &version.to_string())
        .replace("{tag}", &version.tag_name())
}

pub async fn bump(
    store: &VersionStore,
    gate: &RepoGate,
    tagger: &Tagger,
    request: &BumpRequest,
) -> Result<BumpOutcome> {
    let (previous, version) = plan_bump(store, &request.policy)?;
    info!("bumping {previous} -> {version}");
    let message = render_message(&request.commit_message, &version);

    let (commit, rewritten) = if request.auto_commit {
        let rewritten = write_version(store, gate, &version, request).await?;
        let commit = gate
            .ensure_clean(&CleanPolicy::AutoCommit(message))
            .await?;
        (commit, rewritten)
    } else {
        gate.ensure_clean(&CleanPolicy::AbortIfDirty).await?;
        let rewritten = write_version(store, gate, &version, request).await?;
        let commit = gate.commit_paths(&rewritten, &message).await?;
        (commit, rewritten)
    };

    let tag = version.tag_name();
    tagger.retag(&tag, &commit).await?;

    Ok(BumpOutcome {
        previous,
        version,
        tag,
        commit,
        rewritten,
    })
}

/// Rewrites the manifests, then the lock files pinning them. Returns every
/// file that changed.
async fn write_version(
    store: &VersionStore,
    gate: &RepoGate,
    version: &Version,
    request: &BumpRequest,
) -> Result<Vec<PathBuf>> {
    let mut rewritten = store.write(version)?;
    if request.refresh_lockfiles {
        let git = gate.git();
        for cargo_lock in find_cargo_locks(&rewritten, git.root()) {
            if refresh_cargo_lock(&cargo_lock, git.timeout()).await? {
                rewritten.push(cargo_lock);
            }
        }
    }
    Ok(rewritten)
}

#[derive(Debug, Clone)]
pub struct ShipOutcome {
    pub matrix: MatrixReport,
    pub staging: Arc<StagingSet>,
    pub publish: PublishReport,
}

impl ShipOutcome {
    /// Fails when a required cell or any target did not succeed.
    pub fn into_result(self) -> Result<Self> {
        let failed_cells = self.matrix.failed_required();
        if !failed_cells.is_empty() {
            return Err(ReleaseError::RequiredCellsFailed {
                cells: failed_cells,
            });
        }
        let failed_targets = self.publish.failed_targets();
        if !failed_targets.is_empty() {
            return Err(ReleaseError::PublishFailed {
                targets: failed_targets,
            });
        }
        Ok(self)
    }
}

/// Builds every cell and freezes the successful outputs into `staging_dir`.
pub async fn build(
    runner: &MatrixRunner,
    cells: &[BuildCell],
    version: &Version,
    package: &str,
    staging_dir: &Path,
) -> Result<(MatrixReport, StagingSet)> {
    let report = runner.run(version, cells).await?;
    let staging = aggregator::collect(&report.results, version, package, staging_dir)?;
    Ok((report, staging))
}

/// Build, aggregate and publish one tagged version.
///
/// Artifacts of successful cells are published even when a required cell
/// failed; the failure is still reported through [`ShipOutcome::into_result`].
pub async fn ship(
    runner: &MatrixRunner,
    cells: &[BuildCell],
    version: &Version,
    package: &str,
    staging_dir: &Path,
    targets: &[Arc<dyn RegistryTarget>],
) -> Result<ShipOutcome> {
    let (matrix, staging) = build(runner, cells, version, package, staging_dir).await?;
    let staging = Arc::new(staging);
    let publish = publish(Arc::clone(&staging), *version, targets).await;
    Ok(ShipOutcome {
        matrix,
        staging,
        publish,
    })
}
