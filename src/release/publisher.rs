//! Dispatch of a frozen staging set to independent registry targets.

use {
    crate::{
        types::{PublishOutcome, PublishReport, StagingSet, TargetReport, Version},
        utils::process::{tail, RunError},
    },
    async_trait::async_trait,
    log::{error, info, warn},
    std::{process::Output, sync::Arc},
};

#[async_trait]
pub trait RegistryTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Acceptance rules checked before any upload; `Err` carries the reason.
    fn validate(&self, staging: &StagingSet, version: &Version) -> Result<(), String>;

    async fn upload(&self, staging: &StagingSet, version: &Version) -> PublishOutcome;
}

/// Validates and uploads to every target concurrently.
///
/// Targets share nothing but the immutable staging set; a failing target
/// never stops the others, and nothing is retried.
pub async fn publish(
    staging: Arc<StagingSet>,
    version: Version,
    targets: &[Arc<dyn RegistryTarget>],
) -> PublishReport {
    let mut handles = Vec::with_capacity(targets.len());
    for target in targets {
        let target = Arc::clone(target);
        let staging = Arc::clone(&staging);
        let name = target.name().to_string();
        let handle =
            tokio::spawn(async move { publish_one(target.as_ref(), &staging, &version).await });
        handles.push((name, handle));
    }

    let mut report = PublishReport::default();
    for (target, handle) in handles {
        let outcome = handle
            .await
            .unwrap_or_else(|e| PublishOutcome::Rejected(format!("publish task failed: {e}")));
        match &outcome {
            PublishOutcome::Published => info!("{target}: published {version}"),
            PublishOutcome::Rejected(_) => error!("{target}: {outcome}"),
            PublishOutcome::TransientFailure(_) => warn!("{target}: {outcome}"),
        }
        report.targets.push(TargetReport { target, outcome });
    }
    report
}

async fn publish_one(
    target: &dyn RegistryTarget,
    staging: &StagingSet,
    version: &Version,
) -> PublishOutcome {
    if let Err(reason) = target.validate(staging, version) {
        return PublishOutcome::Rejected(reason);
    }
    info!(
        "{}: uploading {} artifact(s) for {version}",
        target.name(),
        staging.len()
    );
    target.upload(staging, version).await
}

const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection",
    "temporarily unavailable",
    "502",
    "503",
    "504",
];

/// Maps an upload command's result onto a publish outcome.
pub(crate) fn outcome_from_run(result: Result<Output, RunError>) -> PublishOutcome {
    match result {
        Err(e) => PublishOutcome::TransientFailure(e.to_string()),
        Ok(output) if output.status.success() => PublishOutcome::Published,
        Ok(output) => {
            let stderr = tail(&output.stderr, 10);
            let lowered = stderr.to_ascii_lowercase();
            if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
                PublishOutcome::TransientFailure(stderr)
            } else {
                PublishOutcome::Rejected(stderr)
            }
        }
    }
}
