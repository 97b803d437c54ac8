use {
    super::{resolve_trigger, ConfigArgs},
    crate::{
        error::ReleaseError,
        release::{aggregator, publisher::publish, registry::targets_from_config},
    },
    anyhow::{bail, Context, Result},
    clap::Args,
    log::info,
    std::{path::PathBuf, sync::Arc},
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Release tag being published, e.g. v0.1.6. Defaults to the CI ref.
    #[arg(long)]
    pub tag: Option<String>,

    /// Staging directory written by `build`.
    #[arg(long)]
    pub staging: Option<PathBuf>,
}

pub async fn run(args: CommandArgs) -> Result<()> {
    let ctx = args.config.load()?;
    let trigger = resolve_trigger(args.tag.as_deref())?;
    let staging_dir = args
        .staging
        .unwrap_or_else(|| ctx.staging_dir(&trigger.version));

    let staging = aggregator::load(&staging_dir)
        .with_context(|| format!("failed to read {}", staging_dir.display()))?;
    if staging.is_empty() {
        bail!("nothing staged in {}", staging_dir.display());
    }
    info!(
        "publishing {} artifacts of {} from {}",
        staging.len(),
        trigger.tag,
        staging_dir.display()
    );

    let targets = targets_from_config(&ctx.config);
    let report = publish(Arc::new(staging), trigger.version, &targets).await;

    let failed = report.failed_targets();
    if !failed.is_empty() {
        return Err(ReleaseError::PublishFailed { targets: failed }.into());
    }
    Ok(())
}
