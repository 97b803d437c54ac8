use {
    super::{build, resolve_trigger, CellArgs, ConfigArgs},
    crate::release::{pipeline, registry::targets_from_config},
    anyhow::{Context, Result},
    clap::Args,
    log::info,
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Release tag to ship, e.g. v0.1.6. Defaults to the CI ref.
    #[arg(long)]
    pub tag: Option<String>,

    #[command(flatten)]
    pub cells: CellArgs,
}

pub async fn run(args: CommandArgs) -> Result<()> {
    let ctx = args.config.load()?;
    let trigger = resolve_trigger(args.tag.as_deref())?;
    info!("shipping {}", trigger.tag);

    let cells = ctx.cells(&args.cells.selection())?;
    let runner = build::matrix_runner(&ctx, &trigger.version)?;
    let targets = targets_from_config(&ctx.config);
    let outcome = pipeline::ship(
        &runner,
        &cells,
        &trigger.version,
        &ctx.config.package.name,
        &ctx.staging_dir(&trigger.version),
        &targets,
    )
    .await
    .with_context(|| format!("failed to ship {}", trigger.tag))?;

    let outcome = outcome.into_result()?;
    info!(
        "{} shipped: {} artifacts to {} targets",
        trigger.tag,
        outcome.staging.len(),
        outcome.publish.targets.len()
    );
    Ok(())
}
