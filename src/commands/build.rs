use {
    super::{resolve_trigger, CellArgs, CommandContext, ConfigArgs},
    crate::{
        error::ReleaseError,
        release::{
            matrix::{CommandToolchain, MatrixRunner},
            pipeline,
        },
        types::Version,
        utils::check_command_available,
    },
    anyhow::{Context, Result},
    clap::Args,
    std::{path::PathBuf, sync::Arc, time::Duration},
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Release tag to build, e.g. v0.1.6. Defaults to the CI ref.
    #[arg(long)]
    pub tag: Option<String>,

    #[command(flatten)]
    pub cells: CellArgs,

    /// Staging directory for the collected artifacts.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: CommandArgs) -> Result<()> {
    let ctx = args.config.load()?;
    let trigger = resolve_trigger(args.tag.as_deref())?;
    let staging_dir = args
        .output
        .unwrap_or_else(|| ctx.staging_dir(&trigger.version));

    let cells = ctx.cells(&args.cells.selection())?;
    let runner = matrix_runner(&ctx, &trigger.version)?;
    let (report, staging) = pipeline::build(
        &runner,
        &cells,
        &trigger.version,
        &ctx.config.package.name,
        &staging_dir,
    )
    .await
    .with_context(|| format!("failed to build {}", trigger.tag))?;

    for file_name in staging.file_names() {
        println!("{file_name}");
    }

    let failed = report.failed_required();
    if !failed.is_empty() {
        return Err(ReleaseError::RequiredCellsFailed { cells: failed }.into());
    }
    Ok(())
}

/// Runner for the configured build command, writing under the version's output directory.
pub(crate) fn matrix_runner(ctx: &CommandContext, version: &Version) -> Result<MatrixRunner> {
    let matrix = &ctx.config.matrix;
    let timeout = Duration::from_secs(matrix.timeout_secs);
    let toolchain = CommandToolchain::new(matrix.build_command.clone(), &ctx.root, timeout);
    let program = toolchain
        .program()
        .context("matrix.build_command is empty")?
        .to_string();
    check_command_available(&program, &ctx.root)?;

    Ok(MatrixRunner::new(Arc::new(toolchain), ctx.version_dir(version))
        .with_timeout(timeout)
        .allow_failure(matrix.allow_failure.clone()))
}
