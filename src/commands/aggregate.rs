use {
    super::{resolve_trigger, ConfigArgs},
    crate::release::aggregator,
    anyhow::{Context, Result},
    clap::Args,
    std::path::PathBuf,
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Release tag being aggregated, e.g. v0.1.6. Defaults to the CI ref.
    #[arg(long)]
    pub tag: Option<String>,

    /// Staging directory written by one `build` job (repeatable).
    #[arg(long = "input", value_name = "DIR", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Combined staging directory.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: CommandArgs) -> Result<()> {
    let ctx = args.config.load()?;
    let trigger = resolve_trigger(args.tag.as_deref())?;
    let staging_dir = args
        .output
        .unwrap_or_else(|| ctx.staging_dir(&trigger.version));

    let staging = aggregator::merge(
        &args.inputs,
        &trigger.version,
        &ctx.config.package.name,
        &staging_dir,
    )
    .with_context(|| format!("failed to aggregate {}", trigger.tag))?;

    for file_name in staging.file_names() {
        println!("{file_name}");
    }
    Ok(())
}
