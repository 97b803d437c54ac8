use {
    super::ConfigArgs,
    crate::release::version_store::VersionStore,
    anyhow::{Context, Result},
    clap::Args,
    log::info,
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Fail unless every manifest declares the same version.
    #[arg(long)]
    pub check: bool,
}

pub async fn run(args: CommandArgs) -> Result<()> {
    let ctx = args.config.load()?;
    let store = VersionStore::new(ctx.config.manifest_locations(&ctx.root)?);

    let version = if args.check {
        let version = store
            .check_in_sync()
            .context("manifest versions disagree")?;
        for (path, _) in store.read_all()? {
            info!("  {} = {version}", path.display());
        }
        version
    } else {
        store.read().context("failed to read the current version")?
    };

    println!("{version}");
    Ok(())
}
