use {
    super::ConfigArgs,
    crate::{release::tagger::Tagger, types::Version},
    anyhow::{Context, Result},
    clap::Args,
    log::info,
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Version to tag, e.g. 0.1.6
    pub version: Version,

    /// Commit to point the tag at.
    #[arg(long, default_value = "HEAD")]
    pub commit: String,

    /// Move the tag locally without touching the remote.
    #[arg(long)]
    pub no_push: bool,
}

pub async fn run(args: CommandArgs) -> Result<()> {
    let ctx = args.config.load()?;
    let git = ctx.git();
    let commit = git
        .run(&["rev-parse", "--verify", &format!("{}^{{commit}}", args.commit)])
        .await
        .with_context(|| format!("unknown commit {}", args.commit))?;

    let remote = (!args.no_push).then(|| ctx.config.repo.remote.clone());
    let tagger = Tagger::new(git, remote, false);
    let tag = args.version.tag_name();
    tagger
        .retag(&tag, &commit)
        .await
        .with_context(|| format!("failed to move {tag}"))?;

    info!("{tag} -> {commit}");
    Ok(())
}
