use {
    anyhow::Result,
    clap::{Args, Parser, Subcommand},
    hfd_release::commands,
    log::error,
};

#[derive(Parser)]
#[command(name = "hfd-release", about = "Release automation for hfd", version)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the current version")]
    Version(commands::show_version::CommandArgs),
    #[command(about = "Bump version, commit and move the release tag")]
    Bump(commands::bump_version::CommandArgs),
    #[command(about = "Point a release tag at a commit")]
    Retag(commands::retag::CommandArgs),
    #[command(about = "Build the artifact matrix and stage the outputs")]
    Build(commands::build::CommandArgs),
    #[command(about = "Merge the staging directories of separate build jobs")]
    Aggregate(commands::aggregate::CommandArgs),
    #[command(about = "Publish a staging directory to every registry")]
    Publish(commands::publish::CommandArgs),
    #[command(about = "Build, stage and publish a tagged release")]
    Ship(commands::ship::CommandArgs),
}

#[derive(Args, Debug)]
pub struct GlobalOptions {
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        error!("Error: {err}");
        for (i, cause) in err.chain().skip(1).enumerate() {
            error!("  {}: {}", i.saturating_add(1), cause);
        }
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let cli = Cli::parse();

    if cli.global.verbose {
        std::env::set_var("RUST_LOG", "debug");
    } else {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    match cli.command {
        Commands::Version(args) => commands::show_version::run(args).await?,
        Commands::Bump(args) => commands::bump_version::run(args).await?,
        Commands::Retag(args) => commands::retag::run(args).await?,
        Commands::Build(args) => commands::build::run(args).await?,
        Commands::Aggregate(args) => commands::aggregate::run(args).await?,
        Commands::Publish(args) => commands::publish::run(args).await?,
        Commands::Ship(args) => commands::ship::run(args).await?,
    }

    Ok(())
}
