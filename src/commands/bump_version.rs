use {
    super::ConfigArgs,
    crate::{
        error::{ReleaseError, Result},
        release::{
            pipeline::{bump, plan_bump, BumpRequest},
            repo_gate::RepoGate,
            tagger::Tagger,
            version_store::VersionStore,
        },
        types::Version,
    },
    anyhow::Context,
    clap::{Args, ValueEnum},
    log::info,
    serde::Deserialize,
};

#[derive(Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Defaults to `version.policy` from the configuration.
    #[arg(value_enum)]
    pub level: Option<BumpLevel>,

    /// Patch ceiling for `carry`; overrides `version.ceiling`.
    #[arg(long)]
    pub ceiling: Option<u64>,

    /// Print the next version without touching any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Commit and tag locally without pushing.
    #[arg(long)]
    pub no_push: bool,
}

#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    #[value(help = "Bump major: x.y.z -> x+1.0.0")]
    Major,
    #[value(help = "Bump minor: x.y.z -> x.y+1.0")]
    Minor,
    #[value(help = "Bump patch: x.y.z -> x.y.z+1")]
    Patch,
    #[value(help = "Bump patch, rolling over to x.y+1.0 once patch would exceed the ceiling")]
    Carry,
}

impl BumpLevel {
    pub fn to_policy(self, ceiling: u64) -> BumpPolicy {
        match self {
            BumpLevel::Major => BumpPolicy::Major,
            BumpLevel::Minor => BumpPolicy::Minor,
            BumpLevel::Patch => BumpPolicy::Patch,
            BumpLevel::Carry => BumpPolicy::Carry { ceiling },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BumpPolicy {
    Major,
    Minor,
    Patch,
    /// Odometer-style patch increment.
    Carry { ceiling: u64 },
}

pub async fn run(args: CommandArgs) -> anyhow::Result<()> {
    let ctx = args.config.load()?;
    let mut version = ctx.config.version.clone();
    if let Some(level) = args.level {
        version.policy = level;
    }
    if let Some(ceiling) = args.ceiling {
        version.ceiling = ceiling;
    }
    let policy = version.bump_policy();

    let store = VersionStore::new(ctx.config.manifest_locations(&ctx.root)?);

    if args.dry_run {
        let (current, next) = plan_bump(&store, &policy).context("failed to compute next version")?;
        info!("{current} -> {next} (dry run, nothing written)");
        println!("{next}");
        return Ok(());
    }

    let git = ctx.git();
    let gate = RepoGate::new(git.clone());
    let remote = (!args.no_push).then(|| ctx.config.repo.remote.clone());
    let tagger = Tagger::new(git, remote, ctx.config.repo.push_branch);
    let request = BumpRequest {
        policy,
        auto_commit: ctx.config.repo.auto_commit,
        commit_message: ctx.config.repo.commit_message.clone(),
        refresh_lockfiles: ctx.config.repo.refresh_lockfiles,
    };

    let outcome = bump(&store, &gate, &tagger, &request)
        .await
        .context("failed to bump version")?;
    for path in &outcome.rewritten {
        info!("  updated {}", path.display());
    }
    info!(
        "released {} -> {} as {} at {}",
        outcome.previous, outcome.version, outcome.tag, outcome.commit
    );
    println!("{}", outcome.version);
    Ok(())
}

pub fn bump_version(policy: &BumpPolicy, current: &Version) -> Result<Version> {
    let overflow = |component| ReleaseError::VersionOverflow {
        version: current.to_string(),
        component,
    };
    let mut new_version = *current;
    match policy {
        BumpPolicy::Major => {
            new_version.major = current.major.checked_add(1).ok_or_else(|| overflow("major"))?;
            new_version.minor = 0;
            new_version.patch = 0;
        }
        BumpPolicy::Minor => {
            new_version.minor = current.minor.checked_add(1).ok_or_else(|| overflow("minor"))?;
            new_version.patch = 0;
        }
        BumpPolicy::Patch => {
            new_version.patch = current.patch.checked_add(1).ok_or_else(|| overflow("patch"))?;
        }
        BumpPolicy::Carry { ceiling } => {
            // patch + 1 > ceiling
            if current.patch >= *ceiling {
                new_version = bump_version(&BumpPolicy::Minor, current)?;
            } else {
                new_version.patch = current.patch + 1;
            }
        }
    }

    Ok(new_version)
}
