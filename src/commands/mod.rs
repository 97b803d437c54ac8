pub mod aggregate;
pub mod build;
pub mod bump_version;
pub mod publish;
pub mod retag;
pub mod ship;
pub mod show_version;

use {
    crate::{
        config::{ReleaseConfig, DEFAULT_CONFIG_FILE},
        release::trigger::Trigger,
        types::{BuildCell, CellSelection, Version},
        utils::{get_git_root_path, Git},
    },
    anyhow::{Context, Result},
    clap::Args,
    log::debug,
    std::{path::PathBuf, time::Duration},
};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Release configuration, relative to the repository root.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// Cells to build; without flags, the platforms matching the host.
#[derive(Args, Debug, Clone, Default)]
pub struct CellArgs {
    /// Build only this platform (repeatable).
    #[arg(
        long = "platform",
        value_name = "PLATFORM",
        conflicts_with_all = ["cells", "all_platforms"]
    )]
    pub platforms: Vec<String>,

    /// Build only this `<platform>/<runtime>` cell (repeatable).
    #[arg(long = "cell", value_name = "ID", conflicts_with = "all_platforms")]
    pub cells: Vec<String>,

    /// Build every configured platform from this host.
    #[arg(long)]
    pub all_platforms: bool,
}

impl CellArgs {
    pub fn selection(&self) -> CellSelection {
        if self.all_platforms {
            CellSelection::All
        } else if !self.cells.is_empty() {
            CellSelection::Cells(self.cells.clone())
        } else if !self.platforms.is_empty() {
            CellSelection::Platforms(self.platforms.clone())
        } else {
            CellSelection::Host
        }
    }
}

/// Loaded configuration plus the repository it applies to.
pub struct CommandContext {
    pub root: PathBuf,
    pub config: ReleaseConfig,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<CommandContext> {
        let root = match get_git_root_path() {
            Ok(root) => root,
            Err(e) => {
                debug!("not inside a git repository ({e}), using the current directory");
                std::env::current_dir().context("failed to get current directory")?
            }
        };
        let path = root.join(&self.config);
        let config = ReleaseConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok(CommandContext { root, config })
    }
}

impl CommandContext {
    pub fn git(&self) -> Git {
        Git::new(&self.root).with_timeout(Duration::from_secs(self.config.repo.timeout_secs))
    }

    pub fn cells(&self, selection: &CellSelection) -> Result<Vec<BuildCell>> {
        let matrix = BuildCell::matrix(&self.config.matrix.platforms, &self.config.matrix.runtimes);
        let cells = selection.select(&matrix)?;
        debug!("selected {} of {} cell(s)", cells.len(), matrix.len());
        Ok(cells)
    }

    /// Matrix output for one version: `cells/` per build cell, `dist/` staged.
    pub fn version_dir(&self, version: &Version) -> PathBuf {
        self.root
            .join(&self.config.matrix.output_dir)
            .join(version.tag_name())
    }

    pub fn staging_dir(&self, version: &Version) -> PathBuf {
        self.version_dir(version).join("dist")
    }
}

/// Release from `--tag`, or from the CI ref when no tag is given.
pub fn resolve_trigger(tag: Option<&str>) -> Result<Trigger> {
    let trigger = match tag {
        Some(tag) => Trigger::from_ref(tag)?,
        None => Trigger::from_env()?,
    };
    Ok(trigger)
}
