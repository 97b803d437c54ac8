//! Fan-out of the artifact build over the platform × runtime matrix.
//!
//! Every cell runs in its own task with its own temporary build directory.
//! Cells never cancel each other: a failed cell is recorded and its siblings
//! keep running.

use {
    crate::{
        types::{Artifact, BuildCell, BuildFailure, CellResult, Version},
        utils::{
            copy_into, list_files,
            process::{run_with_timeout, tail, RunError},
            render_args, reset_dir,
        },
    },
    async_trait::async_trait,
    log::{debug, error, info, warn},
    std::{
        fs,
        path::{Path, PathBuf},
        sync::Arc,
        time::Duration,
    },
};

/// Directories handed to a toolchain for one cell.
#[derive(Debug, Clone)]
pub struct CellEnv {
    pub work_dir: PathBuf,
    /// Files left here when the build returns are the cell's artifacts.
    pub out_dir: PathBuf,
}

#[async_trait]
pub trait BuildToolchain: Send + Sync {
    async fn build(
        &self,
        cell: &BuildCell,
        version: &Version,
        env: &CellEnv,
    ) -> Result<(), BuildFailure>;
}

/// Runs the configured external build command.
pub struct CommandToolchain {
    command: Vec<String>,
    source_dir: PathBuf,
    timeout: Duration,
}

impl CommandToolchain {
    pub fn new(command: Vec<String>, source_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command,
            source_dir: source_dir.into(),
            timeout,
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

#[async_trait]
impl BuildToolchain for CommandToolchain {
    async fn build(
        &self,
        cell: &BuildCell,
        version: &Version,
        env: &CellEnv,
    ) -> Result<(), BuildFailure> {
        let rendered = render_args(
            &self.command,
            &[
                ("platform", cell.platform.clone()),
                ("runtime", cell.runtime.clone()),
                ("version", version.to_string()),
                ("out_dir", env.out_dir.display().to_string()),
                ("work_dir", env.work_dir.display().to_string()),
            ],
            &[],
        );
        let Some((program, args)) = rendered.split_first() else {
            return Err(BuildFailure::Spawn("empty build command".to_string()));
        };
        let envs = [
            ("HFD_BUILD_PLATFORM".to_string(), cell.platform.clone()),
            ("HFD_BUILD_RUNTIME".to_string(), cell.runtime.clone()),
            ("CARGO_TARGET_DIR".to_string(), env.work_dir.join("target").display().to_string()),
        ];

        let output = run_with_timeout(program, args, &self.source_dir, &envs, self.timeout)
            .await
            .map_err(|e| match e {
                RunError::Spawn(e) => BuildFailure::Spawn(e.to_string()),
                RunError::TimedOut(d) => BuildFailure::TimedOut { secs: d.as_secs() },
            })?;
        if !output.status.success() {
            return Err(BuildFailure::ExitStatus {
                code: output.status.code(),
                stderr: tail(&output.stderr, 20),
            });
        }
        Ok(())
    }
}

/// Terminal results of every cell, in matrix order.
#[derive(Debug, Clone)]
pub struct MatrixReport {
    pub results: Vec<CellResult>,
}

impl MatrixReport {
    pub fn failed_required(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.required && !r.succeeded())
            .map(|r| r.cell.id())
            .collect()
    }

    /// True when every required cell succeeded.
    pub fn is_success(&self) -> bool {
        self.failed_required().is_empty()
    }
}

pub struct MatrixRunner {
    toolchain: Arc<dyn BuildToolchain>,
    output_dir: PathBuf,
    timeout: Duration,
    allow_failure: Vec<String>,
}

impl MatrixRunner {
    pub fn new(toolchain: Arc<dyn BuildToolchain>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            output_dir: output_dir.into(),
            timeout: Duration::from_secs(3600),
            allow_failure: vec![],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Platforms or cell ids whose failure does not fail the matrix.
    pub fn allow_failure(mut self, entries: Vec<String>) -> Self {
        self.allow_failure = entries;
        self
    }

    pub fn cells_dir(&self) -> PathBuf {
        self.output_dir.join("cells")
    }

    fn is_required(&self, cell: &BuildCell) -> bool {
        let id = cell.id();
        !self
            .allow_failure
            .iter()
            .any(|entry| *entry == cell.platform || *entry == id)
    }

    /// Builds every cell and waits for all of them to reach a terminal state.
    ///
    /// Output from a previous run of the matrix is discarded first.
    pub async fn run(
        &self,
        version: &Version,
        cells: &[BuildCell],
    ) -> std::io::Result<MatrixReport> {
        let cells_dir = self.cells_dir();
        reset_dir(&cells_dir)?;
        info!("building {version} across {} cell(s)", cells.len());

        let mut handles = Vec::with_capacity(cells.len());
        for cell in cells {
            let toolchain = Arc::clone(&self.toolchain);
            let task_cell = cell.clone();
            let dest = cells_dir.join(cell.dir_name());
            let timeout = self.timeout;
            let version = *version;
            let handle = tokio::spawn(async move {
                run_cell(toolchain, task_cell, version, dest, timeout).await
            });
            handles.push((cell.clone(), handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (cell, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(BuildFailure::Panicked(e.to_string())),
            };
            let required = self.is_required(&cell);
            match &outcome {
                Ok(artifacts) => info!("{cell}: {} artifact(s)", artifacts.len()),
                Err(failure) if required => error!("{cell}: {failure}"),
                Err(failure) => warn!("{cell} (allowed to fail): {failure}"),
            }
            results.push(CellResult {
                cell,
                required,
                outcome,
            });
        }
        Ok(MatrixReport { results })
    }
}

async fn run_cell(
    toolchain: Arc<dyn BuildToolchain>,
    cell: BuildCell,
    version: Version,
    dest: PathBuf,
    timeout: Duration,
) -> Result<Vec<Artifact>, BuildFailure> {
    // dropped on every exit path, which removes the build environment
    let work = tempfile::Builder::new()
        .prefix("hfd-cell-")
        .tempdir()
        .map_err(|e| BuildFailure::Spawn(format!("cannot create build directory: {e}")))?;
    let _release = scopeguard::guard(cell.id(), |id| {
        debug!("released build environment for {id}");
    });

    let env = CellEnv {
        work_dir: work.path().to_path_buf(),
        out_dir: work.path().join("out"),
    };
    fs::create_dir_all(&env.out_dir).map_err(|e| BuildFailure::Spawn(e.to_string()))?;

    debug!("{cell}: building in {}", env.work_dir.display());
    match tokio::time::timeout(timeout, toolchain.build(&cell, &version, &env)).await {
        Err(_) => return Err(BuildFailure::TimedOut { secs: timeout.as_secs() }),
        Ok(result) => result?,
    }

    collect_outputs(&cell, &env.out_dir, &dest).map_err(|e| BuildFailure::Collect(e.to_string()))
}

/// Moves a cell's outputs out of its build environment before it is released.
fn collect_outputs(
    cell: &BuildCell,
    out_dir: &Path,
    dest: &Path,
) -> std::io::Result<Vec<Artifact>> {
    fs::create_dir_all(dest)?;
    let mut artifacts = vec![];
    for file in list_files(out_dir)? {
        let path = copy_into(&file, dest)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        artifacts.push(Artifact {
            file_name,
            path,
            cell: cell.clone(),
        });
    }
    Ok(artifacts)
}

#[cfg(test)]
pub(crate) mod test_support {
    use {super::*, std::collections::HashSet};

    /// Writes `<name>-<version>-<platform>_<runtime>.whl` unless the cell is
    /// listed as failing.
    pub struct FakeToolchain {
        pub name: String,
        pub failing: HashSet<String>,
        pub slow: HashSet<String>,
    }

    impl FakeToolchain {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                failing: HashSet::new(),
                slow: HashSet::new(),
            }
        }

        pub fn failing(mut self, cell_id: &str) -> Self {
            self.failing.insert(cell_id.to_string());
            self
        }

        pub fn slow(mut self, cell_id: &str) -> Self {
            self.slow.insert(cell_id.to_string());
            self
        }
    }

    #[async_trait]
    impl BuildToolchain for FakeToolchain {
        async fn build(
            &self,
            cell: &BuildCell,
            version: &Version,
            env: &CellEnv,
        ) -> Result<(), BuildFailure> {
            if self.slow.contains(&cell.id()) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.failing.contains(&cell.id()) {
                return Err(BuildFailure::ExitStatus {
                    code: Some(1),
                    stderr: "linker error".to_string(),
                });
            }
            let file = format!(
                "{}-{version}-{}_{}.whl",
                self.name,
                cell.platform,
                cell.runtime.replace('.', "")
            );
            fs::write(env.out_dir.join(file), cell.id())
                .map_err(|e| BuildFailure::Collect(e.to_string()))
        }
    }

    pub fn cells(platforms: &[&str], runtimes: &[&str]) -> Vec<BuildCell> {
        BuildCell::matrix(
            &platforms.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &runtimes.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    }
}
