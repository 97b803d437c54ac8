use {
    crate::error::ReleaseError,
    serde::Serialize,
    std::{
        collections::BTreeMap,
        fmt,
        path::{Path, PathBuf},
    },
};

/// One (platform, runtime-version) combination of the build matrix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BuildCell {
    pub platform: String,
    pub runtime: String,
}

impl BuildCell {
    pub fn new(platform: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            runtime: runtime.into(),
        }
    }

    /// `<platform>/<runtime>`
    pub fn id(&self) -> String {
        format!("{}/{}", self.platform, self.runtime)
    }

    /// Filesystem-safe form of [`BuildCell::id`].
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.platform, self.runtime)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Full cross-product of platforms and runtimes, platform-major.
    pub fn matrix(platforms: &[String], runtimes: &[String]) -> Vec<BuildCell> {
        platforms
            .iter()
            .flat_map(|platform| {
                runtimes
                    .iter()
                    .map(move |runtime| BuildCell::new(platform.clone(), runtime.clone()))
            })
            .collect()
    }
}

impl fmt::Display for BuildCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.runtime)
    }
}

/// Which cells of the configured matrix one invocation builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellSelection {
    /// Platforms that name the running operating system.
    Host,
    All,
    Platforms(Vec<String>),
    /// `<platform>/<runtime>` ids.
    Cells(Vec<String>),
}

impl CellSelection {
    pub fn select(&self, matrix: &[BuildCell]) -> Result<Vec<BuildCell>, ReleaseError> {
        self.select_for(matrix, std::env::consts::OS)
    }

    fn select_for(&self, matrix: &[BuildCell], os: &str) -> Result<Vec<BuildCell>, ReleaseError> {
        let selected: Vec<BuildCell> = match self {
            CellSelection::All => matrix.to_vec(),
            CellSelection::Host => matrix
                .iter()
                .filter(|cell| platform_matches_os(&cell.platform, os))
                .cloned()
                .collect(),
            CellSelection::Platforms(platforms) => {
                if let Some(unknown) = platforms
                    .iter()
                    .find(|p| !matrix.iter().any(|cell| cell.platform == **p))
                {
                    return Err(ReleaseError::Config(format!(
                        "platform `{unknown}` is not in the build matrix"
                    )));
                }
                matrix
                    .iter()
                    .filter(|cell| platforms.contains(&cell.platform))
                    .cloned()
                    .collect()
            }
            CellSelection::Cells(ids) => {
                if let Some(unknown) = ids
                    .iter()
                    .find(|id| !matrix.iter().any(|cell| cell.id() == **id))
                {
                    return Err(ReleaseError::Config(format!(
                        "cell `{unknown}` is not in the build matrix"
                    )));
                }
                matrix
                    .iter()
                    .filter(|cell| ids.contains(&cell.id()))
                    .cloned()
                    .collect()
            }
        };
        if selected.is_empty() {
            return Err(ReleaseError::Config(format!(
                "no matrix platform matches this host ({os}); select cells explicitly"
            )));
        }
        Ok(selected)
    }
}

/// Whether a matrix platform label such as `ubuntu-latest` or `win_amd64`
/// names the operating system `os` (as in [`std::env::consts::OS`]).
pub fn platform_matches_os(platform: &str, os: &str) -> bool {
    let platform = platform.to_ascii_lowercase();
    platform
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| match os {
            "linux" => token.contains("linux") || token.starts_with("ubuntu"),
            "macos" => ["macos", "darwin", "osx"].iter().any(|p| token.starts_with(p)),
            "windows" => {
                token == "win" || ["windows", "win32", "win64"].iter().any(|p| token.starts_with(p))
            }
            other => token == other,
        })
}

/// An output file produced by exactly one build cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub file_name: String,
    pub path: PathBuf,
    pub cell: BuildCell,
}

impl Artifact {
    pub fn name(&self) -> Option<ArtifactName> {
        ArtifactName::parse(&self.file_name)
    }
}

/// Parsed `<name>-<version>-<tag>.<ext>` file name.
///
/// The tag is empty for source distributions such as `hfd-1.2.4.tar.gz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub name: String,
    pub version: String,
    pub tag: String,
    pub extension: String,
}

const COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "tar.bz2", "tar.xz", "tar.zst"];

impl ArtifactName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = COMPOUND_EXTENSIONS
            .iter()
            .find_map(|ext| {
                file_name
                    .strip_suffix(ext)
                    .and_then(|s| s.strip_suffix('.'))
                    .map(|stem| (stem, *ext))
            })
            .or_else(|| file_name.rsplit_once('.'))?;

        let mut parts = stem.splitn(3, '-');
        let name = parts.next().filter(|s| !s.is_empty())?;
        let version = parts.next().filter(|s| !s.is_empty())?;
        let tag = parts.next().unwrap_or_default();
        if extension.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            tag: tag.to_string(),
            extension: extension.to_string(),
        })
    }

    /// Package names compare equal across `-`/`_` spellings and case.
    pub fn is_package(&self, package: &str) -> bool {
        normalize_package_name(&self.name) == normalize_package_name(package)
    }
}

fn normalize_package_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['-', '.'], "_")
}

/// Why a build cell did not produce artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildFailure {
    Spawn(String),
    ExitStatus { code: Option<i32>, stderr: String },
    TimedOut { secs: u64 },
    Panicked(String),
    Collect(String),
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildFailure::Spawn(e) => write!(f, "failed to start build: {e}"),
            BuildFailure::ExitStatus { code, stderr } => match code {
                Some(code) => write!(f, "build exited with status {code}: {stderr}"),
                None => write!(f, "build terminated by signal: {stderr}"),
            },
            BuildFailure::TimedOut { secs } => write!(f, "build timed out after {secs}s"),
            BuildFailure::Panicked(e) => write!(f, "build task panicked: {e}"),
            BuildFailure::Collect(e) => write!(f, "failed to collect artifacts: {e}"),
        }
    }
}

/// Terminal state of one build cell.
#[derive(Debug, Clone)]
pub struct CellResult {
    pub cell: BuildCell,
    pub required: bool,
    pub outcome: std::result::Result<Vec<Artifact>, BuildFailure>,
}

impl CellResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The frozen set of artifacts for one release, keyed by file name.
///
/// All artifact paths point into [`StagingSet::dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSet {
    dir: PathBuf,
    artifacts: BTreeMap<String, Artifact>,
}

impl StagingSet {
    pub(crate) fn new(dir: PathBuf, artifacts: BTreeMap<String, Artifact>) -> Self {
        Self { dir, artifacts }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn get(&self, file_name: &str) -> Option<&Artifact> {
        self.artifacts.get(file_name)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn default_matrix() -> Vec<BuildCell> {
        BuildCell::matrix(
            &["ubuntu-latest", "macos-latest", "windows-latest"].map(String::from),
            &["3.10", "3.11"].map(String::from),
        )
    }

    #[test]
    fn test_platform_matches_os() {
        assert!(platform_matches_os("ubuntu-latest", "linux"));
        assert!(platform_matches_os("manylinux_x86_64", "linux"));
        assert!(platform_matches_os("macos-14", "macos"));
        assert!(platform_matches_os("Darwin", "macos"));
        assert!(platform_matches_os("windows-latest", "windows"));
        assert!(platform_matches_os("win_amd64", "windows"));
        assert!(!platform_matches_os("darwin", "windows"));
        assert!(!platform_matches_os("ubuntu-latest", "macos"));
    }

    #[test]
    fn test_host_selection_builds_one_platform() {
        for (os, platform) in [
            ("linux", "ubuntu-latest"),
            ("macos", "macos-latest"),
            ("windows", "windows-latest"),
        ] {
            let cells = CellSelection::Host.select_for(&default_matrix(), os).unwrap();
            assert_eq!(
                cells,
                vec![BuildCell::new(platform, "3.10"), BuildCell::new(platform, "3.11")]
            );
        }
        assert!(matches!(
            CellSelection::Host.select_for(&default_matrix(), "freebsd"),
            Err(ReleaseError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_selection() {
        let matrix = default_matrix();
        assert_eq!(CellSelection::All.select(&matrix).unwrap().len(), 6);
        assert_eq!(
            CellSelection::Platforms(vec!["macos-latest".to_string()])
                .select(&matrix)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            CellSelection::Cells(vec!["windows-latest/3.11".to_string()])
                .select(&matrix)
                .unwrap(),
            vec![BuildCell::new("windows-latest", "3.11")]
        );
        assert!(CellSelection::Platforms(vec!["solaris".to_string()])
            .select(&matrix)
            .is_err());
        assert!(CellSelection::Cells(vec!["ubuntu-latest/2.7".to_string()])
            .select(&matrix)
            .is_err());
    }

    #[test]
    fn test_matrix_is_full_cross_product() {
        let platforms = vec!["linux".to_string(), "macos".to_string()];
        let runtimes = vec!["3.8".to_string(), "3.9".to_string(), "3.10".to_string()];
        let cells = BuildCell::matrix(&platforms, &runtimes);
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], BuildCell::new("linux", "3.8"));
        assert_eq!(cells[5], BuildCell::new("macos", "3.10"));
    }

    #[test]
    fn test_cell_dir_name_is_path_safe() {
        let cell = BuildCell::new("ubuntu-latest", "py3.10/abi3");
        assert_eq!(cell.id(), "ubuntu-latest/py3.10/abi3");
        assert_eq!(cell.dir_name(), "ubuntu-latest-py3.10_abi3");
    }

    #[test]
    fn test_parse_wheel_name() {
        let name = ArtifactName::parse("hfd-1.2.4-cp38-cp38-manylinux_2_17_x86_64.whl").unwrap();
        assert_eq!(name.name, "hfd");
        assert_eq!(name.version, "1.2.4");
        assert_eq!(name.tag, "cp38-cp38-manylinux_2_17_x86_64");
        assert_eq!(name.extension, "whl");
    }

    #[test]
    fn test_parse_sdist_name() {
        let name = ArtifactName::parse("hfd-1.2.4.tar.gz").unwrap();
        assert_eq!(name.version, "1.2.4");
        assert_eq!(name.tag, "");
        assert_eq!(name.extension, "tar.gz");
    }

    #[test]
    fn test_parse_rejects_unconventional_names() {
        assert_eq!(ArtifactName::parse("README"), None);
        assert_eq!(ArtifactName::parse("hfd.whl"), None);
        assert_eq!(ArtifactName::parse("hfd-latest-linux.whl"), None);
    }

    #[test]
    fn test_package_name_normalization() {
        let name = ArtifactName::parse("hfd_py-0.1.0-linux.whl").unwrap();
        assert!(name.is_package("hfd-py"));
        assert!(!name.is_package("hfd"));
    }
}
