//! `release.toml` configuration.
//!
//! Every section has defaults matching the hfd repository layout, so a missing
//! file or a partially filled one is valid. Credentials are never stored in
//! the file; targets name the environment variable holding them.

use {
    crate::{
        commands::bump_version::{BumpLevel, BumpPolicy},
        error::{ReleaseError, Result},
    },
    log::{debug, info},
    regex::Regex,
    serde::Deserialize,
    std::{
        collections::{BTreeMap, HashSet},
        fs,
        path::{Path, PathBuf},
    },
};

pub const DEFAULT_CONFIG_FILE: &str = "release.toml";
pub const DEFAULT_VERSION_PATTERN: &str = r#"(?m)^version\s*=\s*"([^"]+)""#;
/// Manifests of the hfd layout: the CLI crate, the Python binding crate and its
/// packaging metadata.
pub const DEFAULT_MANIFESTS: [&str; 3] =
    ["Cargo.toml", "hfd-py/Cargo.toml", "hfd-py/pyproject.toml"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    pub package: PackageConfig,
    pub version: VersionConfig,
    #[serde(rename = "manifest")]
    pub manifests: Vec<ManifestConfig>,
    pub repo: RepoConfig,
    pub matrix: MatrixConfig,
    #[serde(rename = "registry")]
    pub registries: Vec<RegistryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    pub license: String,
    pub summary: String,
    pub homepage: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "hfd".to_string(),
            license: String::new(),
            summary: String::new(),
            homepage: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionConfig {
    pub policy: BumpLevel,
    pub ceiling: u64,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            policy: BumpLevel::Carry,
            ceiling: 10,
        }
    }
}

impl VersionConfig {
    pub fn bump_policy(&self) -> BumpPolicy {
        self.policy.to_policy(self.ceiling)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestConfig {
    pub path: PathBuf,
    #[serde(default = "default_version_pattern")]
    pub pattern: String,
}

fn default_version_pattern() -> String {
    DEFAULT_VERSION_PATTERN.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    pub remote: String,
    /// Commit pending changes with `commit_message` instead of aborting.
    pub auto_commit: bool,
    /// `{version}` and `{tag}` are substituted.
    pub commit_message: String,
    pub push_branch: bool,
    /// Re-pin `Cargo.lock` after rewriting Cargo manifests.
    pub refresh_lockfiles: bool,
    pub timeout_secs: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            auto_commit: true,
            commit_message: "chore: release {tag}".to_string(),
            push_branch: true,
            refresh_lockfiles: true,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixConfig {
    pub platforms: Vec<String>,
    pub runtimes: Vec<String>,
    /// Platforms or `<platform>/<runtime>` cell ids whose failure is tolerated.
    pub allow_failure: Vec<String>,
    /// `{platform}`, `{runtime}`, `{version}`, `{out_dir}` and `{work_dir}` are substituted.
    pub build_command: Vec<String>,
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            platforms: ["ubuntu-latest", "macos-latest", "windows-latest"]
                .map(String::from)
                .to_vec(),
            runtimes: ["3.8", "3.9", "3.10", "3.11"].map(String::from).to_vec(),
            allow_failure: vec![],
            build_command: [
                "maturin",
                "build",
                "--release",
                "--manifest-path",
                "hfd-py/Cargo.toml",
                "--interpreter",
                "python{runtime}",
                "--out",
                "{out_dir}",
            ]
            .map(String::from)
            .to_vec(),
            timeout_secs: 3600,
            output_dir: PathBuf::from("target/release-artifacts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RegistryConfig {
    SourceIndex(SourceIndexConfig),
    BinaryChannel(BinaryChannelConfig),
}

impl RegistryConfig {
    pub fn name(&self) -> &str {
        match self {
            RegistryConfig::SourceIndex(c) => &c.name,
            RegistryConfig::BinaryChannel(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceIndexConfig {
    pub name: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Environment variable the upload command reads the token from.
    pub credential_var: String,
    /// `{files}` expands to every staged artifact path.
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub extensions: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SourceIndexConfig {
    fn default() -> Self {
        Self {
            name: "pypi".to_string(),
            token_env: "PYPI_API_TOKEN".to_string(),
            credential_var: "TWINE_PASSWORD".to_string(),
            command: ["twine", "upload", "--non-interactive", "--skip-existing", "{files}"]
                .map(String::from)
                .to_vec(),
            env: BTreeMap::from([("TWINE_USERNAME".to_string(), "__token__".to_string())]),
            extensions: vec!["whl".to_string(), "tar.gz".to_string()],
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinaryChannelConfig {
    pub name: String,
    pub token_env: String,
    pub credential_var: String,
    /// Account or channel the package is uploaded to.
    pub account: String,
    /// `{recipe_dir}`, `{source_dir}`, `{work_dir}` and `{account}` are substituted.
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for BinaryChannelConfig {
    fn default() -> Self {
        Self {
            name: "anaconda".to_string(),
            token_env: "ANACONDA_TOKEN".to_string(),
            credential_var: "ANACONDA_API_TOKEN".to_string(),
            account: String::new(),
            command: [
                "sh",
                "-c",
                "conda build {recipe_dir} --output-folder {work_dir}/out && anaconda upload \
                 --user {account} --force {work_dir}/out/*/*.tar.bz2",
            ]
            .map(String::from)
            .to_vec(),
            env: BTreeMap::new(),
            timeout_secs: 1800,
        }
    }
}

/// A manifest location with its compiled pattern.
#[derive(Debug, Clone)]
pub struct ManifestLocation {
    pub path: PathBuf,
    pub pattern: Regex,
}

impl ManifestLocation {
    pub fn new(path: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let path = path.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            ReleaseError::Config(format!("invalid pattern for {}: {e}", path.display()))
        })?;
        if pattern.captures_len() < 2 {
            return Err(ReleaseError::Config(format!(
                "pattern for {} needs a capture group around the version",
                path.display()
            )));
        }
        Ok(Self { path, pattern })
    }
}

impl ReleaseConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            debug!("loading {}", path.display());
            let content = fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            info!("{} not found, using default configuration", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml_edit::de::from_str(content).map_err(|e| ReleaseError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.matrix.platforms.is_empty() || self.matrix.runtimes.is_empty() {
            return Err(ReleaseError::Config(
                "matrix needs at least one platform and one runtime".to_string(),
            ));
        }
        if self.matrix.build_command.is_empty() {
            return Err(ReleaseError::Config(
                "matrix.build_command is empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for registry in &self.registries {
            if !seen.insert(registry.name()) {
                return Err(ReleaseError::Config(format!(
                    "duplicate registry name `{}`",
                    registry.name()
                )));
            }
        }
        self.manifest_locations(Path::new("")).map(|_| ())
    }

    /// Manifest locations resolved against `root`.
    pub fn manifest_locations(&self, root: &Path) -> Result<Vec<ManifestLocation>> {
        if self.manifests.is_empty() {
            return DEFAULT_MANIFESTS
                .iter()
                .map(|path| ManifestLocation::new(root.join(path), DEFAULT_VERSION_PATTERN))
                .collect();
        }
        self.manifests
            .iter()
            .map(|m| ManifestLocation::new(root.join(&m.path), &m.pattern))
            .collect()
    }

    pub fn registries(&self) -> Vec<RegistryConfig> {
        if self.registries.is_empty() {
            vec![
                RegistryConfig::SourceIndex(SourceIndexConfig::default()),
                RegistryConfig::BinaryChannel(BinaryChannelConfig::default()),
            ]
        } else {
            self.registries.clone()
        }
    }
}
