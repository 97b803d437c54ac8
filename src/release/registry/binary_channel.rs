//! Binary-package channel (conda/anaconda style).
//!
//! The channel takes a package description rather than loose files: a recipe
//! naming the package, its version and the directory holding the staged
//! artifacts, plus license/summary/homepage metadata.

use {
    crate::{
        config::{BinaryChannelConfig, PackageConfig},
        release::publisher::{outcome_from_run, RegistryTarget},
        types::{PublishOutcome, StagingSet, Version},
        utils::{render_args, run_with_timeout},
    },
    async_trait::async_trait,
    log::debug,
    serde::Serialize,
    std::{fs, path::Path, time::Duration},
};

#[derive(Debug, Serialize)]
struct Recipe<'a> {
    package: RecipePackage<'a>,
    source: RecipeSource,
    build: RecipeBuild,
    about: RecipeAbout<'a>,
}

#[derive(Debug, Serialize)]
struct RecipePackage<'a> {
    name: &'a str,
    version: String,
}

#[derive(Debug, Serialize)]
struct RecipeSource {
    path: String,
}

#[derive(Debug, Serialize)]
struct RecipeBuild {
    number: u32,
    script: String,
}

#[derive(Debug, Serialize)]
struct RecipeAbout<'a> {
    license: &'a str,
    summary: &'a str,
    home: &'a str,
}

pub struct BinaryChannelTarget {
    config: BinaryChannelConfig,
    package: PackageConfig,
    token: Option<String>,
}

impl BinaryChannelTarget {
    pub fn from_env(config: BinaryChannelConfig, package: PackageConfig) -> Self {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Self::new(config, package, token)
    }

    pub fn new(config: BinaryChannelConfig, package: PackageConfig, token: Option<String>) -> Self {
        Self {
            config,
            package,
            token,
        }
    }

    /// `meta.yaml` content. JSON is valid YAML, so serde_json renders it.
    fn render_recipe(&self, staging: &StagingSet, version: &Version) -> serde_json::Result<String> {
        let recipe = Recipe {
            package: RecipePackage {
                name: &self.package.name,
                version: version.to_string(),
            },
            source: RecipeSource {
                path: staging.dir().display().to_string(),
            },
            build: RecipeBuild {
                number: 0,
                script: format!(
                    "python -m pip install --no-deps --no-index --find-links . {}=={version}",
                    self.package.name
                ),
            },
            about: RecipeAbout {
                license: &self.package.license,
                summary: &self.package.summary,
                home: &self.package.homepage,
            },
        };
        serde_json::to_string_pretty(&recipe)
    }

    fn write_recipe(
        &self,
        recipe_dir: &Path,
        staging: &StagingSet,
        version: &Version,
    ) -> Result<(), String> {
        let recipe = self
            .render_recipe(staging, version)
            .map_err(|e| format!("cannot render recipe: {e}"))?;
        fs::create_dir_all(recipe_dir).map_err(|e| format!("cannot create recipe dir: {e}"))?;
        fs::write(recipe_dir.join("meta.yaml"), recipe)
            .map_err(|e| format!("cannot write recipe: {e}"))?;
        debug!("wrote recipe to {}", recipe_dir.display());
        Ok(())
    }
}

#[async_trait]
impl RegistryTarget for BinaryChannelTarget {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self, staging: &StagingSet, _version: &Version) -> Result<(), String> {
        if staging.is_empty() {
            return Err("staging set is empty".to_string());
        }
        if self.token.is_none() {
            return Err(format!("missing credential: {} is not set", self.config.token_env));
        }
        if self.config.account.is_empty() {
            return Err("no account/channel configured".to_string());
        }
        let missing: Vec<&str> = [
            ("name", &self.package.name),
            ("license", &self.package.license),
            ("summary", &self.package.summary),
            ("homepage", &self.package.homepage),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(format!("package metadata missing: {}", missing.join(", ")));
        }
        Ok(())
    }

    async fn upload(&self, staging: &StagingSet, version: &Version) -> PublishOutcome {
        let work = match tempfile::Builder::new().prefix("hfd-channel-").tempdir() {
            Ok(work) => work,
            Err(e) => {
                return PublishOutcome::TransientFailure(format!("cannot create work dir: {e}"))
            }
        };
        let recipe_dir = work.path().join("recipe");
        if let Err(reason) = self.write_recipe(&recipe_dir, staging, version) {
            return PublishOutcome::TransientFailure(reason);
        }

        let rendered = render_args(
            &self.config.command,
            &[
                ("recipe_dir", recipe_dir.display().to_string()),
                ("source_dir", staging.dir().display().to_string()),
                ("work_dir", work.path().display().to_string()),
                ("account", self.config.account.clone()),
                ("version", version.to_string()),
            ],
            &[],
        );
        let Some((program, args)) = rendered.split_first() else {
            return PublishOutcome::Rejected("upload command is empty".to_string());
        };

        let mut envs: Vec<(String, String)> = self
            .config
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(token) = &self.token {
            envs.push((self.config.credential_var.clone(), token.clone()));
        }

        outcome_from_run(
            run_with_timeout(
                program,
                args,
                work.path(),
                &envs,
                Duration::from_secs(self.config.timeout_secs),
            )
            .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{Artifact, BuildCell},
        pretty_assertions::assert_eq,
        std::collections::BTreeMap,
    };

    fn package() -> PackageConfig {
        PackageConfig {
            name: "hfd".to_string(),
            license: "MIT".to_string(),
            summary: "Hugging Face model downloader".to_string(),
            homepage: "https://example.org/hfd".to_string(),
        }
    }

    fn staging(dir: &Path) -> StagingSet {
        let path = dir.join("hfd-1.2.4-cp38-linux.whl");
        fs::write(&path, "wheel").unwrap();
        let artifact = Artifact {
            file_name: "hfd-1.2.4-cp38-linux.whl".to_string(),
            path,
            cell: BuildCell::new("linux", "3.8"),
        };
        StagingSet::new(
            dir.to_path_buf(),
            BTreeMap::from([(artifact.file_name.clone(), artifact)]),
        )
    }

    fn target(command: &[&str], account: &str, package: PackageConfig) -> BinaryChannelTarget {
        let config = BinaryChannelConfig {
            account: account.to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            ..BinaryChannelConfig::default()
        };
        BinaryChannelTarget::new(config, package, Some("secret".to_string()))
    }

    #[test]
    fn test_validate_requires_metadata_and_account() {
        let dir = tempfile::tempdir().unwrap();
        let set = staging(dir.path());
        let version = Version::new(1, 2, 4);

        assert_eq!(target(&["true"], "hfd", package()).validate(&set, &version), Ok(()));
        assert_eq!(
            target(&["true"], "", package()).validate(&set, &version),
            Err("no account/channel configured".to_string())
        );

        let incomplete = PackageConfig {
            license: String::new(),
            homepage: " ".to_string(),
            ..package()
        };
        assert_eq!(
            target(&["true"], "hfd", incomplete).validate(&set, &version),
            Err("package metadata missing: license, homepage".to_string())
        );

        let no_token = BinaryChannelTarget::new(
            BinaryChannelConfig {
                account: "hfd".to_string(),
                ..BinaryChannelConfig::default()
            },
            package(),
            None,
        );
        assert_eq!(
            no_token.validate(&set, &version),
            Err("missing credential: ANACONDA_TOKEN is not set".to_string())
        );
    }

    #[test]
    fn test_recipe_describes_package() {
        let dir = tempfile::tempdir().unwrap();
        let set = staging(dir.path());
        let recipe = target(&["true"], "hfd", package())
            .render_recipe(&set, &Version::new(1, 2, 4))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&recipe).unwrap();

        assert_eq!(value["package"]["name"], "hfd");
        assert_eq!(value["package"]["version"], "1.2.4");
        assert_eq!(value["source"]["path"], dir.path().display().to_string());
        assert_eq!(value["about"]["license"], "MIT");
        assert_eq!(value["about"]["home"], "https://example.org/hfd");
    }

    #[tokio::test]
    async fn test_upload_runs_command_with_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let set = staging(dir.path());
        let log = dir.path().join("upload.log");
        let script = format!(
            "test -f {{recipe_dir}}/meta.yaml && echo \"{{account}} $ANACONDA_API_TOKEN\" > {}",
            log.display()
        );
        let target = target(&["sh", "-c", &script], "hfd-channel", package());

        assert_eq!(
            target.upload(&set, &Version::new(1, 2, 4)).await,
            PublishOutcome::Published
        );
        assert_eq!(fs::read_to_string(log).unwrap().trim(), "hfd-channel secret");
    }

    #[tokio::test]
    async fn test_unreachable_channel_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let set = staging(dir.path());
        let target = target(
            &["sh", "-c", "echo 'Connection refused' >&2; exit 1"],
            "hfd",
            package(),
        );

        assert_eq!(
            target.upload(&set, &Version::new(1, 2, 4)).await,
            PublishOutcome::TransientFailure("Connection refused".to_string())
        );
    }
}
