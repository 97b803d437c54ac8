//! Source-package index (PyPI and compatible) reached through an upload command.

use {
    crate::{
        config::SourceIndexConfig,
        release::publisher::{outcome_from_run, RegistryTarget},
        types::{PublishOutcome, StagingSet, Version},
        utils::{render_args, run_with_timeout},
    },
    async_trait::async_trait,
    std::time::Duration,
};

pub struct SourceIndexTarget {
    config: SourceIndexConfig,
    package: String,
    token: Option<String>,
}

impl SourceIndexTarget {
    /// Reads the credential from `config.token_env`.
    pub fn from_env(config: SourceIndexConfig, package: &str) -> Self {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Self::new(config, package, token)
    }

    pub fn new(config: SourceIndexConfig, package: &str, token: Option<String>) -> Self {
        Self {
            config,
            package: package.to_string(),
            token,
        }
    }
}

#[async_trait]
impl RegistryTarget for SourceIndexTarget {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self, staging: &StagingSet, version: &Version) -> Result<(), String> {
        if staging.is_empty() {
            return Err("staging set is empty".to_string());
        }
        if self.token.is_none() {
            return Err(format!("missing credential: {} is not set", self.config.token_env));
        }
        let expected_version = version.to_string();
        for artifact in staging.artifacts() {
            let Some(name) = artifact.name() else {
                return Err(format!(
                    "{} does not follow <name>-<version>-<tag>.<ext>",
                    artifact.file_name
                ));
            };
            if !name.is_package(&self.package) {
                return Err(format!(
                    "{} is not a {} artifact",
                    artifact.file_name, self.package
                ));
            }
            if name.version != expected_version {
                return Err(format!(
                    "{} has version {}, expected {expected_version}",
                    artifact.file_name, name.version
                ));
            }
            if !self.config.extensions.iter().any(|ext| *ext == name.extension) {
                return Err(format!(
                    "{}: extension .{} is not accepted (expected one of {})",
                    artifact.file_name,
                    name.extension,
                    self.config.extensions.join(", ")
                ));
            }
        }
        Ok(())
    }

    async fn upload(&self, staging: &StagingSet, version: &Version) -> PublishOutcome {
        let files: Vec<String> = staging
            .artifacts()
            .map(|a| a.path.display().to_string())
            .collect();
        let rendered = render_args(
            &self.config.command,
            &[
                ("version", version.to_string()),
                ("staging_dir", staging.dir().display().to_string()),
            ],
            &files,
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
                staging.dir(),
                &envs,
                Duration::from_secs(self.config.timeout_secs),
            )
            .await,
        )
    }
}
