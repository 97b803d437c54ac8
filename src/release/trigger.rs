use crate::{
    error::{ReleaseError, Result},
    types::Version,
};

/// Environment variable CI sets to the pushed ref name.
pub const REF_NAME_ENV: &str = "GITHUB_REF_NAME";

/// A tag push that starts the build and publish half of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub tag: String,
    pub version: Version,
}

impl Trigger {
    /// Accepts `refs/tags/v1.2.3` or `v1.2.3`.
    pub fn from_ref(reference: &str) -> Result<Self> {
        let tag = reference
            .trim()
            .strip_prefix("refs/tags/")
            .unwrap_or(reference.trim());
        let Some(version) = tag.strip_prefix('v') else {
            return Err(ReleaseError::parse(
                reference,
                "release tags look like v<major>.<minor>.<patch>",
            ));
        };
        Ok(Self {
            tag: tag.to_string(),
            version: Version::parse(version)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        let reference = std::env::var(REF_NAME_ENV).map_err(|_| {
            ReleaseError::Config(format!("no --tag given and {REF_NAME_ENV} is not set"))
        })?;
        Self::from_ref(&reference)
    }
}
