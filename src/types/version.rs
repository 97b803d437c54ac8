use {
    crate::error::{ReleaseError, Result},
    std::{fmt, str::FromStr},
};

/// A release version. Field order gives the lexicographic total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let parsed =
            semver::Version::parse(input.trim()).map_err(|e| ReleaseError::parse(input, e))?;
        if !parsed.pre.is_empty() {
            return Err(ReleaseError::parse(
                input,
                format!("pre-release suffix `{}` is not supported", parsed.pre),
            ));
        }
        if !parsed.build.is_empty() {
            return Err(ReleaseError::parse(
                input,
                format!("build metadata `{}` is not supported", parsed.build),
            ));
        }
        Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
    }

    /// Tag form, e.g. `v1.2.3`.
    pub fn tag_name(&self) -> String {
        format!("v{self}")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
