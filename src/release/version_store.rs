//! Reads and rewrites the version token embedded in manifest files.

use {
    crate::{
        config::ManifestLocation,
        error::{ReleaseError, Result},
        types::Version,
    },
    log::{debug, info},
    std::{fs, path::PathBuf},
};

pub struct VersionStore {
    locations: Vec<ManifestLocation>,
}

impl VersionStore {
    /// The first location is authoritative for [`VersionStore::read`].
    pub fn new(locations: Vec<ManifestLocation>) -> Self {
        Self { locations }
    }

    /// Version in the first location whose file exists and matches.
    pub fn read(&self) -> Result<Version> {
        for location in &self.locations {
            if let Some(token) = read_token(location)? {
                debug!("read version {token} from {}", location.path.display());
                return Version::parse(&token);
            }
        }
        Err(ReleaseError::NotFound {
            searched: self.locations.len(),
        })
    }

    /// Every location that currently carries a version token.
    pub fn read_all(&self) -> Result<Vec<(PathBuf, Version)>> {
        let mut found = vec![];
        for location in &self.locations {
            if let Some(token) = read_token(location)? {
                found.push((location.path.clone(), Version::parse(&token)?));
            }
        }
        Ok(found)
    }

    /// Fails with `OutOfSync` when locations disagree; returns the shared version.
    pub fn check_in_sync(&self) -> Result<Version> {
        let found = self.read_all()?;
        let Some((_, first)) = found.first() else {
            return Err(ReleaseError::NotFound {
                searched: self.locations.len(),
            });
        };
        let drifted: Vec<String> = found
            .iter()
            .filter(|(_, version)| version != first)
            .map(|(path, version)| format!("{} has {version}", path.display()))
            .collect();
        if drifted.is_empty() {
            Ok(*first)
        } else {
            Err(ReleaseError::OutOfSync {
                details: format!("expected {first}; {}", drifted.join(", ")),
            })
        }
    }

    /// Rewrites `version` into every existing manifest and returns the files
    /// whose content changed.
    ///
    /// Every location is planned before anything is written, so a pattern
    /// that fails to match leaves all files untouched.
    pub fn write(&self, version: &Version) -> Result<Vec<PathBuf>> {
        let token = version.to_string();
        let mut planned = vec![];
        for location in &self.locations {
            if !location.path.exists() {
                debug!("skipping missing manifest {}", location.path.display());
                continue;
            }
            let content = fs::read_to_string(&location.path)?;
            let updated = replace_token(location, &content, &token)?;
            if updated != content {
                planned.push((location.path.clone(), updated));
            }
        }

        let mut rewritten = Vec::with_capacity(planned.len());
        for (path, content) in planned {
            fs::write(&path, content)?;
            info!("wrote version {token} to {}", path.display());
            rewritten.push(path);
        }
        Ok(rewritten)
    }
}

fn read_token(location: &ManifestLocation) -> Result<Option<String>> {
    if !location.path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&location.path)?;
    Ok(location
        .pattern
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Replaces the first capture group of the first match with `token`.
fn replace_token(location: &ManifestLocation, content: &str, token: &str) -> Result<String> {
    let group = location
        .pattern
        .captures(content)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ReleaseError::Rewrite {
            path: location.path.clone(),
            pattern: location.pattern.as_str().to_string(),
        })?;
    let mut updated = String::with_capacity(content.len() + token.len());
    updated.push_str(&content[..group.start()]);
    updated.push_str(token);
    updated.push_str(&content[group.end()..]);
    Ok(updated)
}
