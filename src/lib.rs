//! hfd-release - release automation for the hfd downloader
//!
//! A release has two halves. `bump` runs on a developer machine: it computes
//! the next version, rewrites every manifest, commits and moves the release
//! tag. Pushing the tag starts `ship` in CI: every platform × runtime cell is
//! built, the artifacts are collected into one staging directory and published
//! to each registry independently.
//!
//! # Examples
//!
//! ## Bumping version
//!
//! ```no_run
//! use hfd_release::commands::bump_version::{bump_version, BumpPolicy};
//! use hfd_release::Version;
//!
//! let current = Version::parse("0.1.10").unwrap();
//! let next = bump_version(&BumpPolicy::Carry { ceiling: 10 }, &current).unwrap();
//! assert_eq!(next, Version::new(0, 2, 0));
//! ```
//!
//! ## Reading the manifest version
//!
//! ```no_run
//! use hfd_release::config::ReleaseConfig;
//! use hfd_release::release::version_store::VersionStore;
//! use std::path::Path;
//!
//! let config = ReleaseConfig::load(Path::new("release.toml")).unwrap();
//! let store = VersionStore::new(config.manifest_locations(Path::new(".")).unwrap());
//! println!("{}", store.check_in_sync().unwrap());
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod release;
pub mod types;
pub mod utils;

pub use commands::bump_version;
pub use error::ReleaseError;
pub use types::Version;

pub type Result<T> = anyhow::Result<T>;
