use {
    crate::{
        error::{ReleaseError, Result},
        types::{Artifact, BuildCell, CellResult, StagingSet, Version},
        utils::{copy_into, list_files, reset_dir},
    },
    log::{info, warn},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Flattens terminal cell results into one staging directory.
///
/// Collisions are detected before anything is copied, so a duplicate leaves
/// no partially populated staging directory behind.
pub fn collect(
    results: &[CellResult],
    version: &Version,
    package: &str,
    staging_dir: &Path,
) -> Result<StagingSet> {
    let mut merged: BTreeMap<String, &Artifact> = BTreeMap::new();
    for result in results {
        let artifacts = match &result.outcome {
            Ok(artifacts) => artifacts,
            Err(failure) => {
                warn!("skipping artifacts of failed cell {}: {failure}", result.cell);
                continue;
            }
        };
        for artifact in artifacts {
            if let Some(existing) = merged.get(&artifact.file_name) {
                return Err(ReleaseError::DuplicateArtifact {
                    file_name: artifact.file_name.clone(),
                    first: existing.cell.id(),
                    second: artifact.cell.id(),
                });
            }
            check_name(artifact, version, package);
            merged.insert(artifact.file_name.clone(), artifact);
        }
    }

    reset_dir(staging_dir)?;
    let mut staged = BTreeMap::new();
    for (file_name, artifact) in merged {
        let path = copy_into(&artifact.path, staging_dir)?;
        staged.insert(
            file_name.clone(),
            Artifact {
                file_name,
                path,
                cell: artifact.cell.clone(),
            },
        );
    }
    info!("staged {} artifact(s) in {}", staged.len(), staging_dir.display());
    Ok(StagingSet::new(staging_dir.to_path_buf(), staged))
}

fn check_name(artifact: &Artifact, version: &Version, package: &str) {
    match artifact.name() {
        None => warn!(
            "{} (from {}) does not follow <name>-<version>-<tag>.<ext>",
            artifact.file_name, artifact.cell
        ),
        Some(name) if name.version != version.to_string() => warn!(
            "{} (from {}) carries version {}, expected {version}",
            artifact.file_name, artifact.cell, name.version
        ),
        Some(name) if !name.is_package(package) => warn!(
            "{} (from {}) is not a {package} artifact",
            artifact.file_name, artifact.cell
        ),
        Some(_) => {}
    }
}

/// Reloads a staging directory written by a previous `collect`.
///
/// The producing cell is unknown at this point and recorded as `staged/<dir>`.
pub fn load(staging_dir: &Path) -> Result<StagingSet> {
    let cell = BuildCell::new(
        "staged",
        staging_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    let mut artifacts = BTreeMap::new();
    for path in list_files(staging_dir)? {
        if path.parent() != Some(staging_dir) {
            continue;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        artifacts.insert(
            file_name.clone(),
            Artifact {
                file_name,
                path,
                cell: cell.clone(),
            },
        );
    }
    Ok(StagingSet::new(staging_dir.to_path_buf(), artifacts))
}

/// Combines staging directories written by separate build jobs (typically
/// one per operating system) into `staging_dir`, with the same duplicate
/// check as [`collect`].
pub fn merge(
    inputs: &[PathBuf],
    version: &Version,
    package: &str,
    staging_dir: &Path,
) -> Result<StagingSet> {
    let target = staging_dir.canonicalize().ok();
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        if let Some(target) = &target {
            if input.canonicalize()?.starts_with(target) {
                return Err(ReleaseError::Config(format!(
                    "{} lies inside the staging directory {}",
                    input.display(),
                    staging_dir.display()
                )));
            }
        }
        let staged = load(input)?;
        info!("{}: {} artifact(s)", input.display(), staged.len());
        let artifacts: Vec<Artifact> = staged.artifacts().cloned().collect();
        results.push(CellResult {
            cell: artifacts
                .first()
                .map(|a| a.cell.clone())
                .unwrap_or_else(|| BuildCell::new("staged", input.display().to_string())),
            required: true,
            outcome: Ok(artifacts),
        });
    }
    collect(&results, version, package, staging_dir)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::BuildFailure,
        pretty_assertions::assert_eq,
        std::fs,
    };

    fn cell_result(root: &Path, cell: BuildCell, files: &[&str]) -> CellResult {
        let dir = root.join("cells").join(cell.dir_name());
        fs::create_dir_all(&dir).unwrap();
        let artifacts = files
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, cell.id()).unwrap();
                Artifact {
                    file_name: name.to_string(),
                    path,
                    cell: cell.clone(),
                }
            })
            .collect();
        CellResult {
            cell,
            required: true,
            outcome: Ok(artifacts),
        }
    }

    #[test]
    fn test_collect_flattens_cells() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let results = vec![
            cell_result(root, BuildCell::new("linux", "3.8"), &["hfd-1.2.4-cp38-linux.whl"]),
            cell_result(
                root,
                BuildCell::new("linux", "3.9"),
                &["hfd-1.2.4-cp39-linux.whl", "hfd-1.2.4.tar.gz"],
            ),
        ];

        let staging = collect(&results, &Version::new(1, 2, 4), "hfd", &root.join("dist")).unwrap();

        assert_eq!(
            staging.file_names().collect::<Vec<_>>(),
            vec![
                "hfd-1.2.4-cp38-linux.whl",
                "hfd-1.2.4-cp39-linux.whl",
                "hfd-1.2.4.tar.gz"
            ]
        );
        let sdist = staging.get("hfd-1.2.4.tar.gz").unwrap();
        assert_eq!(sdist.path, root.join("dist/hfd-1.2.4.tar.gz"));
        assert_eq!(sdist.cell, BuildCell::new("linux", "3.9"));
        assert_eq!(fs::read_to_string(&sdist.path).unwrap(), "linux/3.9");
    }

    #[test]
    fn test_collect_rejects_duplicate_file_names() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let results = vec![
            cell_result(root, BuildCell::new("linux", "py3.8"), &["hfd-1.2.4-linux.whl"]),
            cell_result(root, BuildCell::new("linux", "py3.9"), &["hfd-1.2.4-linux.whl"]),
        ];

        let err = collect(&results, &Version::new(1, 2, 4), "hfd", &root.join("dist")).unwrap_err();

        match err {
            ReleaseError::DuplicateArtifact {
                file_name,
                first,
                second,
            } => {
                assert_eq!(file_name, "hfd-1.2.4-linux.whl");
                assert_eq!(first, "linux/py3.8");
                assert_eq!(second, "linux/py3.9");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(!root.join("dist").exists());
    }

    fn job_output(root: &Path, job: &str, files: &[&str]) -> PathBuf {
        let dir = root.join("jobs").join(job);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), job).unwrap();
        }
        dir
    }

    #[test]
    fn test_merge_combines_job_outputs() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let inputs = vec![
            job_output(root, "linux", &["hfd-0.1.6-cp310-manylinux_x86_64.whl"]),
            job_output(root, "macos", &["hfd-0.1.6-cp310-macosx_11_0_arm64.whl"]),
        ];

        let staging = merge(&inputs, &Version::new(0, 1, 6), "hfd", &root.join("dist")).unwrap();

        assert_eq!(staging.len(), 2);
        let wheel = staging.get("hfd-0.1.6-cp310-macosx_11_0_arm64.whl").unwrap();
        assert_eq!(wheel.cell, BuildCell::new("staged", "macos"));
        assert_eq!(fs::read_to_string(&wheel.path).unwrap(), "macos");
    }

    #[test]
    fn test_merge_rejects_the_same_wheel_from_two_jobs() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let inputs = vec![
            job_output(root, "ubuntu", &["hfd-0.1.6-cp310-manylinux_x86_64.whl"]),
            job_output(root, "linux", &["hfd-0.1.6-cp310-manylinux_x86_64.whl"]),
        ];

        let err = merge(&inputs, &Version::new(0, 1, 6), "hfd", &root.join("dist")).unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::DuplicateArtifact { first, second, .. }
                if first == "staged/ubuntu" && second == "staged/linux"
        ));
        assert!(!root.join("dist").exists());
    }

    #[test]
    fn test_merge_refuses_input_inside_staging_dir() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let input = job_output(root, "linux", &["hfd-0.1.6-cp310-manylinux_x86_64.whl"]);

        let err = merge(&[input], &Version::new(0, 1, 6), "hfd", &root.join("jobs")).unwrap_err();

        assert!(matches!(err, ReleaseError::Config(_)), "{err}");
        assert!(root.join("jobs/linux/hfd-0.1.6-cp310-manylinux_x86_64.whl").exists());
    }

    #[test]
    fn test_collect_skips_failed_cells() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let mut failed = cell_result(root, BuildCell::new("windows", "3.8"), &[]);
        failed.outcome = Err(BuildFailure::TimedOut { secs: 60 });
        let results = vec![
            cell_result(root, BuildCell::new("linux", "3.8"), &["hfd-1.2.4-cp38-linux.whl"]),
            failed,
        ];

        let staging = collect(&results, &Version::new(1, 2, 4), "hfd", &root.join("dist")).unwrap();
        assert_eq!(staging.len(), 1);
    }

    #[test]
    fn test_load_round_trips_staging_dir() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        let results = vec![cell_result(
            root,
            BuildCell::new("linux", "3.8"),
            &["hfd-1.2.4-cp38-linux.whl", "hfd-1.2.4.tar.gz"],
        )];
        let staged = collect(&results, &Version::new(1, 2, 4), "hfd", &root.join("dist")).unwrap();

        let loaded = load(&root.join("dist")).unwrap();
        assert_eq!(
            loaded.file_names().collect::<Vec<_>>(),
            staged.file_names().collect::<Vec<_>>()
        );
        assert_eq!(loaded.dir(), root.join("dist"));
    }
}
