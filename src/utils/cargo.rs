use {
    crate::{
        error::{ReleaseError, Result},
        utils::process::{run_with_timeout, tail},
    },
    log::info,
    std::{
        ffi::OsStr,
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// The nearest `Cargo.lock` at or above each `Cargo.toml` in `manifests`,
/// without leaving `root`. Other manifests are ignored.
pub fn find_cargo_locks(manifests: &[PathBuf], root: &Path) -> Vec<PathBuf> {
    let mut locks = vec![];
    for manifest in manifests {
        if manifest.file_name() != Some(OsStr::new("Cargo.toml")) {
            continue;
        }
        let lock = manifest
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(root))
            .map(|dir| dir.join("Cargo.lock"))
            .find(|lock| lock.is_file());
        if let Some(lock) = lock {
            if !locks.contains(&lock) {
                locks.push(lock);
            }
        }
    }
    locks
}

/// Runs `cargo tree` next to `cargo_lock` so cargo re-pins the workspace
/// member versions. Returns whether the lock file changed.
pub async fn refresh_cargo_lock(cargo_lock: &Path, timeout: Duration) -> Result<bool> {
    let failed = |message: String| ReleaseError::Lockfile {
        path: cargo_lock.to_path_buf(),
        message,
    };
    let dir = cargo_lock.parent().unwrap_or(Path::new("."));
    let before = fs::read(cargo_lock)?;

    info!("running `cargo tree` in {}", dir.display());
    let args = ["tree".to_string(), "--quiet".to_string()];
    let output = run_with_timeout("cargo", &args, dir, &[], timeout)
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !output.status.success() {
        return Err(failed(tail(&output.stderr, 10)));
    }
    Ok(fs::read(cargo_lock)? != before)
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn test_find_cargo_locks() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = root_dir.path();
        fs::create_dir_all(root.join("hfd-py")).unwrap();
        fs::create_dir_all(root.join("tools/bench")).unwrap();
        fs::write(root.join("Cargo.lock"), "").unwrap();
        fs::write(root.join("tools/bench/Cargo.lock"), "").unwrap();

        let manifests = [
            root.join("Cargo.toml"),
            root.join("hfd-py/Cargo.toml"),
            root.join("hfd-py/pyproject.toml"),
            root.join("tools/bench/Cargo.toml"),
        ];
        assert_eq!(
            find_cargo_locks(&manifests, root),
            vec![root.join("Cargo.lock"), root.join("tools/bench/Cargo.lock")]
        );
    }

    #[test]
    fn test_find_cargo_locks_stays_inside_root() {
        let outer = tempfile::tempdir().unwrap();
        fs::write(outer.path().join("Cargo.lock"), "").unwrap();
        let root = outer.path().join("repo");
        fs::create_dir_all(&root).unwrap();

        assert!(find_cargo_locks(&[root.join("Cargo.toml")], &root).is_empty());
    }
}
