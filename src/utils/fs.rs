use {
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
    walkdir::WalkDir,
};

/// Regular files below `dir`, skipping hidden entries, sorted by path.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut results = vec![];
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.'))
        })
    {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            results.push(entry.into_path());
        }
    }
    results.sort();
    Ok(results)
}

/// Empties `dir`, creating it if needed.
pub fn reset_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Copies `file` into `dir` under its own file name and returns the new path.
pub fn copy_into(file: &Path, dir: &Path) -> io::Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", file.display()),
        )
    })?;
    let dest = dir.join(name);
    fs::copy(file, &dest)?;
    Ok(dest)
}
