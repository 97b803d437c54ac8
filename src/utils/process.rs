use {
    anyhow::{anyhow, Result},
    log::debug,
    std::{
        path::{Path, PathBuf},
        process::{Output, Stdio},
        time::Duration,
    },
    tokio::process::Command,
};

/// Why an external command produced no usable output.
#[derive(Debug)]
pub enum RunError {
    Spawn(std::io::Error),
    TimedOut(Duration),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Spawn(e) => write!(f, "failed to start: {e}"),
            RunError::TimedOut(d) => write!(f, "timed out after {}s", d.as_secs()),
        }
    }
}

/// Runs `program args` in `cwd`, killing it if `timeout` elapses first.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    cwd: &Path,
    envs: &[(String, String)],
    timeout: Duration,
) -> std::result::Result<Output, RunError> {
    debug!("running `{program} {}` in {}", args.join(" "), cwd.display());
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(RunError::Spawn)?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(RunError::Spawn),
        Err(_) => Err(RunError::TimedOut(timeout)),
    }
}

/// Substitutes `{key}` placeholders in every argument.
///
/// An argument that is exactly `{files}` expands into one argument per file.
pub fn render_args(template: &[String], vars: &[(&str, String)], files: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(template.len());
    for arg in template {
        if arg == "{files}" {
            args.extend(files.iter().cloned());
            continue;
        }
        let mut rendered = arg.clone();
        for (key, value) in vars {
            rendered = rendered.replace(&format!("{{{key}}}"), value);
        }
        args.push(rendered);
    }
    args
}

/// Last few lines of a process stream, for error messages.
pub fn tail(bytes: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let collected: Vec<&str> = text.trim_end().lines().collect();
    collected[collected.len().saturating_sub(lines)..].join("\n")
}

/// Resolves `program` the way a spawn from `cwd` would, without running it.
pub fn check_command_available(program: &str, cwd: &Path) -> Result<PathBuf> {
    let resolved = which::which_in(program, std::env::var_os("PATH"), cwd)
        .map_err(|e| anyhow!("{program} is not available: {e}"))?;
    debug!("{program} resolved to {}", resolved.display());
    Ok(resolved)
}
