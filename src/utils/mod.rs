pub mod cargo;
pub mod fs;
pub mod git;
pub mod process;

pub use cargo::{find_cargo_locks, refresh_cargo_lock};
pub use fs::{copy_into, list_files, reset_dir};
pub use git::{get_git_root_path, Git};
pub use process::{check_command_available, render_args, run_with_timeout};
