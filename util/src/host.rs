//! Host platform (linux for example) utility functions

use std::env;
use std::path::PathBuf;
use uname;

/// Name of the environment variable pointing at the software root.
pub const SW_ROOT_ENV_VAR: &str = "GOTO_POSE_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software.
///
/// This is read from `GOTO_POSE_SW_ROOT`, falling back to the current working directory when the
/// variable isn't set.
pub fn get_sw_root() -> std::io::Result<PathBuf> {
    match env::var_os(SW_ROOT_ENV_VAR) {
        Some(p) => Ok(PathBuf::from(p)),
        None => env::current_dir()
    }
}
