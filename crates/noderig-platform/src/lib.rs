mod commands;
mod host;
#[cfg(unix)]
mod identity;
mod paths;

pub use commands::{HideWindow, ProcessRunner};
pub use host::{detect_host, parse_os_release};
pub use paths::{AppPaths, AppPathsError, HOME_ENV};
