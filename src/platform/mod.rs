use std::path::PathBuf;
use tokio::process::Command;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as imp;
#[cfg(windows)]
use windows as imp;

/// File name of the server's start script inside `<instance>/bin`.
pub fn launch_script_name() -> &'static str {
    imp::LAUNCH_SCRIPT
}

/// Configure the command to run in its own process group so the whole
/// server tree can be signalled at once.
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Gracefully terminate a child process and its descendants.
/// Tries graceful shutdown first, then forcefully kills after 5 seconds.
pub async fn terminate_child(child: &mut tokio::process::Child, child_pid: Option<u32>) {
    imp::terminate_child(child, child_pid).await
}

/// Get the current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Identify which process owns a given TCP port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    imp::identify_port_owner(port)
}
