use tokio::process::Command;
use tracing::debug;

pub const LAUNCH_SCRIPT: &str = "catalina.bat";

pub fn configure_process_group(_cmd: &mut Command) {}

pub async fn terminate_child(child: &mut tokio::process::Child, child_pid: Option<u32>) {
    debug!(pid = ?child_pid, "killing server process");
    let _ = child.kill().await;
    let _ = child.wait().await;
}

pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
