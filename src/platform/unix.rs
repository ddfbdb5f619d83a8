use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

pub const LAUNCH_SCRIPT: &str = "catalina.sh";

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

pub async fn terminate_child(child: &mut tokio::process::Child, child_pid: Option<u32>) {
    if let Some(pid) = child_pid {
        let pgid = Pid::from_raw(pid as i32);
        match killpg(pgid, Signal::SIGTERM) {
            Ok(()) => {
                debug!(pid, "sent SIGTERM to process group");
            }
            Err(nix::errno::Errno::ESRCH) => {
                debug!(pid, "process group already exited");
                return;
            }
            Err(e) => {
                warn!(pid, error = %e, "killpg(SIGTERM) failed, falling back to kill");
                let _ = child.kill().await;
                return;
            }
        }

        let grace = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
        match grace {
            Ok(Ok(_status)) => {
                debug!(pid, "child exited after SIGTERM");
            }
            _ => {
                warn!(pid, "child did not exit within 5s, sending SIGKILL");
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }
    } else {
        let _ = child.kill().await;
    }
}

/// Socket tables to search. JVMs usually listen on a dual-stack `[::]`
/// socket, which only shows up in the IPv6 table.
#[cfg(target_os = "linux")]
const SOCKET_TABLES: [&str; 2] = ["/proc/net/tcp6", "/proc/net/tcp"];

#[cfg(target_os = "linux")]
pub fn identify_port_owner(port: u16) -> Option<String> {
    let inode = SOCKET_TABLES
        .iter()
        .filter_map(|table| std::fs::read_to_string(table).ok())
        .find_map(|content| listening_inode(&content, port))?;
    let pid = pid_holding_socket(&inode)?;
    Some(describe_process(&pid))
}

/// Inode of the socket bound to `port` in one `/proc/net/tcp*` table.
/// Local addresses look like `0100007F:1F90` (v4) or 32 hex digits and a
/// port (v6); only the part after the colon matters here.
#[cfg(target_os = "linux")]
fn listening_inode(table: &str, port: u16) -> Option<String> {
    let port_hex = format!("{port:04X}");
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            return None;
        }
        let (_, local_port) = fields[1].rsplit_once(':')?;
        (local_port == port_hex && fields[9] != "0").then(|| fields[9].to_string())
    })
}

#[cfg(target_os = "linux")]
fn pid_holding_socket(inode: &str) -> Option<String> {
    let needle = format!("socket:[{inode}]");
    std::fs::read_dir("/proc")
        .ok()?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|pid| pid.chars().all(|c| c.is_ascii_digit()))
        .find(|pid| {
            std::fs::read_dir(format!("/proc/{pid}/fd"))
                .into_iter()
                .flatten()
                .flatten()
                .filter_map(|fd| std::fs::read_link(fd.path()).ok())
                .any(|link| link.to_string_lossy() == needle)
        })
}

#[cfg(target_os = "linux")]
fn describe_process(pid: &str) -> String {
    let cmd = std::fs::read_to_string(format!("/proc/{pid}/cmdline"))
        .map(|raw| raw.replace('\0', " ").trim().to_string())
        .unwrap_or_default();
    if cmd.is_empty() {
        format!("PID {pid}")
    } else if cmd.chars().count() > 60 {
        let short: String = cmd.chars().take(57).collect();
        format!("{short}... (PID {pid})")
    } else {
        format!("{cmd} (PID {pid})")
    }
}

#[cfg(not(target_os = "linux"))]
pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
