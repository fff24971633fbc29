//! Process liveness for execution recovery.

use gauntlet_application::ProcessLiveness;

/// Asks the kernel whether a pid is still in use.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidLiveness;

impl ProcessLiveness for PidLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == std::process::id() {
            return true;
        }
        pid_exists(pid)
    }
}

#[cfg(unix)]
fn pid_exists(pid: u32) -> bool {
    // pid 0 and negative values address process groups.
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 checks existence only; EPERM means it exists under another user.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_exists(_pid: u32) -> bool {
    false
}
