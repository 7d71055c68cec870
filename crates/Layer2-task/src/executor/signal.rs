//! OS signal delivery for worker processes

use crate::executor::{ProcessSignaller, Signal};
use autorun_foundation::{Error, Result};
use tracing::debug;

/// Sends real signals. With `process_group` set the whole group led by the
/// worker is signalled (`kill(-pid, ..)`); workers are spawned as group
/// leaders, so this reaches their children too.
#[derive(Debug, Clone)]
pub struct OsSignaller {
    process_group: bool,
}

impl OsSignaller {
    pub fn new(process_group: bool) -> Self {
        Self { process_group }
    }
}

impl Default for OsSignaller {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProcessSignaller for OsSignaller {
    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        // pid 0 / -1 would address our own group or every process
        let raw = i32::try_from(pid)
            .ok()
            .filter(|p| *p > 1)
            .ok_or_else(|| Error::Signal(format!("refusing to signal pid {}", pid)))?;

        let target = if self.process_group { -raw } else { raw };
        let signo = match signal {
            Signal::Graceful => libc::SIGTERM,
            Signal::Forceful => libc::SIGKILL,
        };

        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(target, signo) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(Error::Signal(format!("{:?} to {}: {}", signal, target, err)));
        }

        debug!("Sent {:?} to {}", signal, target);
        Ok(())
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        match signal {
            // No SIGTERM equivalent; report failure so the caller escalates
            Signal::Graceful => Err(Error::Signal("graceful termination unsupported".to_string())),
            Signal::Forceful => {
                let mut cmd = std::process::Command::new("taskkill");
                cmd.args(["/PID", &pid.to_string(), "/F"]);
                if self.process_group {
                    cmd.arg("/T");
                }
                let status = cmd.status()?;
                if status.success() {
                    debug!("Killed process {}", pid);
                    Ok(())
                } else {
                    Err(Error::Signal(format!("taskkill exited with {}", status)))
                }
            }
        }
    }
}
