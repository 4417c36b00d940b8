//! Supervision of the service under test.

use crate::config::ServiceCommand;
use anyhow::Context;
use loadtest_logwatch::{line_stream, merge_lines};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A running service process with piped diagnostic output.
///
/// The process leads its own process group so that termination reaches
/// any helpers it forks, and is killed if this handle is dropped.
pub struct ServiceProcess {
    child: Child,
    pid: Option<u32>,
}

impl ServiceProcess {
    pub fn spawn(command: &ServiceCommand) -> anyhow::Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to launch {}", command.program.display()))?;
        let pid = child.id();
        info!(
            "Launched {} (pid {})",
            command.program.display(),
            pid.map_or_else(|| "unknown".to_string(), |p| p.to_string())
        );

        Ok(Self { child, pid })
    }

    /// Take stdout and stderr as one line stream. Returns `None` on the
    /// second call.
    pub fn diagnostic_lines(
        &mut self,
    ) -> Option<impl Stream<Item = io::Result<String>> + Unpin + Send + 'static> {
        let stdout = self.child.stdout.take()?;
        let stderr = self.child.stderr.take()?;
        Some(merge_lines(line_stream(stdout), line_stream(stderr)))
    }

    /// Ask the service to shut down (SIGTERM to its process group).
    pub fn terminate(&mut self) -> anyhow::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.pid {
                debug!("Sending SIGTERM to process group {pid}");
                return match killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                    Err(e) => Err(e).context("Failed to signal service process group"),
                };
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            self.child
                .start_kill()
                .context("Failed to stop service process")
        }
    }

    /// Force the service down (SIGKILL to its process group) and reap it.
    pub async fn kill(&mut self) -> anyhow::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.pid {
                warn!("Killing service process group {pid}");
                if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    if e != nix::errno::Errno::ESRCH {
                        warn!("Failed to kill process group {pid}: {e}");
                    }
                }
            }
        }

        match self.child.kill().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e).context("Failed to kill service process"),
        }
    }

    /// Wait up to `timeout` for the service to exit.
    pub async fn wait(&mut self, timeout: Duration) -> Option<ExitStatus> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!("Failed to wait for service process: {e}");
                None
            }
            Err(_) => None,
        }
    }

    /// Exit status if the service already exited.
    pub fn try_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }
}
