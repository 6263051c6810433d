// Debuggee process control
//
// Launches the debuggee as a child process and supervises its exit. The
// child is killed on drop, so a failing test never leaks a process.

use crate::error::{HarnessError, HarnessResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

pub struct Debuggee {
    child: Child,
}

impl Debuggee {
    /// Spawn a debuggee. Its stderr passes through for diagnostics; stdout
    /// is discarded.
    pub fn launch(program: &str, args: &[&str]) -> HarnessResult<Self> {
        info!("Launching debuggee: {} {}", program, args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(Self { child })
    }

    /// Wait for the debuggee to exit on its own. A process killed by a
    /// signal has no exit code and is reported as -1.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> HarnessResult<i32> {
        let status = tokio::time::timeout(timeout, self.child.wait())
            .await
            .map_err(|_| HarnessError::ExitTimeout(timeout))??;

        let code = status.code().unwrap_or(-1);
        info!("Debuggee exited with code {}", code);
        Ok(code)
    }

    /// Wait for exit and insist on a specific code.
    pub async fn expect_exit_code(
        &mut self,
        expected: i32,
        timeout: Duration,
    ) -> HarnessResult<()> {
        let actual = self.wait_for_exit(timeout).await?;
        if actual != expected {
            return Err(HarnessError::ExitCode { expected, actual });
        }
        Ok(())
    }

    /// Forcibly terminate the debuggee, e.g. after an unrelated failure.
    pub async fn kill(&mut self) -> HarnessResult<()> {
        warn!("Killing debuggee");
        self.child.kill().await?;
        Ok(())
    }
}
