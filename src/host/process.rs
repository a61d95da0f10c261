//! Subprocess launcher for step commands

use crate::host::{RunnerError, StepOutput};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Launches external programs and captures their output
///
/// Each program runs in its own process group. Dropping the returned future
/// kills the whole group, which is how timeouts and cancellation stop a
/// running step together with everything it spawned.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Run `program args...` in `cwd` with `env` layered over the host environment
    ///
    /// # Errors
    /// Returns `RunnerError::Spawn` if the program cannot be started. A
    /// non-zero exit is not an error; it is reported through
    /// `StepOutput::exit_code`.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<StepOutput, RunnerError> {
        debug!("Spawning {} {:?} in {}", program, args, cwd.display());

        let spawn_error = |source: std::io::Error| RunnerError::Spawn {
            program: program.to_string(),
            source,
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(spawn_error)?;
        let group = ProcessGroup::new(child.id());
        let output = child.wait_with_output().await.map_err(spawn_error)?;
        group.disarm();

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!("{} exited with code {}: {}", program, exit_code, stderr.trim());
        }
        debug!("{} returned {} bytes of output", program, stdout.len() + stderr.len());

        Ok(StepOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Kills a step's process group when dropped before the step finished
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    id: Option<u32>,
}

impl ProcessGroup {
    fn new(id: Option<u32>) -> Self {
        Self { id }
    }

    fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(id) = self.id.take() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            debug!("Killing process group {}", id);
            if let Err(e) = killpg(Pid::from_raw(id as i32), Signal::SIGKILL) {
                debug!("Process group {} already gone: {}", id, e);
            }
        }
    }
}
