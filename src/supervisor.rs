//! Controller subprocess supervision
//!
//! The bridge starts the controller as a child process and keeps the
//! returned [`ControllerProcess`] for teardown. The child is placed in its
//! own process group so a terminal Ctrl+C reaches only the bridge, which
//! then performs the quit handshake before reaping the child.

use crate::error::{BridgeError, Result};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// How to launch the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ControllerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        for (key, value) in &self.env {
            command.env(key, value);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        command
    }

    fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Handle to the running controller process
pub struct ControllerProcess {
    child: Child,
    name: String,
}

impl ControllerProcess {
    /// Spawn the controller
    pub fn spawn(command: &ControllerCommand) -> Result<Self> {
        let name = command.display_name();
        let child = command.to_command().spawn().map_err(|e| {
            BridgeError::Process(format!(
                "Failed to spawn controller '{}': {}",
                command.program.display(),
                e
            ))
        })?;

        tracing::info!("Spawned controller '{}' with PID {}", name, child.id());
        Ok(Self { child, name })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            BridgeError::Process(format!("Failed to poll controller '{}': {}", self.name, e))
        })
    }

    pub fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().map_err(|e| {
            BridgeError::Process(format!("Failed to wait for controller '{}': {}", self.name, e))
        })
    }

    pub fn kill(&mut self) -> Result<()> {
        tracing::warn!("Killing controller '{}'", self.name);
        self.child.kill().map_err(|e| {
            BridgeError::Process(format!("Failed to kill controller '{}': {}", self.name, e))
        })
    }

    /// Wait up to `timeout` for the child to exit on its own, then kill it
    ///
    /// Call after the quit handshake; a controller that acknowledged quit
    /// exits by itself.
    pub fn shutdown(mut self, timeout: Duration) -> Result<ExitStatus> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(status) = self.try_wait()? {
                tracing::info!("Controller '{}' exited with {}", self.name, status);
                return Ok(status);
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        tracing::warn!(
            "Controller '{}' still running after {:?}",
            self.name,
            timeout
        );
        self.kill()?;
        self.wait()
    }
}

impl Drop for ControllerProcess {
    fn drop(&mut self) {
        if self.is_running() {
            tracing::warn!("Controller '{}' handle dropped while running", self.name);
            if self.kill().is_ok() {
                self.wait().ok();
            }
        }
    }
}
