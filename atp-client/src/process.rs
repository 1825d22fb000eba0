//! Plugin process management

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::{ClientConfig, PluginConfig};

/// A plugin running as a child process, speaking the protocol over its stdio
pub struct PluginProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl PluginProcess {
    /// Spawn a new plugin process. It is killed when dropped.
    pub fn spawn(config: &PluginConfig) -> io::Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(ref cwd) = config.cwd {
            cmd.current_dir(cwd);
        }

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        debug!("Spawned plugin {} (pid {:?})", config.command, child.id());

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Client over the process's stdio. Can only be taken once.
    pub fn client(&mut self, config: ClientConfig) -> io::Result<Client<ChildStdout, ChildStdin>> {
        let (Some(stdout), Some(stdin)) = (self.stdout.take(), self.stdin.take()) else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "plugin stdio has already been taken",
            ));
        };
        Ok(Client::with_config(stdout, stdin, config))
    }

    /// Wait for the plugin to exit
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        if !status.success() {
            warn!("Plugin exited with {}", status);
        }
        Ok(status)
    }

    /// Kill the process
    pub async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_can_only_be_taken_once() {
        let config = PluginConfig {
            command: "cat".to_string(),
            ..Default::default()
        };
        let mut process = PluginProcess::spawn(&config).unwrap();
        assert!(process.id().is_some());
        assert!(process.client(ClientConfig::default()).is_ok());
        assert!(process.client(ClientConfig::default()).is_err());
        process.kill().await.unwrap();
    }
}
