//! Builds the subprocess that runs an agent: local, or over a remote shell
//!
//! Mirrors the spec's launcher precedence: `localhost` spawns the agent
//! directly; anything else goes through `ssh` with the session's cipher,
//! key, compression and extra-parameter choices, optionally wrapped in a
//! password-via-environment helper and/or `sudo`. When no `--script` path
//! is given and the destination isn't local, the driver uploads its own
//! executable to a remote scratch location before invoking it there.

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use crate::config::SessionParams;
use crate::error::{IoResultExt, Result, SyncError};

/// Where the agent for this worker will run
#[derive(Debug, Clone)]
pub enum Destination {
    Local,
    Remote { user_host: String },
}

impl Destination {
    pub fn parse(dest_host: &str) -> Self {
        if dest_host == "localhost" {
            Destination::Local
        } else {
            Destination::Remote {
                user_host: dest_host.to_string(),
            }
        }
    }
}

/// Which agent subcommand verb to invoke remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    /// `server`: a caller-supplied or already-resident agent path
    Server,
    /// `tmpserver`: a one-shot uploaded agent that deletes itself on exit
    Tmpserver,
}

impl AgentRole {
    fn verb(self) -> &'static str {
        match self {
            AgentRole::Server => "server",
            AgentRole::Tmpserver => "tmpserver",
        }
    }
}

/// Builds the argv/env for an agent subprocess, local or remote
pub struct TransportLauncher<'a> {
    pub session: &'a SessionParams,
}

impl<'a> TransportLauncher<'a> {
    pub fn new(session: &'a SessionParams) -> Self {
        Self { session }
    }

    /// Determine the agent role and remote path to run, uploading this
    /// binary to a scratch location first if no script path was configured
    /// and the destination is remote.
    pub fn resolve_agent_path(
        &self,
        worker: usize,
        destination: &Destination,
    ) -> Result<(AgentRole, String)> {
        if let Some(script) = &self.session.script {
            return Ok((AgentRole::Server, script.clone()));
        }

        match destination {
            Destination::Local => {
                let exe = std::env::current_exe()
                    .map_err(|e| SyncError::transport(worker, format!("resolving self path: {e}")))?;
                Ok((
                    AgentRole::Server,
                    exe.to_string_lossy().into_owned(),
                ))
            }
            Destination::Remote { user_host } => {
                let remote_path = self.upload_self(worker, user_host)?;
                Ok((AgentRole::Tmpserver, remote_path))
            }
        }
    }

    /// Stream this binary's own executable bytes to a remote scratch file
    /// over a one-shot ssh session, returning the remote path.
    fn upload_self(&self, worker: usize, user_host: &str) -> Result<String> {
        let exe_path = std::env::current_exe()
            .map_err(|e| SyncError::transport(worker, format!("resolving self path: {e}")))?;
        let exe_bytes = std::fs::read(&exe_path).with_path(&exe_path)?;

        let mut cmd = self.ssh_command(user_host);
        cmd.arg("f=$(mktemp); cat > \"$f\"; chmod +x \"$f\"; echo \"$f\"");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SyncError::transport(worker, format!("spawning upload session: {e}")))?;

        child
            .stdin
            .take()
            .expect("piped stdin")
            .write_all(&exe_bytes)
            .map_err(|e| SyncError::transport(worker, format!("uploading agent binary: {e}")))?;

        let mut remote_path = String::new();
        child
            .stdout
            .take()
            .expect("piped stdout")
            .read_to_string(&mut remote_path)
            .map_err(|e| SyncError::transport(worker, format!("reading uploaded path: {e}")))?;

        let status = child
            .wait()
            .map_err(|e| SyncError::transport(worker, format!("waiting on upload session: {e}")))?;
        if !status.success() {
            return Err(SyncError::transport(worker, "upload session exited non-zero"));
        }

        Ok(remote_path.trim().to_string())
    }

    /// A bare `ssh user@host` command with this session's connection options applied
    fn ssh_command(&self, user_host: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-c").arg(&self.session.cipher);
        if let Some(id) = &self.session.id {
            cmd.arg("-i").arg(id);
        }
        if self.session.compress {
            cmd.arg("-C");
        }
        if let Some(extra) = &self.session.extraparams {
            for part in extra.split_whitespace() {
                cmd.arg(part);
            }
        }
        cmd.arg(user_host);

        if let Some(pass_var) = &self.session.pass {
            if let Ok(password) = std::env::var(pass_var) {
                let mut wrapped = Command::new("sshpass");
                wrapped.arg("-e");
                wrapped.env("SSHPASS", password);
                wrapped.arg(cmd.get_program());
                for arg in cmd.get_args() {
                    wrapped.arg(arg);
                }
                return wrapped;
            }
        }
        cmd
    }

    /// Build the fully-configured, not-yet-spawned agent command for this worker
    pub fn build(
        &self,
        _worker: usize,
        destination: &Destination,
        agent_path: &str,
        role: AgentRole,
        dest_path: &str,
    ) -> Command {
        let session_args = |cmd: &mut Command| {
            cmd.arg("-b").arg(self.session.blocksize.to_string());
            cmd.arg("-d").arg(
                ((self.session.fadvise.local as u8) | ((self.session.fadvise.remote as u8) << 1))
                    .to_string(),
            );
            cmd.arg("-1").arg(self.session.hash.to_string());
            if let Some(secondary) = self.session.additionalhash {
                cmd.arg("-2").arg(secondary.to_string());
            }
        };

        match destination {
            Destination::Local => {
                let mut cmd = Command::new(agent_path);
                cmd.arg(role.verb()).arg(dest_path);
                session_args(&mut cmd);
                cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
                cmd
            }
            Destination::Remote { user_host } => {
                let mut remote_invocation = String::new();
                if self.session.sudo {
                    remote_invocation.push_str("sudo ");
                }
                remote_invocation.push_str(agent_path);
                remote_invocation.push(' ');
                remote_invocation.push_str(role.verb());
                remote_invocation.push(' ');
                remote_invocation.push_str(dest_path);
                remote_invocation.push_str(" -b ");
                remote_invocation.push_str(&self.session.blocksize.to_string());
                remote_invocation.push_str(" -d ");
                remote_invocation.push_str(
                    &((self.session.fadvise.local as u8) | ((self.session.fadvise.remote as u8) << 1))
                        .to_string(),
                );
                remote_invocation.push_str(" -1 ");
                remote_invocation.push_str(&self.session.hash.to_string());
                if let Some(secondary) = self.session.additionalhash {
                    remote_invocation.push_str(" -2 ");
                    remote_invocation.push_str(&secondary.to_string());
                }

                let mut cmd = self.ssh_command(user_host);
                cmd.arg(remote_invocation);
                cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
                cmd
            }
        }
    }
}
