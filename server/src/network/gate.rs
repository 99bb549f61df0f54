use std::{net::IpAddr, process::Stdio, time::Duration};

use async_trait::async_trait;
use derive_more::derive::Display;
use tokio::process::Command;

use crate::server_config::GateConfig;

#[derive(Debug, Display)]
pub enum GateError {
    #[display("no {_0} command configured")]
    NotConfigured(&'static str),
    #[display("could not run {action} command: {source}")]
    Spawn {
        action: &'static str,
        source: std::io::Error,
    },
    #[display("{action} command timed out")]
    Timeout { action: &'static str },
    #[display("{action} command exited with {code:?}: {stderr}")]
    Failed {
        action: &'static str,
        code: Option<i32>,
        stderr: String,
    },
}

impl std::error::Error for GateError {}

/// Grants and revokes one address's access to the document store port.
#[async_trait]
pub trait NetworkGate: Send + Sync {
    async fn open(&self, addr: IpAddr) -> Result<(), GateError>;
    async fn close(&self, addr: IpAddr) -> Result<(), GateError>;
}

/// Single-host CIDR for `addr`.
pub fn allowlist_cidr(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{v4}/32"),
        IpAddr::V6(v6) => format!("{v6}/128"),
    }
}

/// Runs configured external commands to add and remove the ingress rule.
#[derive(Debug, Clone)]
pub struct CommandGate {
    port: u16,
    open_command: Vec<String>,
    close_command: Vec<String>,
    timeout: Duration,
}

impl CommandGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            port: config.port,
            open_command: config.open_command.clone(),
            close_command: config.close_command.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    fn render(&self, template: &[String], addr: IpAddr) -> Vec<String> {
        let cidr = allowlist_cidr(addr);
        let port = self.port.to_string();
        template
            .iter()
            .map(|arg| arg.replace("{cidr}", &cidr).replace("{port}", &port))
            .collect()
    }

    async fn run(
        &self,
        action: &'static str,
        template: &[String],
        addr: IpAddr,
    ) -> Result<(), GateError> {
        let argv = self.render(template, addr);
        let (program, args) = argv.split_first().ok_or(GateError::NotConfigured(action))?;

        tracing::debug!("Running {} command: {:?}", action, argv);
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| GateError::Timeout { action })?
            .map_err(|source| GateError::Spawn { action, source })?;

        if !output.status.success() {
            return Err(GateError::Failed {
                action,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NetworkGate for CommandGate {
    async fn open(&self, addr: IpAddr) -> Result<(), GateError> {
        self.run("open", &self.open_command, addr).await?;
        tracing::info!("Allowlisted {} on port {}", allowlist_cidr(addr), self.port);
        Ok(())
    }

    async fn close(&self, addr: IpAddr) -> Result<(), GateError> {
        self.run("close", &self.close_command, addr).await?;
        tracing::info!("Revoked {} on port {}", allowlist_cidr(addr), self.port);
        Ok(())
    }
}
