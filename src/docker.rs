use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::types::ContainerSummary;

/// Lifecycle actions the dashboard may apply to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

/// `docker ps -a` as structured records, one JSON object per line.
pub async fn list_containers(program: &str) -> Result<Vec<ContainerSummary>> {
    let output = Command::new(program)
        .args(["ps", "-a", "--format", "{{json .}}"])
        .output()
        .await
        .context("failed to run docker ps")?;

    if !output.status.success() {
        bail!(
            "docker ps failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut containers = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let summary: ContainerSummary =
            serde_json::from_str(line).context("unexpected docker ps output line")?;
        containers.push(summary);
    }
    Ok(containers)
}

/// Apply a lifecycle action to one container, returning docker's stdout
/// (normally the container id echoed back).
pub async fn container_action(
    program: &str,
    id: &str,
    action: ContainerAction,
) -> Result<String> {
    if id.is_empty() || !id.chars().all(valid_id_char) {
        bail!("invalid container id: {id:?}");
    }

    let output = Command::new(program)
        .args([action.as_str(), id])
        .output()
        .await
        .with_context(|| format!("failed to run docker {}", action.as_str()))?;

    if !output.status.success() {
        bail!(
            "docker {} {} failed: {}",
            action.as_str(),
            id,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// Container ids and names: hex ids or [a-zA-Z0-9][a-zA-Z0-9_.-]* names.
fn valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}
