use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use ipnet::Ipv4Net;
use time::{format_description::well_known, OffsetDateTime};
use tokio::process::Command;
use tracing::{error, info};

use crate::netdetect;
use crate::nmap;
use crate::types::ScanResult;

/// External discovery command. The resolved subnet is appended as the final
/// argument; no shell is involved.
#[derive(Debug, Clone)]
pub struct ScanCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ScanCommand {
    /// Ping-scan without DNS resolution, the same invocation the dashboard UI
    /// has always relied on.
    pub fn nmap(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-n".into(), "-sn".into()],
        }
    }
}

/// Outcome of a scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStart {
    /// Scan subprocess detached; results land in the result file later.
    Initiated { subnet: Ipv4Net },
    /// A scan is already running; nothing was spawned.
    Conflict,
}

struct CoordinatorInner {
    running: AtomicBool,
    results_path: PathBuf,
    command: ScanCommand,
    default_subnet: Option<Ipv4Net>,
}

/// Resets the single-flight flag when the scan task finishes, on every exit
/// path including panics.
struct RunningGuard(Arc<CoordinatorInner>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Single-flight orchestrator for network scans.
///
/// `start` resolves a subnet, spawns the scan subprocess as a detached task
/// and returns immediately; a second request while the first is still running
/// is rejected with [`ScanStart::Conflict`]. On a zero exit code the parsed
/// devices replace the persisted result file wholesale; any other outcome
/// leaves the previous result untouched. Reads never block on a running scan.
#[derive(Clone)]
pub struct ScanCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl ScanCoordinator {
    pub fn new(
        results_path: PathBuf,
        command: ScanCommand,
        default_subnet: Option<Ipv4Net>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                running: AtomicBool::new(false),
                results_path,
                command,
                default_subnet,
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn default_subnet(&self) -> Option<Ipv4Net> {
        self.inner.default_subnet
    }

    /// Accept or reject a scan request. Subnet resolution order: explicit
    /// override, configured default, derived from the first non-loopback
    /// interface. Validation failures reject the request before the
    /// single-flight flag is touched, so nothing needs unwinding.
    pub async fn start(&self, subnet_override: Option<&str>) -> Result<ScanStart> {
        let subnet = match subnet_override {
            Some(raw) => netdetect::parse_subnet(raw)?,
            None => match self.inner.default_subnet {
                Some(net) => net,
                None => netdetect::detect_local_subnet()
                    .context("no subnet supplied and none could be derived")?,
            },
        };

        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("scan already in progress, rejecting request");
            return Ok(ScanStart::Conflict);
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = RunningGuard(inner.clone());
            run_scan(&inner, subnet).await;
        });

        Ok(ScanStart::Initiated { subnet })
    }

    /// Last persisted result, or an empty device list before the first scan.
    pub async fn latest(&self) -> Result<ScanResult> {
        match tokio::fs::read(&self.inner.results_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).with_context(|| {
                format!(
                    "corrupt scan result file: {}",
                    self.inner.results_path.display()
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ScanResult::default()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to read {}", self.inner.results_path.display())
            }),
        }
    }
}

async fn run_scan(inner: &CoordinatorInner, subnet: Ipv4Net) {
    info!(%subnet, program = %inner.command.program, "starting network scan");

    let output = Command::new(&inner.command.program)
        .args(&inner.command.args)
        .arg(subnet.to_string())
        .output()
        .await;

    let output = match output {
        Ok(out) => out,
        Err(e) => {
            error!(error = %e, "failed to spawn scan subprocess");
            return;
        }
    };

    if !output.status.success() {
        error!(
            code = output.status.code().unwrap_or(-1),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "scan subprocess failed, keeping previous results"
        );
        return;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let devices = nmap::parse_scan_output(&stdout);
    let result = ScanResult {
        timestamp: Some(now_rfc3339()),
        devices,
    };

    match persist_result(&inner.results_path, &result).await {
        Ok(()) => info!(devices = result.devices.len(), "network scan complete"),
        Err(e) => error!(error = %e, "failed to persist scan results"),
    }
}

async fn persist_result(path: &std::path::Path, result: &ScanResult) -> Result<()> {
    let json = serde_json::to_vec_pretty(result)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
