use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::push::Dispatcher;
use crate::types::DockerEvent;

/// Bridges Docker container lifecycle events to push notifications.
///
/// Holds one long-lived `docker events --format '{{json .}}'` subprocess and
/// consumes its stdout line by line for the lifetime of the process. Each line
/// is a best-effort JSON decode: the daemon occasionally splits or merges
/// objects across chunks, so undecodable lines are dropped silently as
/// steady-state noise. Notification sends are spawned detached so a slow push
/// service never stalls event consumption.
#[derive(Clone)]
pub struct EventBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    running: AtomicBool,
    dispatcher: Dispatcher,
    docker_program: String,
}

/// Clears the running flag when the consume loop exits, so a later `start`
/// can re-establish the stream.
struct StartedGuard(Arc<BridgeInner>);

impl Drop for StartedGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

impl EventBridge {
    pub fn new(dispatcher: Dispatcher, docker_program: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                running: AtomicBool::new(false),
                dispatcher,
                docker_program: docker_program.into(),
            }),
        }
    }

    /// Begin consuming the event stream. Idempotent: returns `false` without
    /// side effects when the bridge is already running. The flag resets when
    /// the stream closes; restarting after that is the caller's decision, not
    /// an automatic retry.
    pub fn start(&self) -> bool {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("docker event listener already running, not starting another");
            return false;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = StartedGuard(inner.clone());
            consume_events(&inner).await;
        });
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

async fn consume_events(inner: &BridgeInner) {
    info!(program = %inner.docker_program, "starting docker event listener");

    let child = Command::new(&inner.docker_program)
        .args(["events", "--format", "{{json .}}"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            error!(error = %e, "failed to start docker event listener process");
            return;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        error!("docker event listener has no stdout handle");
        return;
    };

    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(message) = notification_for_line(&line) {
                    info!(%message, "container lifecycle event matched");
                    let dispatcher = inner.dispatcher.clone();
                    // Detached: a slow or failing send must not stall the loop.
                    tokio::spawn(async move {
                        dispatcher.send_all(&message).await;
                    });
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading docker event stream");
                break;
            }
        }
    }

    let code = child.wait().await.ok().and_then(|s| s.code());
    warn!(?code, "docker event listener process exited");
}

/// Decode one event line and decide whether it warrants a notification.
/// Undecodable lines and uninteresting events both yield `None`.
pub fn notification_for_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<DockerEvent>(line) {
        Ok(event) => notification_for_event(&event),
        Err(e) => {
            // Partial or merged JSON objects are expected stream noise.
            debug!(error = %e, "discarding undecodable event line");
            None
        }
    }
}

/// Human-readable message for notification-worthy container transitions.
/// `start` events are deliberately excluded.
pub fn notification_for_event(event: &DockerEvent) -> Option<String> {
    if event.kind != "container" {
        return None;
    }
    let name = &event.actor.attributes.name;
    match event.status.as_str() {
        "die" => Some(format!("Container '{name}' died.")),
        "stop" => Some(format!("Container '{name}' has stopped.")),
        "restart" => Some(format!("Container '{name}' is restarting.")),
        _ => None,
    }
}
