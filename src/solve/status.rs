//! Build status subscription

use tokio::sync::oneshot;
use tonic::transport::Channel;

use crate::collector::{BuildErrors, Interrupt, StreamCollector};
use crate::proto::control_client::ControlClient;
use crate::proto::{StatusRequest, StatusResponse};

/// Subscribes to the status stream of one build
pub(crate) struct StatusListener {
    pub build_id: String,
    pub control: ControlClient<Channel>,
    pub errors: BuildErrors,
    pub interrupt: Interrupt,
}

impl StatusListener {
    /// Subscribe, open `started`, then wait for the terminal snapshot
    ///
    /// `started` fires once the subscription is issued, not when it has drained.
    pub async fn run(self, started: oneshot::Sender<()>) {
        let mut control = self.control;
        let request = StatusRequest {
            r#ref: self.build_id.clone(),
        };
        let collector = StreamCollector::streaming(
            "control status",
            self.errors.clone(),
            self.interrupt,
            async move { control.status(request).await },
        );
        let _ = started.send(());

        match collector.single().await {
            Ok(Some(snapshot)) => report(&self.build_id, &snapshot),
            Ok(None) => {}
            Err(violation) => self.errors.record(violation),
        }
    }
}

fn report(build_id: &str, snapshot: &StatusResponse) {
    for vertex in &snapshot.vertexes {
        if !vertex.error.is_empty() {
            tracing::error!(build_id, "Vertex {} failed: {}", vertex.name, vertex.error);
        } else {
            tracing::debug!(build_id, cached = vertex.cached, "Vertex {}", vertex.name);
        }
    }
    for status in &snapshot.statuses {
        tracing::debug!(build_id, "{} {}/{}", status.id, status.current, status.total);
    }
    for log in &snapshot.logs {
        tracing::debug!(build_id, "{}", String::from_utf8_lossy(&log.msg).trim_end());
    }
    for warning in &snapshot.warnings {
        tracing::warn!(
            build_id,
            level = warning.level,
            "Build warning: {}",
            String::from_utf8_lossy(&warning.short)
        );
    }
    tracing::info!(
        build_id,
        "Status snapshot: {} vertices, {} warnings",
        snapshot.vertexes.len(),
        snapshot.warnings.len()
    );
}
