//! BuildKit solve operation: one build driven by three concurrent participants
//!
//! A build subscribes to its status, registers itself through the control solve
//! and then runs the gateway exchange to completion. Every participant reports
//! failures into the build's shared [`BuildErrors`]; the build inspects that
//! collection once the gateway is done and returns either the result map or a
//! single combined error.

mod control;
mod gateway;
mod status;

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::builder::BuildConfig;
use crate::collector::{BuildErrors, InterruptHandle};
use crate::error::{Error, Result};
use crate::session::Session;
use control::ControlBuild;
use status::StatusListener;

pub use gateway::{BuildRefInterceptor, NegotiatedCaps, BUILD_REF_KEY, DEFAULT_CAPS};
use gateway::GatewayBuild;

/// One build of a Dockerfile, bound to the session that created it
///
/// `run` consumes the build, so a build can't be started twice.
#[derive(Debug)]
pub struct Build {
    id: String,
    session: Session,
    config: BuildConfig,
    errors: BuildErrors,
}

impl Build {
    pub(crate) fn new(session: Session, config: BuildConfig) -> Self {
        Self {
            id: format!("build-{}", Uuid::new_v4()),
            session,
            config,
            errors: BuildErrors::new(),
        }
    }

    /// Build reference sent to the engine
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the build to completion
    ///
    /// Returns the exporter metadata of the gateway solve, or one error covering
    /// every failure recorded by the participants.
    pub async fn run(self) -> Result<HashMap<String, String>> {
        tracing::info!(build_id = %self.id, "Starting build of {}", self.config.context_path.display());
        self.config.validate()?;

        let (interrupt_handle, interrupt) = InterruptHandle::new();
        let mut participants: Vec<JoinHandle<()>> = Vec::with_capacity(3);

        let (started_tx, started_rx) = oneshot::channel();
        let status = StatusListener {
            build_id: self.id.clone(),
            control: self.session.control(),
            errors: self.errors.clone(),
            interrupt: interrupt.clone(),
        };
        participants.push(tokio::spawn(status.run(started_tx)));
        if started_rx.await.is_err() {
            self.errors.record(Error::Interrupted("status listener"));
            return self.fail(interrupt_handle, participants).await;
        }

        let (started_tx, started_rx) = oneshot::channel();
        let control = ControlBuild {
            build_id: self.id.clone(),
            session_id: self.session.id().to_string(),
            control: self.session.control(),
            errors: self.errors.clone(),
            interrupt: interrupt.clone(),
        };
        participants.push(tokio::spawn(control.run(started_tx)));
        if started_rx.await.is_err() {
            self.errors.record(Error::Interrupted("control solve"));
            return self.fail(interrupt_handle, participants).await;
        }

        let (done_tx, done_rx) = oneshot::channel();
        let gateway = GatewayBuild {
            build_id: self.id.clone(),
            channel: self.session.channel(),
            config: self.config.clone(),
            errors: self.errors.clone(),
            interrupt,
        };
        participants.push(tokio::spawn(gateway.run(done_tx)));

        let result = match done_rx.await {
            Ok(result) => result,
            Err(_) => {
                self.errors.record(Error::Interrupted("gateway build"));
                HashMap::new()
            }
        };

        if !self.errors.is_empty() {
            return self.fail(interrupt_handle, participants).await;
        }

        // Status and control finish on their own; their handles are detached.
        drop(participants);
        tracing::info!(build_id = %self.id, "Build completed with {} result entries", result.len());
        Ok(result)
    }

    /// Interrupt every participant and turn the recorded errors into one error
    async fn fail(
        self,
        interrupt_handle: InterruptHandle,
        participants: Vec<JoinHandle<()>>,
    ) -> Result<HashMap<String, String>> {
        // Teardown interruptions recorded after this snapshot are not part of the outcome.
        let mut recorded = self.errors.take_all();

        interrupt_handle.interrupt();
        for participant in participants {
            let _ = participant.await;
        }
        for late in self.errors.take_all() {
            tracing::debug!(build_id = %self.id, "Ignoring error recorded during teardown: {}", late);
        }

        if let Some(pos) = recorded.iter().position(|e| matches!(e, Error::Protocol(_))) {
            let violation = recorded.swap_remove(pos);
            tracing::error!(build_id = %self.id, "Build aborted: {}", violation);
            return Err(violation);
        }

        tracing::error!(build_id = %self.id, "Build failed with {} error(s)", recorded.len());
        Err(Error::Build {
            build_id: self.id,
            errors: recorded,
        })
    }
}
