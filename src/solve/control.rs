//! Control-plane solve registering the build with the engine

use tokio::sync::oneshot;
use tonic::transport::Channel;

use crate::collector::{BuildErrors, Interrupt, StreamCollector};
use crate::proto::control_client::ControlClient;
use crate::proto::{CacheOptions, SolveRequest};

pub(crate) struct ControlBuild {
    pub build_id: String,
    pub session_id: String,
    pub control: ControlClient<Channel>,
    pub errors: BuildErrors,
    pub interrupt: Interrupt,
}

impl ControlBuild {
    /// Issue the solve, open `started`, then wait for its single response
    pub async fn run(self, started: oneshot::Sender<()>) {
        let mut control = self.control;
        let request = SolveRequest {
            r#ref: self.build_id.clone(),
            cache: Some(CacheOptions::default()),
            // The engine drops the solve if no session is attached.
            session: self.session_id,
            ..Default::default()
        };
        let collector = StreamCollector::unary(
            "control solve",
            self.errors.clone(),
            self.interrupt,
            async move { control.solve(request).await },
        );
        let _ = started.send(());

        match collector.single().await {
            Ok(Some(response)) => {
                tracing::debug!(
                    build_id = %self.build_id,
                    "Control solve finished: {:?}",
                    response.exporter_response
                );
            }
            Ok(None) => {}
            Err(violation) => self.errors.record(violation),
        }
    }
}
