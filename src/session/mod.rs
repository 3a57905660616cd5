//! BuildKit session: the tunneled gRPC transport and the builds minted on it

pub mod dialer;
pub mod grpc_tunnel;
pub mod upgrade;

use std::path::PathBuf;
use std::sync::Arc;

use tonic::transport::{Channel, Endpoint};
use uuid::Uuid;

use crate::builder::BuildConfig;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::proto::control_client::ControlClient;
use crate::solve::Build;
use dialer::Dialer;
use grpc_tunnel::Relay;

/// gRPC transport bound to a running relay
///
/// tonic talks plain HTTP/2 to the relay's loopback address; the relay carries
/// every stream to the engine through an h2c-upgraded connection.
#[derive(Debug)]
pub struct GrpcTransport {
    relay: Relay,
    channel: Channel,
}

impl GrpcTransport {
    /// Start a relay towards the engine described by `config`
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        Self::start(config.dialer()?, config.upgrade_path.clone()).await
    }

    /// Start a relay using an explicit dialer
    pub async fn start(dialer: Arc<dyn Dialer>, upgrade_path: impl Into<String>) -> Result<Self> {
        let relay = Relay::bind(dialer, upgrade_path).await?;
        // The first RPC opens the client connection, which the relay then pairs.
        let channel = Endpoint::from_shared(format!("http://{}", relay.local_addr()))?
            .connect_lazy();

        Ok(Self { relay, channel })
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Lazily connected channel to the relay
    ///
    /// Once the transport is closed, calls on this channel and its clones fail.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Tear down the relay and every pairing. Safe to call more than once.
    pub async fn close(&self) {
        self.relay.close().await;
    }
}

/// Session manager for BuildKit
///
/// A session owns one transport and is shared read-only by every build it
/// creates. Cloning is cheap; all clones refer to the same transport.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    transport: Arc<GrpcTransport>,
    control: ControlClient<Channel>,
}

impl Session {
    /// Create a new session on top of a transport
    pub fn create(transport: GrpcTransport) -> Self {
        let id = Uuid::new_v4().to_string();
        let control = ControlClient::new(transport.channel());
        tracing::info!("Created session {} via {}", id, transport.relay().local_addr());

        Self {
            id,
            transport: Arc::new(transport),
            control,
        }
    }

    /// Connect to the engine from `config` and open a session on it
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        Ok(Self::create(GrpcTransport::connect(config).await?))
    }

    /// Session ID sent with the control solve
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Control-plane client bound to the session's transport
    ///
    /// Unusable after [`Session::close`]; the underlying channel keeps pointing at
    /// the closed relay.
    pub fn control(&self) -> ControlClient<Channel> {
        self.control.clone()
    }

    pub fn channel(&self) -> Channel {
        self.transport.channel()
    }

    pub fn transport(&self) -> &GrpcTransport {
        &self.transport
    }

    /// Create a build of `dockerfile` within `context`
    pub fn create_build(
        &self,
        context: impl Into<PathBuf>,
        dockerfile: impl Into<PathBuf>,
    ) -> Build {
        self.build(BuildConfig::local(context).dockerfile(dockerfile))
    }

    /// Create a build from a prepared configuration
    pub fn build(&self, config: BuildConfig) -> Build {
        Build::new(self.clone(), config)
    }

    /// Close the transport. Builds still holding the session fail their RPCs.
    ///
    /// The session can't be reopened: `control()` and `channel()` on a closed
    /// session only produce failing calls.
    pub async fn close(&self) {
        tracing::info!("Closing session {}", self.id);
        self.transport.close().await;
    }
}
