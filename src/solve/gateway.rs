//! Frontend gateway exchange: capability negotiation, Dockerfile solve and result return

use std::collections::{BTreeMap, HashMap};

use tokio::sync::oneshot;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;

use crate::builder::{BuildConfig, DOCKERFILE_FRONTEND};
use crate::collector::{BuildErrors, Interrupt, StreamCollector};
use crate::error::{Error, Result};
use crate::proto::apicaps::ApiCap;
use crate::proto::frontend::llb_bridge_client::LlbBridgeClient;
use crate::proto::frontend::{self, PingRequest, PongResponse, ReturnRequest, SolveRequest};
use crate::vcs::VcsInfo;

/// Metadata key carrying the build id on every gateway call
pub const BUILD_REF_KEY: &str = "buildkit-control-ref";

/// Capabilities assumed when the engine lists none
pub const DEFAULT_CAPS: [&str; 4] = [
    "solve.base",
    "solve.inlinereturn",
    "resolveimage",
    "readfile",
];

const CAP_INLINE_RETURN: &str = "solve.inlinereturn";
const CAP_RETURN: &str = "return";
const CAP_REF_ARRAY: &str = "proto.refarray";

/// Attaches the build id to outgoing gateway requests
#[derive(Debug, Clone)]
pub struct BuildRefInterceptor {
    build_ref: MetadataValue<Ascii>,
}

impl BuildRefInterceptor {
    pub fn new(build_id: &str) -> Result<Self> {
        Ok(Self {
            build_ref: build_id.parse()?,
        })
    }
}

impl Interceptor for BuildRefInterceptor {
    fn call(
        &mut self,
        mut request: tonic::Request<()>,
    ) -> Result<tonic::Request<()>, tonic::Status> {
        request
            .metadata_mut()
            .insert(BUILD_REF_KEY, self.build_ref.clone());
        Ok(request)
    }
}

type GatewayClient = LlbBridgeClient<InterceptedService<Channel, BuildRefInterceptor>>;

/// Capabilities negotiated through ping/pong
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedCaps {
    /// Frontend API capabilities, id to enabled flag
    pub frontend: BTreeMap<String, bool>,
    /// LLB capabilities, kept for diagnostics only
    pub llb: BTreeMap<String, bool>,
    /// The pong listed no frontend capabilities and `DEFAULT_CAPS` was assumed
    pub defaulted: bool,
}

impl NegotiatedCaps {
    pub fn from_pong(pong: &PongResponse) -> Self {
        let defaulted = pong.frontend_api_caps.is_empty();
        let frontend = if defaulted {
            tracing::warn!(
                "Engine listed no frontend capabilities, assuming {:?}; {} is not among them",
                DEFAULT_CAPS,
                CAP_REF_ARRAY
            );
            DEFAULT_CAPS.iter().map(|id| (id.to_string(), true)).collect()
        } else {
            cap_map(&pong.frontend_api_caps)
        };
        Self {
            frontend,
            llb: cap_map(&pong.llb_caps),
            defaulted,
        }
    }

    pub fn supports(&self, id: &str) -> bool {
        self.frontend.get(id).copied().unwrap_or(false)
    }

    /// Whether the engine can hand back a result object
    pub fn allows_return(&self) -> bool {
        self.supports(CAP_INLINE_RETURN) || self.supports(CAP_RETURN)
    }

    /// Whether the engine can return several named results
    pub fn allows_ref_array(&self) -> bool {
        self.supports(CAP_REF_ARRAY)
    }
}

fn cap_map(caps: &[ApiCap]) -> BTreeMap<String, bool> {
    caps.iter().map(|cap| (cap.id.clone(), cap.enabled)).collect()
}

/// Drives the gateway side of one build
pub(crate) struct GatewayBuild {
    pub build_id: String,
    pub channel: Channel,
    pub config: BuildConfig,
    pub errors: BuildErrors,
    pub interrupt: Interrupt,
}

impl GatewayBuild {
    /// Run the exchange and always send the outcome through `done`
    ///
    /// The result map is empty unless every step succeeded.
    pub async fn run(self, done: oneshot::Sender<HashMap<String, String>>) {
        let errors = self.errors.clone();
        let result = match self.execute().await {
            Ok(Some(result)) => result,
            Ok(None) => HashMap::new(),
            Err(e) => {
                errors.record(e);
                HashMap::new()
            }
        };
        let _ = done.send(result);
    }

    /// `Ok(None)` means a step failed and its error is already recorded
    async fn execute(self) -> Result<Option<HashMap<String, String>>> {
        let vcs = VcsInfo::detect(&self.config.context_path).await;
        let frontend_opt = self.config.frontend_options(&vcs)?;
        let client = LlbBridgeClient::with_interceptor(
            self.channel.clone(),
            BuildRefInterceptor::new(&self.build_id)?,
        );

        let Some(caps) = self.negotiate(client.clone()).await? else {
            return Ok(None);
        };

        let request = SolveRequest {
            frontend: DOCKERFILE_FRONTEND.to_string(),
            frontend_opt,
            allow_result_return: caps.allows_return(),
            allow_result_array_ref: caps.allows_ref_array(),
            ..Default::default()
        };
        tracing::debug!(build_id = %self.build_id, "Gateway solve: {:?}", request.frontend_opt);

        let mut solver = client.clone();
        let solved = StreamCollector::unary(
            "gateway solve",
            self.errors.clone(),
            self.interrupt.clone(),
            async move { solver.solve(request).await },
        )
        .single()
        .await?;

        if !caps.allows_return() {
            return Err(Error::Protocol(format!(
                "engine does not support returning results (capabilities: {:?})",
                caps.frontend
            )));
        }
        if self.errors.is_empty() && !caps.allows_ref_array() {
            return Err(Error::Protocol(format!(
                "engine does not support result arrays (capabilities: {:?})",
                caps.frontend
            )));
        }

        let Some(solved) = solved else {
            return Ok(None);
        };
        if !self.errors.is_empty() {
            return Ok(None);
        }

        let result = solved
            .result
            .map(|r| {
                r.metadata
                    .into_iter()
                    .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        let mut returner = client;
        let request = ReturnRequest {
            result: Some(frontend::Result::default()),
            error: None,
        };
        let returned = StreamCollector::unary(
            "gateway return",
            self.errors.clone(),
            self.interrupt,
            async move { returner.r#return(request).await },
        )
        .single()
        .await?;

        Ok(returned.map(|_| result))
    }

    async fn negotiate(&self, mut client: GatewayClient) -> Result<Option<NegotiatedCaps>> {
        let pong = StreamCollector::unary(
            "gateway ping",
            self.errors.clone(),
            self.interrupt.clone(),
            async move { client.ping(PingRequest {}).await },
        )
        .single()
        .await?;

        Ok(pong.map(|pong| {
            let caps = NegotiatedCaps::from_pong(&pong);
            tracing::debug!(
                build_id = %self.build_id,
                "Negotiated frontend caps {:?}, llb caps {:?}",
                caps.frontend,
                caps.llb
            );
            caps
        }))
    }
}
