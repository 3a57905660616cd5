//! Common test utilities and fixtures
//!
//! [`FakeEngine`] stands in for a container engine: it answers the h2c upgrade on
//! any path, then serves the build RPCs over raw HTTP/2 frames with `h2`, the way
//! the engine's embedded BuildKit would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::future::{poll_fn, Future};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use h2::client::SendRequest;
use h2::server::SendResponse;
use h2::RecvStream;
use http::{HeaderMap, Request, Response, StatusCode};
use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use buildkit_tunnel::proto::apicaps::ApiCap;
use buildkit_tunnel::proto::frontend::{self, PongResponse, ReturnResponse};
use buildkit_tunnel::proto::{SolveResponse, StatusResponse, VertexWarning};
use buildkit_tunnel::session::dialer::{Dialer, TcpDialer};
use buildkit_tunnel::session::upgrade::Rewind;

/// Path of the raw echo service used to check relay fidelity
pub const ECHO_PATH: &str = "/test.Echo/Echo";

pub const CONTROL_STATUS: &str = "/moby.buildkit.v1.Control/Status";
pub const CONTROL_SOLVE: &str = "/moby.buildkit.v1.Control/Solve";
pub const GATEWAY_PING: &str = "/moby.buildkit.v1.frontend.LLBBridge/Ping";
pub const GATEWAY_SOLVE: &str = "/moby.buildkit.v1.frontend.LLBBridge/Solve";
pub const GATEWAY_RETURN: &str = "/moby.buildkit.v1.frontend.LLBBridge/Return";

/// How the fake engine answers
#[derive(Debug, Clone)]
pub struct EngineBehavior {
    /// Frontend capabilities listed in the pong
    pub frontend_caps: Vec<ApiCap>,
    /// Number of snapshots sent on the status stream
    pub status_payloads: usize,
    /// Warnings carried by each status snapshot
    pub status_warnings: usize,
    /// Answer `Return` with an INTERNAL status
    pub fail_return: bool,
    /// Answer the upgrade with `404 Not Found`
    pub reject_upgrade: bool,
    /// Metadata of the gateway solve result
    pub result_metadata: HashMap<String, Vec<u8>>,
    /// SETTINGS_MAX_CONCURRENT_STREAMS announced by the engine
    pub max_concurrent_streams: Option<u32>,
    /// Keep `Control.Status` and `Control.Solve` open until the client cancels them,
    /// the way a real engine does while a build is still running
    pub hold_control: bool,
}

impl Default for EngineBehavior {
    fn default() -> Self {
        Self {
            frontend_caps: vec![
                cap("solve.base"),
                cap("solve.inlinereturn"),
                cap("proto.refarray"),
            ],
            status_payloads: 1,
            status_warnings: 0,
            fail_return: false,
            reject_upgrade: false,
            result_metadata: [(
                "containerimage.digest".to_string(),
                b"sha256:feedface".to_vec(),
            )]
            .into_iter()
            .collect(),
            max_concurrent_streams: None,
            hold_control: false,
        }
    }
}

/// Enabled capability
pub fn cap(id: &str) -> ApiCap {
    ApiCap {
        id: id.to_string(),
        enabled: true,
        ..Default::default()
    }
}

/// One RPC as the engine received it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub headers: HeaderMap,
    /// Request message without the gRPC frame prefix
    pub payload: Bytes,
}

impl RecordedCall {
    pub fn decode<M: Message + Default>(&self) -> M {
        M::decode(self.payload.clone()).unwrap()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    calls: Mutex<Vec<RecordedCall>>,
    upgrade_requests: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// In-process engine listening on a loopback port
pub struct FakeEngine {
    addr: SocketAddr,
    state: Arc<EngineState>,
    task: JoinHandle<()>,
}

impl FakeEngine {
    pub async fn start(behavior: EngineBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(EngineState::default());
        let task = tokio::spawn(serve(listener, Arc::new(behavior), Arc::clone(&state)));
        Self { addr, state, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn dialer(&self) -> Arc<dyn Dialer> {
        Arc::new(TcpDialer::new(self.addr.to_string()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    /// Raw HTTP/1.1 request heads received on the upgrade path
    pub fn upgrade_requests(&self) -> Vec<String> {
        self.state.upgrade_requests.lock().unwrap().clone()
    }

    /// Connections that completed the upgrade and the HTTP/2 handshake
    pub fn opened_connections(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Upgraded connections that have since gone away
    pub fn closed_connections(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Held control streams the client reset
    pub fn cancelled_streams(&self) -> usize {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, behavior: Arc<EngineBehavior>, state: Arc<EngineState>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _)) = accepted else { continue };
                let behavior = Arc::clone(&behavior);
                let state = Arc::clone(&state);
                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, behavior, state).await {
                        eprintln!("fake engine connection failed: {e:#}");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    behavior: Arc<EngineBehavior>,
    state: Arc<EngineState>,
) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    state
        .upgrade_requests
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf[..head_end]).into_owned());

    if behavior.reject_upgrade {
        let body = "page not found\n";
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        return Ok(());
    }

    stream
        .write_all(b"HTTP/1.1 101 UPGRADED\r\nConnection: Upgrade\r\nUpgrade: h2c\r\n\r\n")
        .await?;

    let io = Rewind::new(Bytes::copy_from_slice(&buf[head_end..]), stream);
    let mut builder = h2::server::Builder::new();
    if let Some(max) = behavior.max_concurrent_streams {
        builder.max_concurrent_streams(max);
    }
    let mut conn = builder.handshake::<_, Bytes>(io).await?;
    state.opened.fetch_add(1, Ordering::SeqCst);

    let mut streams = JoinSet::new();
    while let Some(accepted) = conn.accept().await {
        let Ok((request, respond)) = accepted else { break };
        streams.spawn(handle_request(
            request,
            respond,
            Arc::clone(&behavior),
            Arc::clone(&state),
        ));
    }
    state.closed.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

async fn handle_request(
    request: Request<RecvStream>,
    respond: SendResponse<Bytes>,
    behavior: Arc<EngineBehavior>,
    state: Arc<EngineState>,
) {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    if path == ECHO_PATH {
        let _ = echo(parts.headers, body, respond).await;
        return;
    }

    let Ok(payload) = read_unary_request(body).await else {
        return;
    };
    state.calls.lock().unwrap().push(RecordedCall {
        path: path.clone(),
        headers: parts.headers,
        payload,
    });

    if behavior.hold_control && (path == CONTROL_STATUS || path == CONTROL_SOLVE) {
        hold_until_reset(respond, &state).await;
        return;
    }

    let replies: Result<Vec<Bytes>, (u16, &str)> = match path.as_str() {
        CONTROL_STATUS => Ok((0..behavior.status_payloads)
            .map(|_| encode(&status_snapshot(behavior.status_warnings)))
            .collect()),
        CONTROL_SOLVE => Ok(vec![encode(&SolveResponse::default())]),
        GATEWAY_PING => Ok(vec![encode(&PongResponse {
            frontend_api_caps: behavior.frontend_caps.clone(),
            llb_caps: vec![],
        })]),
        GATEWAY_SOLVE => Ok(vec![encode(&frontend::SolveResponse {
            r#ref: String::new(),
            result: Some(frontend::Result {
                metadata: behavior.result_metadata.clone(),
                result: None,
            }),
        })]),
        GATEWAY_RETURN if behavior.fail_return => Err((13, "return rejected")),
        GATEWAY_RETURN => Ok(vec![encode(&ReturnResponse {})]),
        _ => Err((12, "unimplemented")),
    };

    let _ = match replies {
        Ok(messages) => send_success_response(respond, messages),
        Err((code, message)) => send_error_response(respond, code, message),
    };
}

/// Answer with headers only and wait for the client to reset the stream
async fn hold_until_reset(mut respond: SendResponse<Bytes>, state: &EngineState) {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/grpc")
        .body(())
        .unwrap();
    let Ok(mut send_stream) = respond.send_response(response, false) else {
        return;
    };
    if poll_fn(|cx| send_stream.poll_reset(cx)).await.is_ok() {
        state.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

fn status_snapshot(warnings: usize) -> StatusResponse {
    StatusResponse {
        warnings: (0..warnings)
            .map(|i| VertexWarning {
                short: format!("warning {i}").into_bytes(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn encode<M: Message>(message: &M) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

/// Read complete request body for unary RPC, without the 5-byte gRPC prefix
async fn read_unary_request(mut body: RecvStream) -> Result<Bytes, h2::Error> {
    let mut data = BytesMut::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        data.extend_from_slice(&chunk);
        let _ = body.flow_control().release_capacity(chunk.len());
    }
    if data.len() < 5 {
        return Ok(Bytes::new());
    }
    Ok(data.freeze().slice(5..))
}

fn grpc_frame(message: &[u8]) -> Bytes {
    let mut framed = BytesMut::with_capacity(message.len() + 5);
    framed.put_u8(0);
    framed.put_u32(message.len() as u32);
    framed.extend_from_slice(message);
    framed.freeze()
}

fn send_success_response(
    mut respond: SendResponse<Bytes>,
    messages: Vec<Bytes>,
) -> Result<(), h2::Error> {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/grpc")
        .body(())
        .unwrap();
    let mut send_stream = respond.send_response(response, false)?;
    for message in messages {
        send_stream.send_data(grpc_frame(&message), false)?;
    }

    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", "0".parse().unwrap());
    send_stream.send_trailers(trailers)
}

fn send_error_response(
    mut respond: SendResponse<Bytes>,
    code: u16,
    message: &str,
) -> Result<(), h2::Error> {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/grpc")
        .header("grpc-status", code.to_string())
        .header("grpc-message", message)
        .body(())
        .unwrap();
    respond.send_response(response, true)?;
    Ok(())
}

/// Stream the request body back, reflecting `x-` headers as `echo-x-` and
/// forwarding the request trailers
async fn echo(
    headers: HeaderMap,
    mut body: RecvStream,
    mut respond: SendResponse<Bytes>,
) -> Result<(), h2::Error> {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/grpc");
    for (name, value) in headers.iter() {
        if name.as_str().starts_with("x-") {
            response = response.header(format!("echo-{}", name), value);
        }
    }
    let mut send_stream = respond.send_response(response.body(()).unwrap(), false)?;

    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        let len = chunk.len();
        send_stream.send_data(chunk, false)?;
        body.flow_control().release_capacity(len)?;
    }

    let mut trailers = body.trailers().await?.unwrap_or_default();
    trailers.insert("grpc-status", "0".parse().unwrap());
    send_stream.send_trailers(trailers)
}

/// Raw HTTP/2 client connection, driven on its own task
pub async fn h2_client(addr: SocketAddr) -> (SendRequest<Bytes>, JoinHandle<()>) {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let (send_request, connection) = h2::client::handshake(tcp).await.unwrap();
    let task = tokio::spawn(async move {
        let _ = connection.await;
    });
    (send_request, task)
}

/// Response of one echo exchange
#[derive(Debug)]
pub struct EchoReply {
    pub headers: HeaderMap,
    pub body: Bytes,
    pub trailers: Option<HeaderMap>,
}

/// Call the echo service through `send_request`
pub async fn echo_call(
    send_request: &SendRequest<Bytes>,
    headers: &[(&str, &str)],
    body: Bytes,
    trailers: Option<HeaderMap>,
) -> Result<EchoReply, h2::Error> {
    let mut request = Request::builder()
        .method("POST")
        .uri(format!("http://127.0.0.1{ECHO_PATH}"))
        .header("content-type", "application/grpc");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let mut ready = send_request.clone().ready().await?;
    let (response, mut stream) = ready.send_request(request.body(()).unwrap(), false)?;
    match trailers {
        Some(trailers) => {
            stream.send_data(body, false)?;
            stream.send_trailers(trailers)?;
        }
        None => stream.send_data(body, true)?,
    }

    let (parts, mut recv) = response.await?.into_parts();
    let mut data = BytesMut::new();
    while let Some(chunk) = recv.data().await {
        let chunk = chunk?;
        recv.flow_control().release_capacity(chunk.len())?;
        data.extend_from_slice(&chunk);
    }
    let trailers = recv.trailers().await?;

    Ok(EchoReply {
        headers: parts.headers,
        body: data.freeze(),
        trailers,
    })
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Create a build context holding a Dockerfile
pub fn create_test_context() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    create_test_dockerfile(dir.path(), None);
    dir
}

/// Create a simple test Dockerfile
pub fn create_test_dockerfile(dir: &Path, content: Option<&str>) -> PathBuf {
    let dockerfile = dir.join("Dockerfile");
    let default_content = r#"FROM alpine:latest
RUN echo "Hello from test Dockerfile"
CMD ["echo", "test"]
"#;
    fs::write(&dockerfile, content.unwrap_or(default_content)).unwrap();
    dockerfile
}

/// Create a test file with specific content
pub fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let file_path = dir.join(name);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();
    file_path
}
