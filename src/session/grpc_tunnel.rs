//! gRPC tunneling relay using h2
//!
//! The engine only serves HTTP/1.1 on its single endpoint. The relay listens on a
//! local port and looks like a plain HTTP/2 gRPC server to tonic. Every accepted
//! client connection is paired with a fresh engine connection that has been
//! upgraded to h2c, and every HTTP/2 stream the client opens is mirrored onto a
//! stream of the paired engine connection.
//!
//! Stages per pairing, in order: dial, h2c upgrade, HTTP/2 handshakes on both
//! sides, stream multiplexing, per-stream copying. Connection-level frames
//! (SETTINGS, PING, GOAWAY, WINDOW_UPDATE) are handled by each side's own h2
//! connection and never cross the relay.
//!
//! When the engine side can't be opened, the client connection is still served:
//! each of its streams is answered with `UNAVAILABLE` and the dial or upgrade
//! diagnostic, then the connection is closed.

use std::collections::HashMap;
use std::future::poll_fn;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use bytes::Bytes;
use h2::server::SendResponse;
use h2::{client, server, Reason, RecvStream, SendStream};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, RwLock};
use tokio::task::{JoinHandle, JoinSet};

use super::dialer::{Dialer, EngineIo};
use super::upgrade::{self, Rewind};

/// Identifier of one client/engine connection pairing
pub type PairId = u64;

type UpstreamIo = Rewind<Box<dyn EngineIo>>;

/// One accepted client connection and its paired engine connection
#[derive(Debug)]
struct Pairing {
    client: SocketAddr,
    shutdown: oneshot::Sender<()>,
}

/// Table of live pairings, keyed by pair id
///
/// An entry is inserted as soon as the upgraded engine connection exists, before
/// the client handshake, and is removed when either side goes away. A pairing
/// whose engine side never opened has no entry.
#[derive(Debug, Clone, Default)]
struct PairingTable {
    pairs: Arc<RwLock<HashMap<PairId, Pairing>>>,
}

impl PairingTable {
    async fn insert(&self, id: PairId, pairing: Pairing) {
        self.pairs.write().await.insert(id, pairing);
    }

    async fn remove(&self, id: PairId) -> Option<Pairing> {
        self.pairs.write().await.remove(&id)
    }

    async fn drain(&self) -> Vec<(PairId, Pairing)> {
        self.pairs.write().await.drain().collect()
    }
}

/// Local HTTP/2 endpoint forwarding every gRPC stream to the engine
pub struct Relay {
    local_addr: SocketAddr,
    table: PairingTable,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Relay {
    /// Bind the relay on a loopback port and start accepting client connections
    pub async fn bind(
        dialer: Arc<dyn Dialer>,
        upgrade_path: impl Into<String>,
    ) -> crate::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        let table = PairingTable::default();
        let upgrade_path: String = upgrade_path.into();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            dialer,
            Arc::from(upgrade_path),
            table.clone(),
        ));

        tracing::info!("gRPC tunnel listening on {}", local_addr);

        Ok(Self {
            local_addr,
            table,
            accept_task: Mutex::new(Some(accept_task)),
            closed: AtomicBool::new(false),
        })
    }

    /// Address tonic should connect to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live client/engine pairings
    pub async fn active_pairs(&self) -> usize {
        self.table.pairs.read().await.len()
    }

    /// Ids of the live pairings
    pub async fn pair_ids(&self) -> Vec<PairId> {
        self.table.pairs.read().await.keys().copied().collect()
    }

    /// Whether a pairing is still live
    pub async fn contains(&self, id: PairId) -> bool {
        self.table.pairs.read().await.contains_key(&id)
    }

    /// Local address of the client side of a pairing
    pub async fn client_addr(&self, id: PairId) -> Option<SocketAddr> {
        self.table.pairs.read().await.get(&id).map(|p| p.client)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the listener and every pairing. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let task = self
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            // Dropping the accept loop drops the listener and aborts every pairing task.
            let _ = task.await;
        }

        for (id, pairing) in self.table.drain().await {
            let _ = pairing.shutdown.send(());
            tracing::debug!(pair = id, "Closed pairing for {}", pairing.client);
        }

        tracing::info!("gRPC tunnel on {} closed", self.local_addr);
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        let task = self
            .accept_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("local_addr", &self.local_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn accept_loop(
    listener: TcpListener,
    dialer: Arc<dyn Dialer>,
    upgrade_path: Arc<str>,
    table: PairingTable,
) {
    let mut pairings = JoinSet::new();
    let mut next_id: PairId = 0;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    let _ = stream.set_nodelay(true);
                    pairings.spawn(pair_connection(
                        next_id,
                        stream,
                        peer,
                        Arc::clone(&dialer),
                        Arc::clone(&upgrade_path),
                        table.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!("Failed to accept tunnel connection: {}", e);
                    tokio::task::yield_now().await;
                }
            },
            Some(_) = pairings.join_next(), if !pairings.is_empty() => {}
        }
    }
}

/// Dial the engine and promote the connection to HTTP/2
async fn connect_upstream(
    dialer: &dyn Dialer,
    upgrade_path: &str,
) -> crate::Result<(client::SendRequest<Bytes>, client::Connection<UpstreamIo, Bytes>)> {
    let io = dialer.dial().await.map_err(crate::Error::Dial)?;
    let upgraded = upgrade::upgrade(io, &dialer.host(), upgrade_path).await?;
    let (send_request, connection) = client::handshake(upgraded)
        .await
        .map_err(|e| crate::Error::Protocol(format!("HTTP/2 handshake with engine failed: {e}")))?;
    Ok((send_request, connection))
}

async fn pair_connection(
    id: PairId,
    client_io: TcpStream,
    peer: SocketAddr,
    dialer: Arc<dyn Dialer>,
    upgrade_path: Arc<str>,
    table: PairingTable,
) {
    // Nothing is read from the client until the engine side is ready.
    let (send_request, upstream_conn) = match connect_upstream(&*dialer, &upgrade_path).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(pair = id, "Failed to open engine connection for {}: {}", peer, e);
            refuse_connection(id, client_io, peer, &e).await;
            return;
        }
    };

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    table
        .insert(
            id,
            Pairing {
                client: peer,
                shutdown: shutdown_tx,
            },
        )
        .await;

    let mut client_conn = match server::handshake(client_io).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(pair = id, "HTTP/2 handshake with {} failed: {}", peer, e);
            table.remove(id).await;
            return;
        }
    };
    tracing::info!(pair = id, "Paired tunnel client {} with engine {}", peer, dialer.host());

    let mut streams = JoinSet::new();
    tokio::pin!(upstream_conn);

    loop {
        tokio::select! {
            accepted = client_conn.accept() => match accepted {
                Some(Ok((request, respond))) => {
                    let upstream = send_request.clone();
                    streams.spawn(async move {
                        if let Err(e) = relay_stream(request, respond, upstream).await {
                            tracing::debug!("Tunneled stream ended with error: {:#}", e);
                        }
                    });
                }
                Some(Err(e)) => {
                    tracing::debug!(pair = id, "Client connection error: {}", e);
                    break;
                }
                None => break,
            },
            result = &mut upstream_conn => {
                if let Err(e) = result {
                    tracing::debug!(pair = id, "Engine connection error: {}", e);
                }
                break;
            }
            _ = &mut shutdown_rx => break,
            Some(_) = streams.join_next(), if !streams.is_empty() => {}
        }
    }

    table.remove(id).await;
    streams.abort_all();
    tracing::info!(pair = id, "Tunnel pairing for {} closed", peer);
    // Both connections are dropped here, closing whichever side is still open.
}

/// Serve a client connection whose engine side could not be opened
///
/// Every stream gets a trailers-only `UNAVAILABLE` answer carrying the dial or
/// upgrade diagnostic. The connection is shut down after the first answer, so the
/// client's next connection is paired afresh.
async fn refuse_connection(
    id: PairId,
    client_io: TcpStream,
    peer: SocketAddr,
    cause: &crate::Error,
) {
    let status = tonic::Status::unavailable(cause.to_string());
    let mut grpc_headers = http::HeaderMap::new();
    match status.add_header(&mut grpc_headers) {
        Ok(()) => {}
        Err(e) => {
            tracing::warn!(pair = id, "Cannot encode diagnostic for {}: {}", peer, e.message());
            return;
        }
    }

    let mut client_conn = match server::handshake(client_io).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(pair = id, "HTTP/2 handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let mut drains = JoinSet::new();
    let mut refused = 0usize;
    while let Some(accepted) = client_conn.accept().await {
        let Ok((request, mut respond)) = accepted else { break };

        let mut response = Response::new(());
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
        headers.extend(grpc_headers.clone());
        if let Err(e) = respond.send_response(response, true) {
            tracing::debug!(pair = id, "Failed to refuse stream from {}: {}", peer, e);
        }

        // Read the request to its end so the stream closes without a reset.
        let mut body = request.into_body();
        drains.spawn(async move {
            while let Some(Ok(chunk)) = body.data().await {
                let _ = body.flow_control().release_capacity(chunk.len());
            }
        });

        if refused == 0 {
            client_conn.graceful_shutdown();
        }
        refused += 1;
    }

    tracing::debug!(pair = id, "Refused {} stream(s) from {}", refused, peer);
}

/// Mirror one client stream onto a new engine stream
async fn relay_stream(
    request: Request<RecvStream>,
    mut respond: SendResponse<Bytes>,
    upstream: client::SendRequest<Bytes>,
) -> Result<()> {
    let (parts, client_body) = request.into_parts();
    tracing::debug!("Tunneling {}", parts.uri.path());

    let request_done = client_body.is_end_stream();
    let mut upstream = upstream.ready().await.context("Engine connection not ready")?;
    let (response, upstream_body) = upstream
        .send_request(Request::from_parts(parts, ()), request_done)
        .context("Failed to open engine stream")?;

    let request_pump = async move {
        if !request_done {
            pump(client_body, upstream_body).await.context("request body")?;
        }
        Ok::<_, anyhow::Error>(())
    };

    let response_pump = async move {
        let response = tokio::select! {
            response = response => response,
            reset = poll_fn(|cx| respond.poll_reset(cx)) => {
                let reason = reset.context("client stream")?;
                anyhow::bail!("client reset the stream ({reason:?}) before the engine answered");
            }
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                respond.send_reset(e.reason().unwrap_or(Reason::CANCEL));
                return Err(anyhow::Error::new(e).context("engine response"));
            }
        };
        let (parts, engine_body) = response.into_parts();
        let response_done = engine_body.is_end_stream();
        let client_body = respond
            .send_response(Response::from_parts(parts, ()), response_done)
            .context("Failed to send response headers")?;
        if !response_done {
            pump(engine_body, client_body).await.context("response body")?;
        }
        Ok(())
    };

    tokio::try_join!(request_pump, response_pump)?;
    Ok(())
}

/// Copy DATA frames and trailers from one stream to another
///
/// Capacity is only released on the source once the bytes were handed to the
/// destination, so flow control propagates across the relay. A reset of the
/// destination ends the copy; dropping `from` then cancels the source stream.
async fn pump(mut from: RecvStream, mut to: SendStream<Bytes>) -> Result<(), h2::Error> {
    loop {
        let chunk = tokio::select! {
            chunk = from.data() => chunk,
            reset = poll_fn(|cx| to.poll_reset(cx)) => return Err(reset?.into()),
        };
        let Some(chunk) = chunk else { break };
        let mut chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                to.send_reset(e.reason().unwrap_or(Reason::CANCEL));
                return Err(e);
            }
        };
        let len = chunk.len();

        while !chunk.is_empty() {
            to.reserve_capacity(chunk.len());
            let granted = match poll_fn(|cx| to.poll_capacity(cx)).await {
                Some(granted) => granted?,
                None => return Err(Reason::STREAM_CLOSED.into()),
            };
            if granted == 0 {
                continue;
            }
            let part = chunk.split_to(granted.min(chunk.len()));
            to.send_data(part, false)?;
        }

        from.flow_control().release_capacity(len)?;
    }

    match from.trailers().await {
        Ok(Some(trailers)) => to.send_trailers(trailers)?,
        Ok(None) => to.send_data(Bytes::new(), true)?,
        Err(e) => {
            to.send_reset(e.reason().unwrap_or(Reason::CANCEL));
            return Err(e);
        }
    }
    Ok(())
}
