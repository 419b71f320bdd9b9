//! WebSocket JSON-RPC transport with request multiplexing and push
//! subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use cfxrpc_core::error::TransportError;
use cfxrpc_core::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use cfxrpc_core::transport::{RpcTransport, SubscriptionStream};

use crate::subscriptions::{SubscriptionId, SubscriptionManager};

type ResponseSender = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Bound on the opening handshake.
    pub connect_timeout: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// What to do with the answer to a request, keyed by its wire id.
enum Waiter {
    /// Hand the response back with the caller's own id restored.
    Call { caller_id: RpcId, tx: ResponseSender },
    /// Register the returned subscription id before any push for it can be
    /// processed.
    Subscribe {
        tx: oneshot::Sender<Result<SubscriptionStream, TransportError>>,
    },
}

impl Waiter {
    /// The caller stopped waiting, e.g. on a request timeout.
    fn is_abandoned(&self) -> bool {
        match self {
            Self::Call { tx, .. } => tx.is_closed(),
            Self::Subscribe { tx } => tx.is_closed(),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send {
        frame: String,
        waiters: Vec<(u64, Waiter)>,
    },
    Close,
}

/// WebSocket endpoint for one node.
///
/// A background task owns the socket. Callers' request ids are replaced with
/// connection-unique wire ids so concurrent callers never collide, and are
/// restored on the way back. There is no reconnect: when the socket drops,
/// pending calls fail and every subscription feed ends.
pub struct WsTransport {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    next_wire_id: AtomicU64,
    closed: AtomicBool,
}

impl WsTransport {
    /// Connect to `url` and start the background task.
    pub async fn connect(
        url: impl Into<String>,
        config: WsClientConfig,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        tracing::info!(url = %url, "connecting via WebSocket");
        let (ws_stream, _) =
            tokio::time::timeout(config.connect_timeout, tokio_tungstenite::connect_async(&url))
                .await
                .map_err(|_| TransportError::Timeout {
                    ms: config.connect_timeout.as_millis() as u64,
                })?
                .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionManager::new();
        tokio::spawn(ws_task(url.clone(), ws_stream, cmd_rx, subscriptions.clone()));

        Ok(Self {
            url,
            cmd_tx,
            subscriptions,
            next_wire_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of subscriptions currently delivering.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    fn wire_id(&self) -> u64 {
        self.next_wire_id.fetch_add(1, Ordering::Relaxed)
    }

    fn dispatch(&self, frame: String, waiters: Vec<(u64, Waiter)>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.cmd_tx
            .send(WsCommand::Send { frame, waiters })
            .map_err(|_| TransportError::WebSocket("connection closed".into()))
    }

    /// Re-key `req` with a wire id, returning the frame-ready request.
    fn rekey(&self, mut req: JsonRpcRequest) -> (u64, RpcId, JsonRpcRequest) {
        let wire_id = self.wire_id();
        let caller_id = std::mem::replace(&mut req.id, RpcId::Number(wire_id));
        (wire_id, caller_id, req)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

async fn await_response(
    rx: oneshot::Receiver<Result<JsonRpcResponse, TransportError>>,
) -> Result<JsonRpcResponse, TransportError> {
    rx.await
        .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let (wire_id, caller_id, req) = self.rekey(req);
        let frame = serde_json::to_string(&req)?;
        let (tx, rx) = oneshot::channel();
        self.dispatch(frame, vec![(wire_id, Waiter::Call { caller_id, tx })])?;
        await_response(rx).await
    }

    /// Sent as one JSON array frame; answers are routed individually.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let mut wire = Vec::with_capacity(reqs.len());
        let mut waiters = Vec::with_capacity(reqs.len());
        let mut receivers = Vec::with_capacity(reqs.len());
        for req in reqs {
            let (wire_id, caller_id, req) = self.rekey(req);
            let (tx, rx) = oneshot::channel();
            wire.push(req);
            waiters.push((wire_id, Waiter::Call { caller_id, tx }));
            receivers.push(rx);
        }
        self.dispatch(serde_json::to_string(&wire)?, waiters)?;

        futures::future::join_all(receivers.into_iter().map(await_response))
            .await
            .into_iter()
            .collect()
    }

    async fn subscribe(&self, params: Vec<Value>) -> Result<SubscriptionStream, TransportError> {
        let wire_id = self.wire_id();
        let frame = serde_json::to_string(&JsonRpcRequest::new(wire_id, "cfx_subscribe", params))?;
        let (tx, rx) = oneshot::channel();
        self.dispatch(frame, vec![(wire_id, Waiter::Subscribe { tx })])?;
        rx.await
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    async fn unsubscribe(&self, id: &str) -> Result<(), TransportError> {
        self.subscriptions.remove(&SubscriptionId(id.to_string()));
        let resp = self
            .send(JsonRpcRequest::new(
                0,
                "cfx_unsubscribe",
                vec![Value::String(id.to_string())],
            ))
            .await?;
        resp.into_result().map_err(TransportError::Rpc)?;
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.cmd_tx.send(WsCommand::Close);
            tracing::debug!(url = %self.url, "ws transport closed");
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task<S>(
    url: String,
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    subscriptions: SubscriptionManager,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let mut pending: HashMap<u64, Waiter> = HashMap::new();
    let (mut sink, mut stream) = ws_stream.split();

    let closed_by_caller = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(WsCommand::Close) => break true,
                    Some(WsCommand::Send { frame, waiters }) => {
                        prune_abandoned(&mut pending);
                        pending.extend(waiters);
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            tracing::warn!(error = %e, url = %url, "WS send failed");
                            break false;
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break false,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, url = %url, "WS receive error");
                        break false;
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_message(text.as_str(), &mut pending, &subscriptions);
                    }
                    Some(Ok(Message::Close(_))) => break false,
                    _ => {}
                }
            }
        }
    };

    if closed_by_caller {
        let _ = sink.send(Message::Close(None)).await;
    } else {
        tracing::warn!(url = %url, "WS disconnected");
    }
    subscriptions.clear();
    for (_, waiter) in pending.drain() {
        let err = || {
            if closed_by_caller {
                TransportError::Closed
            } else {
                TransportError::WebSocket("connection closed".into())
            }
        };
        match waiter {
            Waiter::Call { tx, .. } => {
                let _ = tx.send(Err(err()));
            }
            Waiter::Subscribe { tx } => {
                let _ = tx.send(Err(err()));
            }
        }
    }
}

/// Forget requests nobody waits for any more. A late answer to one of them
/// is then ignored like any unknown id.
fn prune_abandoned(pending: &mut HashMap<u64, Waiter>) {
    let before = pending.len();
    pending.retain(|_, waiter| !waiter.is_abandoned());
    let dropped = before - pending.len();
    if dropped > 0 {
        tracing::debug!(dropped, "dropped abandoned WS requests");
    }
}

fn handle_message(text: &str, pending: &mut HashMap<u64, Waiter>, subscriptions: &SubscriptionManager) {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return;
    };

    match val {
        Value::Array(items) => {
            for item in items {
                route(item, pending, subscriptions);
            }
        }
        item => route(item, pending, subscriptions),
    }
}

fn route(val: Value, pending: &mut HashMap<u64, Waiter>, subscriptions: &SubscriptionManager) {
    if val.get("method").and_then(|m| m.as_str()) == Some("cfx_subscription") {
        if let Some(params) = val.get("params") {
            if let Some(id) = params["subscription"].as_str() {
                subscriptions.dispatch(&SubscriptionId(id.to_string()), params["result"].clone());
            }
        }
        return;
    }

    let Ok(mut resp) = serde_json::from_value::<JsonRpcResponse>(val) else {
        tracing::debug!("unrecognised WS message");
        return;
    };
    let Some(waiter) = resp.id.as_u64().and_then(|id| pending.remove(&id)) else {
        tracing::debug!(id = %resp.id, "response for unknown request");
        return;
    };
    match waiter {
        Waiter::Call { caller_id, tx } => {
            resp.id = caller_id;
            let _ = tx.send(Ok(resp));
        }
        Waiter::Subscribe { tx } => {
            let opened = resp
                .into_result()
                .map_err(TransportError::Rpc)
                .and_then(|v| serde_json::from_value::<String>(v).map_err(TransportError::from))
                .map(|id| SubscriptionStream {
                    receiver: subscriptions.register(SubscriptionId(id.clone())),
                    id,
                });
            let _ = tx.send(opened);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Minimal node: answers every call with its method name, opens
    /// subscription `0xsub` and pushes two epochs after it, and hangs up on
    /// `hangup`.
    async fn serve() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                return;
            };
            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else { continue };
                let req: Value = serde_json::from_str(text.as_str()).unwrap();
                let answer = |r: &Value| {
                    let result = match r["method"].as_str() {
                        Some("cfx_subscribe") => Value::from("0xsub"),
                        Some("cfx_unsubscribe") => Value::Bool(true),
                        Some(m) => Value::from(m),
                        None => Value::Null,
                    };
                    serde_json::json!({ "jsonrpc": "2.0", "id": r["id"], "result": result })
                };
                let reply = match &req {
                    Value::Array(items) => {
                        Value::Array(items.iter().rev().map(answer).collect())
                    }
                    single => answer(single),
                };
                if req["method"] == "hangup" {
                    return;
                }
                if req["method"] == "silent" {
                    continue;
                }
                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                if req["method"] == "cfx_subscribe" {
                    for n in 1..=2 {
                        let push = serde_json::json!({
                            "jsonrpc": "2.0",
                            "method": "cfx_subscription",
                            "params": {
                                "subscription": "0xsub",
                                "result": { "epochNumber": format!("{n:#x}"), "epochHashesOrdered": [] }
                            }
                        });
                        ws.send(Message::Text(push.to_string().into())).await.unwrap();
                    }
                }
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn caller_ids_are_restored() {
        let transport = WsTransport::connect(serve().await, WsClientConfig::default())
            .await
            .unwrap();
        let resp = transport
            .send(JsonRpcRequest::new(42, "cfx_epochNumber", vec![]))
            .await
            .unwrap();
        assert_eq!(resp.id, RpcId::Number(42));
        assert_eq!(resp.into_result().unwrap(), "cfx_epochNumber");
    }

    #[tokio::test]
    async fn batch_answers_are_routed_individually() {
        let transport = WsTransport::connect(serve().await, WsClientConfig::default())
            .await
            .unwrap();
        let responses = transport
            .send_batch(vec![
                JsonRpcRequest::new(1, "cfx_gasPrice", vec![]),
                JsonRpcRequest::new(1, "cfx_epochNumber", vec![]),
            ])
            .await
            .unwrap();
        assert_eq!(responses[0].result, Some(Value::from("cfx_gasPrice")));
        assert_eq!(responses[1].result, Some(Value::from("cfx_epochNumber")));
    }

    #[tokio::test]
    async fn subscription_receives_pushes_until_unsubscribed() {
        let transport = WsTransport::connect(serve().await, WsClientConfig::default())
            .await
            .unwrap();
        let mut stream = transport
            .subscribe(vec![Value::from("epochs")])
            .await
            .unwrap();
        assert_eq!(stream.id, "0xsub");

        let first = stream.receiver.recv().await.unwrap();
        let second = stream.receiver.recv().await.unwrap();
        assert_eq!(first["epochNumber"], "0x1");
        assert_eq!(second["epochNumber"], "0x2");

        transport.unsubscribe(&stream.id).await.unwrap();
        assert_eq!(transport.active_subscriptions(), 0);
        assert!(stream.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn hangup_fails_pending_and_ends_feeds() {
        let transport = WsTransport::connect(serve().await, WsClientConfig::default())
            .await
            .unwrap();
        let mut stream = transport
            .subscribe(vec![Value::from("newHeads")])
            .await
            .unwrap();

        let err = transport
            .send(JsonRpcRequest::new(1, "hangup", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)));

        // pushes sent before the hangup may still be queued
        while stream.receiver.recv().await.is_some() {}
        assert_eq!(transport.active_subscriptions(), 0);
    }

    #[test]
    fn abandoned_requests_are_pruned() {
        let mut pending = HashMap::new();
        let (live_tx, _live_rx) = oneshot::channel();
        let (gone_tx, gone_rx) = oneshot::channel();
        let (sub_tx, sub_rx) = oneshot::channel();
        pending.insert(1, Waiter::Call { caller_id: RpcId::Number(1), tx: live_tx });
        pending.insert(2, Waiter::Call { caller_id: RpcId::Number(2), tx: gone_tx });
        pending.insert(3, Waiter::Subscribe { tx: sub_tx });
        drop(gone_rx);
        drop(sub_rx);

        prune_abandoned(&mut pending);

        assert_eq!(pending.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn unanswered_request_does_not_block_later_calls() {
        let transport = WsTransport::connect(serve().await, WsClientConfig::default())
            .await
            .unwrap();
        for id in 0..3 {
            let silent = transport.send(JsonRpcRequest::new(id, "silent", vec![]));
            assert!(tokio::time::timeout(Duration::from_millis(20), silent).await.is_err());
        }
        let resp = transport
            .send(JsonRpcRequest::new(9, "cfx_epochNumber", vec![]))
            .await
            .unwrap();
        assert_eq!(resp.into_result().unwrap(), "cfx_epochNumber");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let transport = WsTransport::connect(serve().await, WsClientConfig::default())
            .await
            .unwrap();
        transport.close().await;
        transport.close().await;
        let err = transport
            .send(JsonRpcRequest::new(1, "cfx_epochNumber", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = WsTransport::connect(format!("ws://127.0.0.1:{port}"), WsClientConfig::default()).await;
        assert!(matches!(result, Err(TransportError::WebSocket(_))));
    }
}
