//! Typed feeds over transport subscriptions.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{RpcTransport, SubscriptionStream};

/// A typed push feed opened by [`RpcClient::subscribe`](crate::client::RpcClient::subscribe).
///
/// Items arrive until [`unsubscribe`](Self::unsubscribe) is called or the
/// connection drops; either way [`next`](Self::next) then yields `None`.
/// Subscriptions are never re-established automatically.
pub struct Subscription<T> {
    id: String,
    transport: Arc<dyn RpcTransport>,
    receiver: Option<mpsc::UnboundedReceiver<Value>>,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Subscription<T> {
    pub(crate) fn new(transport: Arc<dyn RpcTransport>, stream: SubscriptionStream) -> Self {
        Self {
            id: stream.id,
            transport,
            receiver: Some(stream.receiver),
            _item: PhantomData,
        }
    }

    /// The id the node assigned.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }

    /// Next pushed item, decoded. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Result<T, TransportError>> {
        let value = self.receiver.as_mut()?.recv().await;
        match value {
            Some(value) => {
                Some(serde_json::from_value(value).map_err(TransportError::Deserialization))
            }
            None => {
                self.receiver = None;
                None
            }
        }
    }

    /// Cancel the subscription on the node and close the feed.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    pub async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        let Some(mut receiver) = self.receiver.take() else {
            return Ok(());
        };
        receiver.close();
        self.transport.unsubscribe(&self.id).await
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.receiver.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{JsonRpcRequest, JsonRpcResponse};
    use crate::types::EpochNotification;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        unsubscribes: AtomicU32,
    }

    #[async_trait]
    impl RpcTransport for CountingTransport {
        async fn send(&self, _req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Err(TransportError::Other("not used".into()))
        }
        async fn unsubscribe(&self, _id: &str) -> Result<(), TransportError> {
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn close(&self) {}
        fn url(&self) -> &str {
            "mock://"
        }
    }

    fn open(transport: Arc<CountingTransport>) -> (mpsc::UnboundedSender<Value>, Subscription<EpochNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::new(
            transport,
            SubscriptionStream {
                id: "0xab".into(),
                receiver: rx,
            },
        );
        (tx, sub)
    }

    #[tokio::test]
    async fn decodes_each_push() {
        let (tx, mut sub) = open(Arc::new(CountingTransport::default()));
        tx.send(serde_json::json!({ "epochNumber": "0x5", "epochHashesOrdered": [] }))
            .unwrap();
        tx.send(serde_json::json!({ "bogus": true })).unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap().epoch_number, 5);
        assert!(sub.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn dropped_connection_ends_feed() {
        let (tx, mut sub) = open(Arc::new(CountingTransport::default()));
        drop(tx);
        assert!(sub.next().await.is_none());
        assert!(sub.is_closed());
    }

    #[tokio::test]
    async fn unsubscribe_closes_exactly_once() {
        let transport = Arc::new(CountingTransport::default());
        let (tx, mut sub) = open(transport.clone());

        sub.unsubscribe().await.unwrap();
        sub.unsubscribe().await.unwrap();

        assert_eq!(transport.unsubscribes.load(Ordering::SeqCst), 1);
        assert!(tx.is_closed());
        assert!(sub.next().await.is_none());
    }
}
