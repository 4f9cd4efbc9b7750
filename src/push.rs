use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use crate::subs::SubscriptionStore;
use crate::types::Subscription;

/// Delivery failure for a single subscriber.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The push service reported the endpoint permanently gone (HTTP 410).
    #[error("subscription endpoint gone")]
    EndpointGone,
    #[error("push delivery failed: {0}")]
    Delivery(String),
}

/// Transport seam for Web Push delivery, so the dispatcher can be exercised
/// without a live push service.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, sub: &Subscription, payload: &[u8]) -> Result<(), PushError>;
}

/// Real transport: VAPID-signed Web Push over the subscriber's endpoint.
pub struct WebPushTransport {
    client: IsahcWebPushClient,
    vapid_private_key: String,
    subject: String,
}

impl WebPushTransport {
    pub fn new(vapid_private_key: String, subject: String) -> Result<Self> {
        Ok(Self {
            client: IsahcWebPushClient::new()?,
            vapid_private_key,
            subject,
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(&self, sub: &Subscription, payload: &[u8]) -> Result<(), PushError> {
        let info = SubscriptionInfo::new(&sub.endpoint, &sub.keys.p256dh, &sub.keys.auth);

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.vapid_private_key, web_push::URL_SAFE_NO_PAD, &info)
                .map_err(|e| PushError::Delivery(e.to_string()))?;
        signature.add_claim("sub", self.subject.as_str());
        let signature = signature
            .build()
            .map_err(|e| PushError::Delivery(e.to_string()))?;

        let mut message = WebPushMessageBuilder::new(&info);
        message.set_payload(ContentEncoding::Aes128Gcm, payload);
        message.set_vapid_signature(signature);
        let message = message
            .build()
            .map_err(|e| PushError::Delivery(e.to_string()))?;

        match self.client.send(message).await {
            Ok(()) => Ok(()),
            Err(WebPushError::EndpointNotFound { .. })
            | Err(WebPushError::EndpointNotValid { .. }) => Err(PushError::EndpointGone),
            Err(e) => Err(PushError::Delivery(e.to_string())),
        }
    }
}

/// Stand-in transport used when no VAPID key is configured. Every delivery
/// fails with a transient error so subscriptions are retained.
pub struct DisabledTransport;

#[async_trait]
impl PushTransport for DisabledTransport {
    async fn deliver(&self, _sub: &Subscription, _payload: &[u8]) -> Result<(), PushError> {
        Err(PushError::Delivery(
            "push transport not configured (missing VAPID key)".into(),
        ))
    }
}

/// Outcome of a fan-out send. An empty store is a normal soft outcome, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    NoRecipients,
    Sent {
        delivered: usize,
        pruned: usize,
        failed: usize,
    },
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    title: &'a str,
    body: &'a str,
    icon: &'a str,
}

/// Fans a message out to every subscription in the store. Deliveries run
/// concurrently and independently; a 410 from the push service prunes that
/// subscription, any other failure is logged and the subscription kept.
#[derive(Clone)]
pub struct Dispatcher {
    store: SubscriptionStore,
    transport: Arc<dyn PushTransport>,
    title: String,
    icon: String,
}

impl Dispatcher {
    pub fn new(store: SubscriptionStore, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            store,
            transport,
            title: "HomeDash Notification".into(),
            icon: "/icons/android-chrome-192x192.png".into(),
        }
    }

    pub async fn send_all(&self, message: &str) -> SendOutcome {
        let subs = self.store.snapshot().await;
        if subs.is_empty() {
            warn!("no subscriptions available to send notification to");
            return SendOutcome::NoRecipients;
        }

        let payload = serde_json::to_vec(&NotificationPayload {
            title: &self.title,
            body: message,
            icon: &self.icon,
        })
        .unwrap_or_else(|_| message.as_bytes().to_vec());
        let payload = Arc::new(payload);

        info!(subscribers = subs.len(), "sending notification");

        let mut set = JoinSet::new();
        for sub in subs {
            let transport = self.transport.clone();
            let payload = payload.clone();
            set.spawn(async move {
                let res = transport.deliver(&sub, &payload).await;
                (sub.endpoint, res)
            });
        }

        let mut delivered = 0usize;
        let mut pruned = 0usize;
        let mut failed = 0usize;
        while let Some(joined) = set.join_next().await {
            let Ok((endpoint, res)) = joined else {
                failed += 1;
                continue;
            };
            match res {
                Ok(()) => delivered += 1,
                Err(PushError::EndpointGone) => {
                    info!(%endpoint, "pruning gone subscription");
                    if let Err(e) = self.store.remove(&endpoint).await {
                        warn!(%endpoint, error = %e, "failed to prune subscription");
                    }
                    pruned += 1;
                }
                Err(PushError::Delivery(e)) => {
                    warn!(%endpoint, error = %e, "push delivery failed");
                    failed += 1;
                }
            }
        }

        SendOutcome::Sent {
            delivered,
            pruned,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubscriptionKeys;

    fn sub(endpoint: &str) -> Subscription {
        Subscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p".into(),
                auth: "a".into(),
            },
        }
    }

    /// Fails endpoints whose URL contains "gone" with a 410-equivalent error.
    struct FakeTransport;

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn deliver(&self, sub: &Subscription, _payload: &[u8]) -> Result<(), PushError> {
            if sub.endpoint.contains("gone") {
                Err(PushError::EndpointGone)
            } else if sub.endpoint.contains("flaky") {
                Err(PushError::Delivery("503 from push service".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn empty_store_is_soft_no_recipients() {
        let store = SubscriptionStore::in_memory();
        let dispatcher = Dispatcher::new(store, Arc::new(FakeTransport));
        assert_eq!(dispatcher.send_all("hi").await, SendOutcome::NoRecipients);
    }

    #[tokio::test]
    async fn gone_endpoint_is_pruned_others_survive() {
        let store = SubscriptionStore::in_memory();
        store.add(sub("https://push/gone")).await.unwrap();
        store.add(sub("https://push/ok")).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(FakeTransport));
        let outcome = dispatcher.send_all("container died").await;
        assert_eq!(
            outcome,
            SendOutcome::Sent {
                delivered: 1,
                pruned: 1,
                failed: 0
            }
        );

        let left = store.snapshot().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].endpoint, "https://push/ok");
    }

    #[tokio::test]
    async fn transient_failure_keeps_subscription() {
        let store = SubscriptionStore::in_memory();
        store.add(sub("https://push/flaky")).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(FakeTransport));
        let outcome = dispatcher.send_all("hello").await;
        assert_eq!(
            outcome,
            SendOutcome::Sent {
                delivered: 0,
                pruned: 0,
                failed: 1
            }
        );
        assert_eq!(store.len().await, 1);
    }
}
