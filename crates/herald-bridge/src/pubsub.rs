//! Pub/sub transport abstraction

use bytes::Bytes;
use tokio::sync::mpsc;

use herald_core::HeraldResult;

/// Subject that receives every published message
pub const ALL_SUBJECT: &str = "*";

/// A message delivered by the pub/sub fabric
#[derive(Clone, Debug)]
pub struct BridgeMessage {
    /// Subject the message was published on (an event tag name)
    pub subject: String,
    /// Raw JSON payload
    pub payload: Bytes,
}

impl BridgeMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        BridgeMessage {
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

/// Receiving end of a subscription
pub type MessageReceiver = mpsc::Receiver<BridgeMessage>;

/// Sending end held by the fabric
pub type MessageSender = mpsc::Sender<BridgeMessage>;

/// A live queue-group subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    queue: String,
    receiver: MessageReceiver,
}

impl Subscription {
    pub fn new(subject: impl Into<String>, queue: impl Into<String>, receiver: MessageReceiver) -> Self {
        Subscription {
            subject: subject.into(),
            queue: queue.into(),
            receiver,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Is this the all-subjects subscription?
    pub fn is_wildcard(&self) -> bool {
        self.subject == ALL_SUBJECT
    }

    /// Wait for the next message; `None` once the fabric closed the subscription
    pub async fn next(&mut self) -> Option<BridgeMessage> {
        self.receiver.recv().await
    }

    pub fn into_receiver(self) -> MessageReceiver {
        self.receiver
    }
}

/// A distributed pub/sub fabric with queue groups
///
/// Within one queue group each message goes to exactly one member, so
/// several processes sharing a group split the stream between them.
pub trait PubSub: Send + Sync {
    fn queue_subscribe(&self, subject: &str, queue: &str) -> HeraldResult<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_yields_then_closes() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new("READY", "workers", rx);

        tx.send(BridgeMessage::new("READY", "{}")).await.unwrap();
        drop(tx);

        let msg = sub.next().await.unwrap();
        assert_eq!(msg.subject, "READY");
        assert_eq!(&msg.payload[..], b"{}");
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn test_wildcard_subscription() {
        let (_tx, rx) = mpsc::channel(1);
        let sub = Subscription::new(ALL_SUBJECT, "workers", rx);
        assert!(sub.is_wildcard());
        assert_eq!(sub.queue(), "workers");
    }
}
