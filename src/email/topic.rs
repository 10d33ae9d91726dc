use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::EmailEvent;

/// A published event together with the message id handed back to the publisher.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub message_id: String,
    pub event: EmailEvent,
}

/// Outbound queue for email events. `publish` returns once the event is
/// queued; delivery happens elsewhere.
#[async_trait]
pub trait EmailPublisher: Send + Sync {
    async fn publish(&self, event: EmailEvent) -> anyhow::Result<String>;
}

/// In-process topic backed by an unbounded channel.
#[derive(Clone)]
pub struct TopicPublisher {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl TopicPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EmailPublisher for TopicPublisher {
    async fn publish(&self, event: EmailEvent) -> anyhow::Result<String> {
        let message_id = Uuid::new_v4().to_string();
        let template = event.template;
        self.tx
            .send(Envelope {
                message_id: message_id.clone(),
                event,
            })
            .map_err(|_| anyhow::anyhow!("email topic is closed"))?;
        debug!(%message_id, ?template, "email event published");
        Ok(message_id)
    }
}
