//! Broadcast channel for lifecycle notifications
//!
//! The server manager and remote clients publish [`DomainEvent`]s through an
//! [`EventSender`]. Consumers subscribe explicitly, either to everything or to
//! a single user's connections, and see every event published afterwards.
//!
//! ```ignore
//! let bus = EventBus::new();
//! let manager = ServerManager::new(deps, bus.sender());
//!
//! let mut rx = bus.subscribe_user("alice");
//! while let Some(event) = rx.recv().await { ... }
//! ```

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::DomainEvent;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Slow receivers lose the oldest events once `capacity` is exceeded.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Receive every event, for all users.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            user_id: None,
        }
    }

    /// Receive only events about `user_id`'s connections and credentials.
    pub fn subscribe_user(&self, user_id: impl Into<String>) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            user_id: Some(user_id.into()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishing half, cloned into the manager and every remote client.
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventSender {
    /// Sender with no bus behind it; events go nowhere.
    pub fn detached() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers got it.
    pub fn emit(&self, event: DomainEvent) -> usize {
        let (kind, server_id) = (event.type_name(), event.server_id().to_string());
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!(event = kind, server_id = %server_id, delivered, "[EventBus] Published");
        delivered
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    user_id: Option<String>,
}

impl EventReceiver {
    fn wants(&self, event: &DomainEvent) -> bool {
        self.user_id.as_deref().map_or(true, |user| event.user_id() == user)
    }

    /// Next matching event; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "[EventBus] Subscriber fell behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "[EventBus] Subscriber fell behind");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}
