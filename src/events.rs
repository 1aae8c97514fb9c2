//! Domain events and the telemetry boundary.
//!
//! Services publish events after their writes commit; emission is
//! fire-and-forget and never feeds back into an operation's result. The
//! metrics collaborator subscribes here rather than being called directly,
//! so the core carries no global counter state of its own.

use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default depth of the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The events the storefront core can emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Cart events
    CartItemAdded { user_id: Uuid, product_id: Uuid },
    CartItemUpdated { user_id: Uuid, line_id: Uuid },
    CartItemRemoved { user_id: Uuid, line_id: Uuid },
    CartCleared(Uuid),

    // Order events
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        total: Decimal,
    },
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderDeleted(Uuid),
}

/// Sending half of the event channel, cloned into every service.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging (not propagating) failure.
    ///
    /// This is the emission path services use after commit: a full or closed
    /// channel must never fail an already-committed operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Creates a bounded event channel pair.
pub fn channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender::new(tx), rx)
}

/// Subscriber interface for event consumers (metrics, webhooks, audit).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Built-in subscriber translating domain events into `metrics` counters.
///
/// Counter names follow the telemetry contract: `user_registered` and
/// `order_placed` tagged with the order's status at creation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsRecorder;

#[async_trait]
impl EventHandler for MetricsRecorder {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::UserRegistered(_) => {
                counter!("user_registered", 1);
            }
            Event::OrderPlaced { .. } => {
                counter!("order_placed", 1, "status" => "pending");
            }
            Event::OrderCreated(_) => {
                counter!("order_placed", 1, "status" => "manual");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Drains the event channel, fanning each event out to every handler.
///
/// Runs until all senders are dropped. Handler failures are logged and do not
/// stop the loop or affect other handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Box<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                warn!("Event handler failed: event={:?}, error={}", event, e);
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}

/// Spawns [`process_events`] with the built-in metrics subscriber.
pub fn spawn_event_loop(rx: mpsc::Receiver<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(process_events(rx, vec![Box::new(MetricsRecorder)]))
}
