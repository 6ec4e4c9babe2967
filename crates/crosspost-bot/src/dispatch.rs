use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::event::{BotEvent, EventKind};

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: BotEvent) -> Result<()>;
}

/// Event kind → handler table consulted by the polling loop.
#[derive(Clone, Default)]
pub struct Dispatcher {
    table: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any earlier registration.
    pub fn on(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.table.insert(kind, handler);
        self
    }

    /// Returns `Ok(false)` when no handler is registered for the event's kind.
    pub async fn dispatch(&self, event: BotEvent) -> Result<bool> {
        let kind = event.kind();
        let Some(handler) = self.table.get(&kind) else {
            debug!(?kind, "no handler registered");
            return Ok(false);
        };

        handler.handle(event).await?;
        Ok(true)
    }
}
