use std::sync::Arc;

use tracing::{debug, info};

use crosspost_db::Store;

use crate::{Clock, Result};

/// One inbound channel message or edit, reduced to what ingestion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPost {
    pub channel_id: i64,
    pub message_id: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
}

impl ChannelPost {
    /// Text when present, otherwise the media caption. Empty strings count as absent.
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.caption.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    /// Already queued from an earlier delivery of the same message.
    Duplicate,
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoContent,
    UnlinkedChannel,
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Queue `post` as pending if it comes from a bound channel. Safe to call
    /// repeatedly for the same message.
    pub fn ingest(&self, post: &ChannelPost) -> Result<IngestOutcome> {
        let Some(content) = post.content() else {
            debug!(
                channel_id = post.channel_id,
                message_id = post.message_id,
                "ignoring post without text content"
            );
            return Ok(IngestOutcome::Discarded(DiscardReason::NoContent));
        };

        let linked = self.store.list_channel_ids()?;
        if !linked.contains(&post.channel_id) {
            debug!(channel_id = post.channel_id, "ignoring post from non-linked channel");
            return Ok(IngestOutcome::Discarded(DiscardReason::UnlinkedChannel));
        }

        let stored = self.store.save_post(
            post.channel_id,
            post.message_id,
            content,
            self.clock.now(),
        )?;

        if stored {
            info!(
                channel_id = post.channel_id,
                message_id = post.message_id,
                "post queued"
            );
            Ok(IngestOutcome::Stored)
        } else {
            Ok(IngestOutcome::Duplicate)
        }
    }
}
