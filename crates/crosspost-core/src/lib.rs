//! Account linking, channel binding and post ingestion on top of a [`Store`].
//!
//! Components are plain structs holding an `Arc<dyn Store>` and an
//! `Arc<dyn Clock>`; construct them once at start-up and clone freely.
//!
//! [`Store`]: crosspost_db::Store

pub mod channels;
pub mod clock;
pub mod error;
pub mod ingest;
pub mod linking;

pub use channels::ChannelRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use ingest::{ChannelPost, DiscardReason, IngestOutcome, Ingestor};
pub use linking::{ConnectionStatus, Linker, SetupOutcome, TOKEN_TTL_SECS};
