//! The transport contract the synchronizer consumes.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use startos_client_core::patch::{SequenceId, Snapshot};

/// Raw patch messages in arrival order. Each item is decoded and validated by
/// the synchronizer, so a transport never needs to understand patches.
pub type PatchStream = BoxStream<'static, Result<Value, SyncError>>;

/// An established subscription: the snapshot the server answered with, and
/// everything that follows it.
pub struct PatchSubscription {
    pub snapshot: Snapshot,
    pub patches: PatchStream,
}

/// Something that can open a patch subscription, typically a websocket to the
/// server.
#[async_trait]
pub trait PatchSource: Send + Sync {
    /// Open a new subscription. The server answers with a snapshot; when
    /// `from_cursor` is given, a server may start the snapshot from there.
    async fn subscribe(&self, from_cursor: Option<SequenceId>)
        -> Result<PatchSubscription, SyncError>;
}

/// Failures of the connection itself, as opposed to the content it carries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("patch stream closed by the server")]
    StreamClosed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("not authorized to subscribe to the database")]
    Unauthorized,
}
