//! Capability interface over the background audio session host.
//!
//! The coordinator never talks to a concrete player; it is handed a
//! [`SessionController`] at construction.  The daemon injects an mpv-backed
//! implementation, tests inject a scripted double.

use crate::error::SessionError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The media item loaded into the session host for one station selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub media_id: String,
    pub uri: String,
    pub title: String,
    pub artist: String,
}

/// Player-state events emitted by the session host.
///
/// Every event names the media item it pertains to; the coordinator uses
/// that to discard events from loads that have been superseded by a newer
/// station selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PlayingChanged { media_id: String, playing: bool },
    BufferingChanged { media_id: String, buffering: bool },
    PlaybackError { media_id: String, code: i32 },
}

impl SessionEvent {
    pub fn media_id(&self) -> &str {
        match self {
            SessionEvent::PlayingChanged { media_id, .. } => media_id,
            SessionEvent::BufferingChanged { media_id, .. } => media_id,
            SessionEvent::PlaybackError { media_id, .. } => media_id,
        }
    }
}

/// Transport surface of the session host.
///
/// `connect` is called once by the coordinator's `init`; all other commands
/// are only issued after a successful attach.
#[async_trait]
pub trait SessionController: Send + Sync {
    /// Attach to the session host.  On failure the coordinator degrades to
    /// a mode where playback commands are no-ops.
    async fn connect(&self) -> Result<(), SessionError>;

    async fn set_media_item(&self, item: MediaItem) -> Result<(), SessionError>;
    async fn prepare(&self) -> Result<(), SessionError>;
    async fn play(&self) -> Result<(), SessionError>;
    async fn pause(&self) -> Result<(), SessionError>;
    async fn stop(&self) -> Result<(), SessionError>;
    async fn is_playing(&self) -> bool;

    /// Take the host's event stream.  Yields `Some` exactly once, after a
    /// successful `connect`; the coordinator drains it from a single task so
    /// events are applied in the order received.
    fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>>;
}
