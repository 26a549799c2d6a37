//! Core coordination layer for the gardenfm internet-radio player.
//!
//! The pieces, leaf-first:
//!
//! - [`directory::DirectoryClient`] — search/lookup against the remote
//!   station directory.
//! - [`prefs::PreferenceStore`] — durable favorites / history / last-station
//!   state with reactive reads.
//! - [`cache::StationCache`] — session-scoped station metadata cache.
//! - [`coordinator::PlaybackCoordinator`] — binds a [`session::SessionController`],
//!   republishes player state, and orchestrates everything above.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod platform;
pub mod prefs;
pub mod session;
pub mod station;

pub use cache::StationCache;
pub use config::Config;
pub use coordinator::{PlaybackCoordinator, PlaybackState};
pub use directory::DirectoryClient;
pub use error::{DirectoryError, SessionError};
pub use prefs::PreferenceStore;
pub use session::{MediaItem, SessionController, SessionEvent};
pub use station::Station;
