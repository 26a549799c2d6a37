//! The playback coordinator: binds the background session controller,
//! republishes player state through watch channels, and orchestrates station
//! selection, favorites, history, restore, and the sleep timer.
//!
//! All [`PlaybackState`] mutations go through the coordinator's own watch
//! sender (`send_modify`), so they are serialized; session events are
//! drained by a single task and applied in the order received.  Each station
//! load and each search request carries a generation tag, and completions
//! whose generation has been superseded are discarded.

use crate::cache::StationCache;
use crate::directory::DirectoryClient;
use crate::error::DirectoryError;
use crate::prefs::PreferenceStore;
use crate::session::{MediaItem, SessionController, SessionEvent};
use crate::station::Station;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// User-facing message when the session host reports a playback failure.
pub const PLAYBACK_ERROR_MESSAGE: &str = "Failed to play this station";
/// User-facing message when a directory fetch fails.
pub const FETCH_ERROR_MESSAGE: &str = "Failed to load stations";

/// Snapshot of the player, republished on every change.
///
/// Invariants: `is_playing` and `is_buffering` are never both true;
/// `last_error` is cleared whenever playback reaches playing or a new
/// station is selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub current_station: Option<Station>,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub last_error: Option<String>,
}

struct SleepTimer {
    token: CancellationToken,
    generation: u64,
}

pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    directory: DirectoryClient,
    cache: StationCache,
    prefs: Arc<PreferenceStore>,
    controller: Arc<dyn SessionController>,

    /// Set once by `init`; re-entrant calls are no-ops.
    init_started: AtomicBool,
    /// True after a successful controller attach.  When false, playback
    /// commands are safely ignored.
    attached: AtomicBool,

    playback_tx: watch::Sender<PlaybackState>,
    stations_tx: watch::Sender<Vec<Station>>,
    featured_tx: watch::Sender<Vec<Station>>,
    favorite_stations_tx: watch::Sender<Vec<Station>>,
    sleep_deadline_tx: watch::Sender<Option<i64>>,
    is_loading_tx: watch::Sender<bool>,

    /// Generation of the most recent station load; superseded loads abort.
    load_generation: AtomicU64,
    /// Generation of the most recent search; stale completions are dropped.
    search_generation: AtomicU64,
    /// Monotonic id of the active sleep timer.
    timer_generation: AtomicU64,

    last_query: Mutex<String>,
    sleep_timer: Mutex<Option<SleepTimer>>,
}

impl PlaybackCoordinator {
    pub fn new(
        directory: DirectoryClient,
        cache: StationCache,
        prefs: Arc<PreferenceStore>,
        controller: Arc<dyn SessionController>,
    ) -> Self {
        let (playback_tx, _) = watch::channel(PlaybackState::default());
        let (stations_tx, _) = watch::channel(Vec::new());
        let (featured_tx, _) = watch::channel(Vec::new());
        let (favorite_stations_tx, _) = watch::channel(Vec::new());
        let (sleep_deadline_tx, _) = watch::channel(None);
        let (is_loading_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                directory,
                cache,
                prefs,
                controller,
                init_started: AtomicBool::new(false),
                attached: AtomicBool::new(false),
                playback_tx,
                stations_tx,
                featured_tx,
                favorite_stations_tx,
                sleep_deadline_tx,
                is_loading_tx,
                load_generation: AtomicU64::new(0),
                search_generation: AtomicU64::new(0),
                timer_generation: AtomicU64::new(0),
                last_query: Mutex::new(String::new()),
                sleep_timer: Mutex::new(None),
            }),
        }
    }

    // ── observable surface ────────────────────────────────────────────────────

    pub fn playback(&self) -> watch::Receiver<PlaybackState> {
        self.inner.playback_tx.subscribe()
    }

    pub fn stations(&self) -> watch::Receiver<Vec<Station>> {
        self.inner.stations_tx.subscribe()
    }

    pub fn featured(&self) -> watch::Receiver<Vec<Station>> {
        self.inner.featured_tx.subscribe()
    }

    pub fn favorite_stations(&self) -> watch::Receiver<Vec<Station>> {
        self.inner.favorite_stations_tx.subscribe()
    }

    pub fn favorite_ids(&self) -> watch::Receiver<BTreeSet<String>> {
        self.inner.prefs.favorites()
    }

    pub fn history(&self) -> watch::Receiver<Vec<String>> {
        self.inner.prefs.history()
    }

    /// Published sleep deadline in epoch milliseconds; `None` when no timer
    /// is armed.
    pub fn sleep_deadline(&self) -> watch::Receiver<Option<i64>> {
        self.inner.sleep_deadline_tx.subscribe()
    }

    pub fn is_loading(&self) -> watch::Receiver<bool> {
        self.inner.is_loading_tx.subscribe()
    }

    // ── lifecycle ─────────────────────────────────────────────────────────────

    /// Bind the session controller and start the mirror tasks.  Idempotent:
    /// only the first call does anything.
    pub async fn init(&self) {
        if self.inner.init_started.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.inner.controller.connect().await {
            Ok(()) => {
                self.inner.attached.store(true, Ordering::SeqCst);
                info!("session controller attached");
                if let Some(events) = self.inner.controller.take_events() {
                    spawn_event_loop(self.inner.clone(), events);
                }
            }
            Err(e) => {
                // Degraded mode: stay usable, ignore playback commands.
                error!(error = %e, "session attach failed; playback commands disabled");
            }
        }

        spawn_favorites_mirror(self.inner.clone());

        // Restore the last played station (republish only, never autoplay).
        let last = self.inner.prefs.last_station().borrow().clone();
        if let Some(id) = last {
            if self.inner.playback_tx.borrow().current_station.is_none() {
                self.inner.restore_last_station(&id).await;
            }
        }
    }

    // ── playback ──────────────────────────────────────────────────────────────

    /// Select and start a station.  Supersedes any in-flight load; records
    /// the station into history and last-station as fire-and-forget.
    pub async fn play_station(&self, station: Station) {
        let inner = &self.inner;
        if !inner.attached.load(Ordering::SeqCst) {
            debug!(station = %station.id, "no session bound; ignoring play");
            return;
        }

        let generation = inner.load_generation.fetch_add(1, Ordering::SeqCst) + 1;

        inner.playback_tx.send_modify(|state| {
            state.current_station = Some(station.clone());
            state.is_playing = false;
            state.is_buffering = true;
            state.last_error = None;
        });

        // History and last-station writes are best-effort and must not delay
        // the transport commands.
        let prefs = inner.prefs.clone();
        let id = station.id.clone();
        tokio::spawn(async move {
            prefs.add_to_history(&id).await;
            prefs.set_last_station(&id).await;
        });

        let item = MediaItem {
            media_id: station.id.clone(),
            uri: station.stream_url.clone(),
            title: station.name.clone(),
            artist: station.description.clone(),
        };

        if let Err(e) = inner.run_load_sequence(item, generation).await {
            warn!(station = %station.id, error = %e, "failed to start playback");
            if inner.load_generation.load(Ordering::SeqCst) == generation {
                inner.playback_tx.send_modify(|state| {
                    state.is_playing = false;
                    state.is_buffering = false;
                    state.last_error = Some(PLAYBACK_ERROR_MESSAGE.to_string());
                });
            }
        }
    }

    /// Resolve a station id (cache first, directory lookup as fallback) and
    /// play it.
    pub async fn play_station_id(&self, id: &str) -> Result<(), DirectoryError> {
        let station = match self.inner.cache.get(id).await {
            Some(station) => station,
            None => self.inner.directory.lookup(id).await?,
        };
        self.play_station(station).await;
        Ok(())
    }

    /// Issue the opposite of the controller's current transport state.
    /// No-op when no controller is bound.
    pub async fn toggle_play_pause(&self) {
        let inner = &self.inner;
        if !inner.attached.load(Ordering::SeqCst) {
            debug!("no session bound; ignoring toggle");
            return;
        }
        let result = if inner.controller.is_playing().await {
            inner.controller.pause().await
        } else {
            inner.controller.play().await
        };
        if let Err(e) = result {
            warn!(error = %e, "toggle play/pause failed");
        }
    }

    // ── favorites ─────────────────────────────────────────────────────────────

    /// Flip favorite membership; the resolved projection follows via the
    /// mirror task.
    pub async fn toggle_favorite(&self, id: &str) {
        self.inner.prefs.toggle_favorite(id).await;
    }

    // ── search ────────────────────────────────────────────────────────────────

    /// Fetch stations for `query` and publish the result list.  Concurrent
    /// calls race; only the newest call's results are published.
    pub async fn fetch_stations(&self, query: &str) {
        let inner = &self.inner;
        let generation = inner.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *inner.last_query.lock().await = query.to_string();

        inner.is_loading_tx.send_replace(true);
        inner.playback_tx.send_modify(|state| state.last_error = None);

        let result = inner.directory.search(query).await;

        // A newer request owns the published list (and the loading flag).
        if inner.search_generation.load(Ordering::SeqCst) != generation {
            debug!(query, "discarding stale search completion");
            return;
        }

        match result {
            Ok(stations) => inner.publish_search_results(query, stations),
            // Unexpected payload shape degrades to zero results.
            Err(DirectoryError::MalformedResponse(detail)) => {
                warn!(query, detail, "malformed search payload, treating as empty");
                inner.publish_search_results(query, Vec::new());
            }
            Err(e) => {
                warn!(query, error = %e, "directory search failed");
                inner.playback_tx.send_modify(|state| {
                    state.last_error = Some(FETCH_ERROR_MESSAGE.to_string());
                });
            }
        }

        inner.is_loading_tx.send_replace(false);
    }

    /// Re-run the most recent query.
    pub async fn refresh(&self) {
        let query = self.inner.last_query.lock().await.clone();
        self.fetch_stations(&query).await;
    }

    // ── sleep timer ───────────────────────────────────────────────────────────

    /// Arm, replace, or clear the sleep timer.  Always cancels any existing
    /// scheduled pause first; a non-null value schedules a one-shot pause and
    /// publishes a fresh `now + minutes` deadline.
    pub async fn set_sleep_timer(&self, minutes: Option<u64>) {
        let inner = self.inner.clone();
        let mut slot = inner.sleep_timer.lock().await;

        if let Some(previous) = slot.take() {
            previous.token.cancel();
        }
        inner.sleep_deadline_tx.send_replace(None);

        let Some(minutes) = minutes else {
            return;
        };

        let generation = inner.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let duration = std::time::Duration::from_secs(minutes * 60);
        let deadline = chrono::Utc::now().timestamp_millis() + (minutes as i64) * 60_000;
        inner.sleep_deadline_tx.send_replace(Some(deadline));

        let token = CancellationToken::new();
        let task_token = token.clone();
        let task_inner = inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    task_inner.fire_sleep_timer(generation).await;
                }
            }
        });

        *slot = Some(SleepTimer { token, generation });
        info!(minutes, deadline, "sleep timer armed");
    }
}

impl Inner {
    /// stop → set item → prepare → play, checking after each suspension
    /// point that this load has not been superseded by a newer selection.
    async fn run_load_sequence(
        &self,
        item: MediaItem,
        generation: u64,
    ) -> Result<(), crate::error::SessionError> {
        let superseded = || self.load_generation.load(Ordering::SeqCst) != generation;

        self.controller.stop().await?;
        if superseded() {
            return Ok(());
        }
        self.controller.set_media_item(item).await?;
        self.controller.prepare().await?;
        if superseded() {
            return Ok(());
        }
        self.controller.play().await
    }

    /// Apply one session event.  Events are matched against the currently
    /// selected station; anything from a superseded load is discarded.
    fn apply_session_event(&self, event: SessionEvent) {
        self.playback_tx.send_modify(|state| {
            let current_id = match &state.current_station {
                Some(station) => station.id.as_str(),
                None => {
                    debug!("session event with no station selected, ignored");
                    return;
                }
            };
            if event.media_id() != current_id {
                debug!(event_id = event.media_id(), current_id, "stale session event discarded");
                return;
            }

            match event {
                SessionEvent::PlayingChanged { playing, .. } => {
                    state.is_playing = playing;
                    if playing {
                        state.is_buffering = false;
                        state.last_error = None;
                    }
                }
                SessionEvent::BufferingChanged { buffering, .. } => {
                    state.is_buffering = buffering;
                    if buffering {
                        state.is_playing = false;
                    }
                }
                SessionEvent::PlaybackError { code, .. } => {
                    warn!(code, "session reported playback error");
                    state.is_playing = false;
                    state.is_buffering = false;
                    state.last_error = Some(PLAYBACK_ERROR_MESSAGE.to_string());
                }
            }
        });
    }

    fn publish_search_results(&self, query: &str, stations: Vec<Station>) {
        // Derive the featured sample only from the default browse view, or
        // when no featured set exists yet.
        if query.trim().is_empty() || self.featured_tx.borrow().is_empty() {
            let mut sample = stations.clone();
            sample.shuffle(&mut rand::thread_rng());
            sample.truncate(self.directory.featured_count());
            self.featured_tx.send_replace(sample);
        }
        self.stations_tx.send_replace(stations);
    }

    /// Republish the last played station without starting playback.
    async fn restore_last_station(&self, id: &str) {
        let station = match self.cache.get(id).await {
            Some(station) => station,
            None => match self.directory.lookup(id).await {
                Ok(station) => station,
                Err(e) => {
                    warn!(station = id, error = %e, "failed to restore last station");
                    return;
                }
            },
        };
        debug!(station = id, "restored last station");
        self.playback_tx.send_modify(|state| {
            if state.current_station.is_none() {
                state.current_station = Some(station);
            }
        });
    }

    /// Reconcile the resolved favorites list against the id set:
    /// removed ids drop out, new ids resolve cache-first, directory lookup
    /// only for stations we have never seen.
    async fn sync_favorite_stations(&self, ids: &BTreeSet<String>) {
        let mut resolved = self.favorite_stations_tx.borrow().clone();
        resolved.retain(|station| ids.contains(&station.id));

        for id in ids {
            if resolved.iter().any(|station| &station.id == id) {
                continue;
            }
            let station = match self.cache.get(id).await {
                Some(station) => Some(station),
                None => match self.directory.lookup(id).await {
                    Ok(station) => Some(station),
                    Err(e) => {
                        warn!(station = %id, error = %e, "failed to resolve favorite");
                        None
                    }
                },
            };
            if let Some(station) = station {
                resolved.push(station);
            }
        }

        self.favorite_stations_tx.send_replace(resolved);
    }

    /// The one-shot pause.  The pause side effect may race an in-flight
    /// cancel and still happen once, but the published deadline always ends
    /// up null: the slot is only cleared if this timer is still the active
    /// one.
    async fn fire_sleep_timer(&self, generation: u64) {
        if self.attached.load(Ordering::SeqCst) {
            if let Err(e) = self.controller.pause().await {
                warn!(error = %e, "sleep timer pause failed");
            }
        }

        let mut slot = self.sleep_timer.lock().await;
        if slot.as_ref().is_some_and(|timer| timer.generation == generation) {
            *slot = None;
            self.sleep_deadline_tx.send_replace(None);
            info!("sleep timer fired");
        }
    }
}

fn spawn_event_loop(inner: Arc<Inner>, mut events: mpsc::Receiver<SessionEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            inner.apply_session_event(event);
        }
        debug!("session event channel closed");
    });
}

/// Mirror the persisted favorites id set into the resolved station list,
/// reconciling on every committed change.
fn spawn_favorites_mirror(inner: Arc<Inner>) {
    let mut favorites = inner.prefs.favorites();
    tokio::spawn(async move {
        loop {
            let ids = favorites.borrow_and_update().clone();
            inner.sync_favorite_stations(&ids).await;
            if favorites.changed().await.is_err() {
                break;
            }
        }
    });
}
