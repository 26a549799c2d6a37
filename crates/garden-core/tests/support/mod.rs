//! Scripted session-controller double: records transport commands, lets the
//! test drive player events, and can simulate attach failure.

use async_trait::async_trait;
use garden_core::error::SessionError;
use garden_core::session::{MediaItem, SessionController, SessionEvent};
use garden_core::Station;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    SetMediaItem(MediaItem),
    Prepare,
    Play,
    Pause,
}

pub struct ScriptedController {
    fail_connect: bool,
    playing: AtomicBool,
    commands: Mutex<Vec<Command>>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

impl ScriptedController {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// A controller whose attach always fails.
    pub fn failing_attach() -> Arc<Self> {
        Self::build(true)
    }

    fn build(fail_connect: bool) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::channel(32);
        Arc::new(Self {
            fail_connect,
            playing: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    /// Push a player event as the session host would.
    pub async fn emit(&self, event: SessionEvent) {
        self.event_tx.send(event).await.expect("event loop gone");
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

#[async_trait]
impl SessionController for ScriptedController {
    async fn connect(&self) -> Result<(), SessionError> {
        if self.fail_connect {
            Err(SessionError::Attach("scripted attach failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn set_media_item(&self, item: MediaItem) -> Result<(), SessionError> {
        self.record(Command::SetMediaItem(item));
        Ok(())
    }

    async fn prepare(&self) -> Result<(), SessionError> {
        self.record(Command::Prepare);
        Ok(())
    }

    async fn play(&self) -> Result<(), SessionError> {
        self.record(Command::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<(), SessionError> {
        self.record(Command::Pause);
        Ok(())
    }

    async fn stop(&self) -> Result<(), SessionError> {
        self.record(Command::Stop);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.lock().unwrap().take()
    }
}

pub fn station(id: &str, name: &str) -> Station {
    Station {
        id: id.to_string(),
        name: name.to_string(),
        stream_url: format!("https://radio.garden/api/ara/content/listen/{id}/channel.mp3"),
        image_url: format!("https://radio.garden/api/ara/content/channel/{id}/image.png"),
        description: "Radio Garden".to_string(),
    }
}
