use crate::messages::{PlayResolved, PlayerCommand, ScrollIntent};
use crate::playback::{MediaTransport, PlaybackEngine, PlaybackState, TransportCommand, TransportEvent};
use crate::playlist::{PlaylistController, PlaylistState};
use crate::track::Track;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Everything the host renders for the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    pub playlist: PlaylistState,
    pub playback: PlaybackState,
}

/// Owns the playlist and the playback engine
///
/// This service:
/// - Applies playlist and transport commands from the host and the pipeline
/// - Forwards engine work to the media transport
/// - Runs load-and-play requests as separate tasks so commands keep flowing
/// - Feeds progress, end-of-stream and play results back into the engine
/// - Publishes a snapshot after every change
pub struct Player {
    playlist: PlaylistController,
    engine: PlaybackEngine,
    transport: Arc<dyn MediaTransport>,
    cmd_rx: mpsc::Receiver<PlayerCommand>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    resolved_tx: mpsc::UnboundedSender<PlayResolved>,
    resolved_rx: mpsc::UnboundedReceiver<PlayResolved>,
    snapshot: watch::Sender<PlayerSnapshot>,
    scroll: broadcast::Sender<ScrollIntent>,
    autoplay_on_advance: bool,
}

impl Player {
    pub fn new(
        cmd_rx: mpsc::Receiver<PlayerCommand>,
        transport: Arc<dyn MediaTransport>,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
        scroll: broadcast::Sender<ScrollIntent>,
        volume: f32,
        autoplay_on_advance: bool,
    ) -> Self {
        let engine = PlaybackEngine::new(volume);
        let (snapshot, _) = watch::channel(PlayerSnapshot {
            playlist: PlaylistState::default(),
            playback: engine.state().clone(),
        });
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        Self {
            playlist: PlaylistController::new(),
            engine,
            transport,
            cmd_rx,
            transport_rx,
            resolved_tx,
            resolved_rx,
            snapshot,
            scroll,
            autoplay_on_advance,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.subscribe()
    }

    pub async fn run(mut self) {
        self.transport
            .set_volume(self.engine.state().effective_volume());

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },

                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event);
                }

                Some(resolved) = self.resolved_rx.recv() => {
                    self.engine.complete_play(resolved.generation, resolved.result);
                }
            }
            self.publish();
        }

        self.transport.stop(self.engine.generation() + 1);
        tracing::debug!("Player stopped");
    }

    fn handle_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::ReplaceAll(tracks) => {
                tracing::info!("Playlist replaced with {} tracks", tracks.len());
                if self.playlist.replace_all(tracks).is_some() {
                    self.select_current();
                } else {
                    let cmd = self.engine.clear();
                    self.execute(cmd);
                }
            }
            PlayerCommand::SelectIndex(index) => {
                if self.playlist.select_index(index).is_some() {
                    self.select_current();
                }
            }
            PlayerCommand::Next => {
                if self.playlist.next().is_some() {
                    self.select_current();
                }
            }
            PlayerCommand::Previous => {
                if self.playlist.previous().is_some() {
                    self.select_current();
                }
            }
            PlayerCommand::TogglePlayPause => self.toggle_play_pause(),
            PlayerCommand::Seek(fraction) => {
                if let Some(cmd) = self.engine.seek(fraction) {
                    self.execute(cmd);
                }
            }
            PlayerCommand::SetVolume(level) => {
                let cmd = self.engine.set_volume(level);
                self.execute(cmd);
            }
            PlayerCommand::ToggleMute => {
                let cmd = self.engine.toggle_mute();
                self.execute(cmd);
            }
            PlayerCommand::ToggleEmbed => {
                if !self.engine.toggle_embed() {
                    tracing::debug!("Current track has no embedded player");
                }
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Progress {
                generation,
                elapsed,
                duration,
            } => {
                self.engine.on_progress(generation, elapsed, duration);
            }
            TransportEvent::Ended { generation } => {
                if !self.engine.on_ended(generation) {
                    return;
                }
                tracing::info!("Track ended, advancing");
                if self.playlist.next().is_some() {
                    self.select_current();
                    if self.autoplay_on_advance {
                        self.toggle_play_pause();
                    }
                }
            }
        }
    }

    fn toggle_play_pause(&mut self) {
        match self.engine.toggle_play_pause() {
            Some(cmd) => self.execute(cmd),
            None => tracing::debug!("Play/pause not applicable right now"),
        }
    }

    fn select_current(&mut self) {
        let Some(track) = self.playlist.current().cloned() else {
            return;
        };
        tracing::info!(
            "Now selected: {} - {} [{}]",
            track.artist,
            track.name,
            track.badge()
        );
        let cmd = self.engine.select_track(track);
        self.execute(cmd);
        let _ = self.scroll.send(ScrollIntent::PlayerControls);
    }

    fn execute(&self, cmd: TransportCommand) {
        match cmd {
            TransportCommand::Stop { generation } => self.transport.stop(generation),
            TransportCommand::Pause => self.transport.pause(),
            TransportCommand::Seek(position) => self.transport.seek(position),
            TransportCommand::SetVolume(level) => self.transport.set_volume(level),
            TransportCommand::LoadAndPlay { generation, url } => {
                let transport = Arc::clone(&self.transport);
                let resolved_tx = self.resolved_tx.clone();
                tokio::spawn(async move {
                    let result = transport.load_and_play(generation, &url).await;
                    let _ = resolved_tx.send(PlayResolved { generation, result });
                });
            }
        }
    }

    fn publish(&self) {
        let snapshot = PlayerSnapshot {
            playlist: self.playlist.snapshot(),
            playback: self.engine.state().clone(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Handle for communicating with the Player
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerCommand>,
}

impl PlayerHandle {
    pub fn new(tx: mpsc::Sender<PlayerCommand>) -> Self {
        Self { tx }
    }

    async fn send(&self, cmd: PlayerCommand, name: &str) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send {} command: {}", name, e))
    }

    pub async fn replace_all(&self, tracks: Vec<Track>) -> Result<()> {
        self.send(PlayerCommand::ReplaceAll(tracks), "replace").await
    }

    pub async fn select_index(&self, index: usize) -> Result<()> {
        self.send(PlayerCommand::SelectIndex(index), "select").await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(PlayerCommand::Next, "next").await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(PlayerCommand::Previous, "previous").await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.send(PlayerCommand::TogglePlayPause, "play/pause").await
    }

    pub async fn seek(&self, fraction: f32) -> Result<()> {
        self.send(PlayerCommand::Seek(fraction), "seek").await
    }

    pub async fn set_volume(&self, level: f32) -> Result<()> {
        self.send(PlayerCommand::SetVolume(level), "volume").await
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.send(PlayerCommand::ToggleMute, "mute").await
    }

    pub async fn toggle_embed(&self) -> Result<()> {
        self.send(PlayerCommand::ToggleEmbed, "embed").await
    }
}

/// Spawn a Player on the current runtime and return its handle and snapshots.
pub fn spawn_player(
    transport: Arc<dyn MediaTransport>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    scroll: broadcast::Sender<ScrollIntent>,
    volume: f32,
    autoplay_on_advance: bool,
) -> (PlayerHandle, watch::Receiver<PlayerSnapshot>) {
    let (tx, rx) = mpsc::channel(32);
    let player = Player::new(rx, transport, transport_rx, scroll, volume, autoplay_on_advance);
    let snapshots = player.subscribe();
    tokio::spawn(player.run());
    (PlayerHandle::new(tx), snapshots)
}
