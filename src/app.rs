use crate::capture::{CaptureController, FfmpegCamera};
use crate::commands::{self, Command};
use crate::config::Config;
use crate::display;
use crate::error::MoodError;
use crate::messages::{RecognitionState, ScrollIntent};
use crate::playback::{PlaybackState, RodioTransport};
use crate::services::api::{self, ApiClient};
use crate::services::{
    HttpClassifier, HttpRecommender, PlayerHandle, PlayerSnapshot, RecognitionPipeline,
    spawn_player,
};
use crate::session::SessionContext;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

pub struct App {
    session: Arc<SessionContext>,
    pipeline: RecognitionPipeline,
    player: PlayerHandle,
    player_rx: watch::Receiver<PlayerSnapshot>,
    recognition_rx: watch::Receiver<RecognitionState>,
    camera_rx: watch::Receiver<bool>,
    scroll_rx: broadcast::Receiver<ScrollIntent>,
    command_rx: mpsc::Receiver<Command>,
    last_player: PlayerSnapshot,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let session = Arc::new(SessionContext::restore(
            Config::config_dir()?.join("session.json"),
        )?);
        let http = api::create_client(config.request_timeout())?;
        let api = ApiClient::new(http.clone(), &config.api_url, Arc::clone(&session));

        let (scroll_tx, scroll_rx) = broadcast::channel(16);
        let (player, player_rx) = Self::setup_player(&config, http, scroll_tx.clone());

        let camera = FfmpegCamera::new(config.ffmpeg_path.clone(), &config.camera_device);
        let pipeline = RecognitionPipeline::new(
            CaptureController::new(Box::new(camera)),
            Arc::new(HttpClassifier::new(api.clone())),
            Arc::new(HttpRecommender::new(api)),
            player.clone(),
            scroll_tx,
            config.recommendation_limit,
        );
        let recognition_rx = pipeline.subscribe();
        let camera_rx = pipeline.camera_active().await;

        let command_rx = Self::setup_command_input();

        tracing::info!("Ready! Type 'help' for commands");

        let last_player = player_rx.borrow().clone();
        Ok(Self {
            session,
            pipeline,
            player,
            last_player,
            player_rx,
            recognition_rx,
            camera_rx,
            scroll_rx,
            command_rx,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                // Disabled once stdin closes; Ctrl+C still ends the loop.
                Some(cmd) = self.command_rx.recv() => {
                    if cmd == Command::Quit {
                        break;
                    }
                    if let Err(e) = self.handle_command(cmd).await {
                        tracing::error!("Error handling command: {}", e);
                    }
                }

                Ok(()) = self.player_rx.changed() => {
                    let snapshot = self.player_rx.borrow_and_update().clone();
                    self.render_player(snapshot);
                }

                Ok(()) = self.recognition_rx.changed() => {
                    let state = self.recognition_rx.borrow_and_update().clone();
                    tracing::info!("{}", display::render_recognition(&state));
                }

                Ok(()) = self.camera_rx.changed() => {
                    let active = *self.camera_rx.borrow_and_update();
                    tracing::info!("Camera {}", if active { "active" } else { "inactive" });
                }

                intent = self.scroll_rx.recv() => match intent {
                    Ok(intent) => tracing::debug!("Scroll into view: {:?}", intent),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("Skipped {} scroll intents", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.pipeline.stop_camera().await;
        tracing::info!("moodtune shutdown complete");
        Ok(())
    }

    async fn handle_command(&mut self, cmd: Command) -> Result<()> {
        tracing::debug!("handle_command: {:?}", cmd);

        match cmd {
            Command::CameraOn => {
                if let Err(e) = self.pipeline.start_camera().await {
                    tracing::warn!("{}", e.user_message());
                }
            }
            Command::CameraOff => self.pipeline.stop_camera().await,
            Command::Detect => self.spawn_run(None),
            Command::Upload(path) => self.spawn_run(Some(path)),
            Command::PlayPause => self.player.toggle_play_pause().await?,
            Command::Next => self.player.next().await?,
            Command::Previous => self.player.previous().await?,
            Command::Select(index) => self.player.select_index(index).await?,
            Command::Seek(fraction) => self.player.seek(fraction).await?,
            Command::Volume(level) => self.player.set_volume(level).await?,
            Command::Mute => self.player.toggle_mute().await?,
            Command::Embed => self.player.toggle_embed().await?,
            Command::List => println!("{}", display::render_playlist(&self.last_player.playlist)),
            Command::Status => {
                println!("{}", display::render_recognition(&self.pipeline.state()));
                println!("{}", display::render_playback(&self.last_player.playback));
            }
            Command::Token(token) => {
                self.session.set_token(token)?;
                tracing::info!("Session token stored");
            }
            Command::Logout => self.session.logout()?,
            Command::Theme => {
                let theme = self.session.toggle_theme()?;
                tracing::info!("Theme set to {:?}", theme);
            }
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => {}
        }

        Ok(())
    }

    /// Start a pipeline run without blocking the command loop.
    fn spawn_run(&self, upload: Option<PathBuf>) {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let result = match &upload {
                Some(path) => pipeline.run_from_upload(path).await,
                None => pipeline.run_from_camera().await,
            };
            match result {
                Ok(_) => {}
                Err(MoodError::RunInFlight) => {
                    tracing::warn!("{}", MoodError::RunInFlight);
                }
                // Already surfaced through the recognition state.
                Err(e) => tracing::debug!("Run ended with: {}", e),
            }
        });
    }

    fn render_player(&mut self, snapshot: PlayerSnapshot) {
        let previous = std::mem::replace(&mut self.last_player, snapshot);
        let current = &self.last_player;

        if !Arc::ptr_eq(&previous.playlist.tracks, &current.playlist.tracks) {
            println!("{}", display::render_playlist(&current.playlist));
        }

        let progress_only = previous.playlist.index == current.playlist.index
            && without_progress(&previous.playback) == without_progress(&current.playback);

        if progress_only {
            tracing::debug!("{}", display::render_playback(&current.playback));
        } else {
            tracing::info!("{}", display::render_playback(&current.playback));
        }
    }

    fn setup_player(
        config: &Config,
        http: reqwest::Client,
        scroll: broadcast::Sender<ScrollIntent>,
    ) -> (PlayerHandle, watch::Receiver<PlayerSnapshot>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RodioTransport::new(http, events_tx));
        spawn_player(
            transport,
            events_rx,
            scroll,
            config.initial_volume,
            config.autoplay_on_advance,
        )
    }

    fn setup_command_input() -> mpsc::Receiver<Command> {
        let (command_tx, command_rx) = mpsc::channel(10);
        tokio::spawn(async move {
            if let Err(e) = commands::read_commands(command_tx).await {
                tracing::error!("Command input failed: {}", e);
            }
        });
        command_rx
    }
}

fn without_progress(state: &PlaybackState) -> PlaybackState {
    PlaybackState {
        elapsed: Duration::ZERO,
        duration: None,
        ..state.clone()
    }
}
