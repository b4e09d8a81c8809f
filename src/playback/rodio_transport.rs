use super::transport::{MediaTransport, TransportEvent};
use crate::error::{MoodError, Result};
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

enum AudioCommand {
    Resume {
        generation: u64,
        url: String,
        reply: oneshot::Sender<bool>,
    },
    Load {
        generation: u64,
        url: String,
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop { generation: u64 },
    Pause,
    Seek(Duration),
    SetVolume(f32),
}

/// Preview player backed by rodio on a dedicated thread.
///
/// The output stream is opened lazily on the first load and lives on the audio
/// thread; the async side only fetches the preview bytes and sends commands.
/// Progress and end-of-stream are reported through the event channel.
pub struct RodioTransport {
    tx: std_mpsc::Sender<AudioCommand>,
    http: reqwest::Client,
}

impl RodioTransport {
    pub fn new(http: reqwest::Client, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let (tx, rx) = std_mpsc::channel();

        if let Err(e) = std::thread::Builder::new()
            .name("moodtune-audio".to_string())
            .spawn(move || AudioThread::new(events).run(rx))
        {
            tracing::error!("Failed to spawn audio thread: {}", e);
        }

        Self { tx, http }
    }

    fn send(&self, cmd: AudioCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::warn!("Audio thread is gone, dropping command");
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MoodError::PlaybackFailed(format!("Failed to fetch preview: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MoodError::PlaybackFailed(format!("Failed to read preview: {e}")))?;

        tracing::debug!("Fetched preview {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl MediaTransport for RodioTransport {
    async fn load_and_play(&self, generation: u64, url: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(AudioCommand::Resume {
            generation,
            url: url.to_string(),
            reply,
        });
        if rx.await.unwrap_or(false) {
            return Ok(());
        }

        let bytes = self.fetch(url).await?;

        let (reply, rx) = oneshot::channel();
        self.send(AudioCommand::Load {
            generation,
            url: url.to_string(),
            bytes,
            reply,
        });

        rx.await
            .map_err(|e| MoodError::PlaybackFailed(format!("Audio thread did not reply: {e}")))?
    }

    fn stop(&self, generation: u64) {
        self.send(AudioCommand::Stop { generation });
    }

    fn pause(&self) {
        self.send(AudioCommand::Pause);
    }

    fn seek(&self, position: Duration) {
        self.send(AudioCommand::Seek(position));
    }

    fn set_volume(&self, level: f32) {
        self.send(AudioCommand::SetVolume(level));
    }
}

struct AudioThread {
    events: mpsc::UnboundedSender<TransportEvent>,
    stream: Option<OutputStream>,
    sink: Option<Sink>,
    loaded_url: Option<String>,
    duration: Option<Duration>,
    latest_generation: u64,
    loaded_generation: u64,
    volume: f32,
}

impl AudioThread {
    fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            stream: None,
            sink: None,
            loaded_url: None,
            duration: None,
            latest_generation: 0,
            loaded_generation: 0,
            volume: 1.0,
        }
    }

    fn run(mut self, rx: std_mpsc::Receiver<AudioCommand>) {
        loop {
            match rx.recv_timeout(PROGRESS_INTERVAL) {
                Ok(cmd) => self.handle(cmd),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
            self.report_progress();
        }
        tracing::debug!("Audio thread exiting");
    }

    fn handle(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Resume {
                generation,
                url,
                reply,
            } => {
                let resumed = if generation < self.latest_generation {
                    true
                } else {
                    self.latest_generation = generation;
                    self.resume(generation, &url)
                };
                let _ = reply.send(resumed);
            }
            AudioCommand::Load {
                generation,
                url,
                bytes,
                reply,
            } => {
                let result = if generation < self.latest_generation {
                    tracing::debug!("Skipping load for superseded generation {}", generation);
                    Ok(())
                } else {
                    self.latest_generation = generation;
                    self.load(generation, url, bytes)
                };
                let _ = reply.send(result);
            }
            AudioCommand::Stop { generation } => {
                self.latest_generation = self.latest_generation.max(generation);
                self.release();
            }
            AudioCommand::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
            }
            AudioCommand::Seek(position) => {
                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.try_seek(position) {
                        tracing::warn!("Seek failed: {}", e);
                    }
                }
            }
            AudioCommand::SetVolume(level) => {
                self.volume = level;
                if let Some(sink) = &self.sink {
                    sink.set_volume(level);
                }
            }
        }
    }

    /// Continue a paused sink if it still holds `url`.
    fn resume(&mut self, generation: u64, url: &str) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        if self.loaded_url.as_deref() != Some(url) || sink.empty() {
            return false;
        }
        sink.play();
        self.loaded_generation = generation;
        tracing::info!("Preview resumed (generation {})", generation);
        true
    }

    fn load(&mut self, generation: u64, url: String, bytes: Vec<u8>) -> Result<()> {
        self.release();

        if self.stream.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
                MoodError::PlaybackFailed(format!("Failed to open audio output: {e}"))
            })?;
            stream.log_on_drop(false);
            self.stream = Some(stream);
        }
        let Some(stream) = &self.stream else {
            return Err(MoodError::PlaybackFailed("No audio output".to_string()));
        };

        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| MoodError::PlaybackFailed(format!("Unsupported preview: {e}")))?;
        self.duration = source.total_duration();

        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.volume);
        sink.append(source);
        sink.play();

        self.sink = Some(sink);
        self.loaded_url = Some(url);
        self.loaded_generation = generation;
        tracing::info!("Preview playing (generation {})", generation);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.loaded_url = None;
        self.duration = None;
    }

    fn report_progress(&mut self) {
        let Some(sink) = &self.sink else {
            return;
        };
        let generation = self.loaded_generation;

        if sink.empty() {
            self.sink = None;
            let _ = self.events.send(TransportEvent::Ended { generation });
            return;
        }

        if !sink.is_paused() {
            let _ = self.events.send(TransportEvent::Progress {
                generation,
                elapsed: sink.get_pos(),
                duration: self.duration,
            });
        }
    }
}
