//! Audio output for synthesized coaching speech.
//!
//! rodio's output objects are not `Send`, so a dedicated thread owns them
//! and the rest of the crate talks to it over a channel. If no audio device
//! is available the engine degrades to a no-op; speech is never fatal.

use std::io::Cursor;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use anyhow::{anyhow, Result};
use log::warn;
use rodio::{Decoder, OutputStream, Sink};

enum SpeechCommand {
    Play(Vec<u8>),
    Stop,
}

#[derive(Clone)]
pub struct SpeechEngine {
    tx: Arc<Mutex<Option<Sender<SpeechCommand>>>>,
}

impl Default for SpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechEngine {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<SpeechCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|err| anyhow!("speech engine lock poisoned: {err}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<SpeechCommand>();

        thread::Builder::new()
            .name("speech-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn fresh_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    let (s, handle) = OutputStream::try_default()
                        .map_err(|e| format!("no audio output available: {e}"))?;
                    let new_sink =
                        Sink::try_new(&handle).map_err(|e| format!("audio sink failed: {e}"))?;
                    *stream = Some(s);
                    *sink = Some(new_sink);
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        SpeechCommand::Play(bytes) => {
                            if let Err(err) = fresh_sink(&mut _stream, &mut sink) {
                                warn!("speech playback unavailable: {err}");
                                continue;
                            }
                            match Decoder::new(Cursor::new(bytes)) {
                                Ok(source) => {
                                    if let Some(ref s) = sink {
                                        s.append(source);
                                        s.play();
                                    }
                                }
                                Err(err) => warn!("undecodable tts audio: {err}"),
                            }
                        }
                        SpeechCommand::Stop => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                        }
                    }
                }
            })
            .map_err(|err| anyhow!("failed to spawn speech thread: {err}"))?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }

    /// Issue a playback request. Returns once the request is queued; actual
    /// playback happens on the audio thread.
    pub fn play(&self, bytes: Vec<u8>) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(SpeechCommand::Play(bytes))
            .map_err(|err| anyhow!("speech engine thread gone: {err}"))
    }

    /// Cut any playing audio. Used at session teardown.
    pub fn stop(&self) {
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(SpeechCommand::Stop);
            }
        }
    }
}
