use rodio::{OutputStream, Sink, Source};
use std::f32::consts::PI;
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use super::Notifier;

const ENABLE_LOGS: bool = true;

use crate::log_error;

enum ChimeCommand {
    Ring,
    Silence,
}

/// Two-tone chime that repeats every `period_secs` with silence in between.
pub struct ChimeTone {
    sample_rate: u32,
    num_sample: usize,
    period_samples: usize,
}

impl ChimeTone {
    pub fn new(period_secs: f32) -> Self {
        let sample_rate = 44100;
        Self {
            sample_rate,
            num_sample: 0,
            period_samples: (period_secs * sample_rate as f32) as usize,
        }
    }
}

impl Iterator for ChimeTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.num_sample % self.period_samples.max(1);
        self.num_sample = self.num_sample.wrapping_add(1);

        let t = position as f32 / self.sample_rate as f32;
        let sample = if t < 0.25 {
            (2.0 * PI * 880.0 * t).sin()
        } else if t < 0.5 {
            (2.0 * PI * 660.0 * t).sin()
        } else {
            0.0
        };

        Some(sample * 0.2)
    }
}

impl Source for ChimeTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Plays [`ChimeTone`] on a dedicated audio thread holding the non-Send
/// output stream.
pub struct ChimeNotifier {
    tx: Mutex<Option<Sender<ChimeCommand>>>,
}

impl ChimeNotifier {
    pub fn new() -> Self {
        Self { tx: Mutex::new(None) }
    }

    fn ensure_thread(&self) -> Result<Sender<ChimeCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<ChimeCommand>();

        thread::Builder::new()
            .name("focuslog-chime".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        ChimeCommand::Ring => {
                            if sink.is_some() {
                                continue;
                            }
                            match OutputStream::try_default() {
                                Ok((stream, handle)) => match Sink::try_new(&handle) {
                                    Ok(new_sink) => {
                                        new_sink.append(ChimeTone::new(2.0));
                                        new_sink.play();
                                        _stream = Some(stream);
                                        sink = Some(new_sink);
                                    }
                                    Err(e) => log_error!("Failed to create audio sink: {}", e),
                                },
                                Err(e) => {
                                    log_error!("Failed to create audio output stream: {}", e)
                                }
                            }
                        }
                        ChimeCommand::Silence => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for ChimeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ChimeNotifier {
    fn notify(&self) {
        match self.ensure_thread() {
            Ok(tx) => {
                let _ = tx.send(ChimeCommand::Ring);
            }
            Err(e) => log_error!("chime unavailable: {e}"),
        }
    }

    fn silence(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(ChimeCommand::Silence);
        }
    }
}
