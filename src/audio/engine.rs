//! Sound engine for speech playback
//!
//! rodio's output stream is not `Send`, so a dedicated thread owns it and
//! takes requests over a channel. Callers block on a reply channel until the
//! clip has finished; a stop request cuts the current clip short.

use anyhow::{anyhow, bail, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POLL: Duration = Duration::from_millis(25);

type Reply = mpsc::Sender<Result<Duration, String>>;

enum Request {
    /// Play a clip to the end, then report how long it took
    Clip(PathBuf, Reply),
    /// Drop whatever is queued
    Halt,
}

/// Stream, handle and the current sink, all owned by the audio thread
struct Output {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Sink,
}

impl Output {
    fn open() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;
        Ok(Self {
            _stream: stream,
            handle,
            sink,
        })
    }

    fn start(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            bail!("Audio file not found: {:?}", path);
        }
        let source = Decoder::new(BufReader::new(File::open(path)?))?;
        self.sink.append(source);
        Ok(())
    }

    /// A stopped sink cannot be reused
    fn halt(&mut self) {
        self.sink.stop();
        match Sink::try_new(&self.handle) {
            Ok(sink) => self.sink = sink,
            Err(e) => warn!("⚠️ Couldn't recreate audio sink: {}", e),
        }
    }
}

/// Thread-safe handle to the audio thread
#[derive(Clone)]
pub struct SoundEngine {
    requests: mpsc::Sender<Request>,
    busy: Arc<AtomicBool>,
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine")
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl SoundEngine {
    pub fn new() -> Result<Self> {
        let (requests, inbox) = mpsc::channel::<Request>();
        let busy = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&busy);
        thread::Builder::new()
            .name("jazmin-audio".to_string())
            .spawn(move || run(inbox, flag))?;

        Ok(Self { requests, busy })
    }

    /// Play one clip and block until it ends. Returns the playback time.
    pub fn play_file_sync<P: Into<PathBuf>>(&self, path: P) -> Result<Duration> {
        let (reply, answer) = mpsc::channel();
        self.requests
            .send(Request::Clip(path.into(), reply))
            .map_err(|_| anyhow!("Audio thread is gone"))?;

        answer
            .recv()
            .map_err(|_| anyhow!("Audio thread dropped the request"))?
            .map_err(|e| anyhow!(e))
    }

    /// Cut off current playback
    pub fn stop(&self) -> Result<()> {
        self.requests
            .send(Request::Halt)
            .map_err(|_| anyhow!("Audio thread is gone"))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

fn run(inbox: mpsc::Receiver<Request>, busy: Arc<AtomicBool>) {
    let mut output = match Output::open() {
        Ok(output) => output,
        Err(e) => {
            warn!("🔇 No audio output available: {}", e);
            // Answer callers so they don't block forever
            for request in inbox {
                if let Request::Clip(_, reply) = request {
                    let _ = reply.send(Err(format!("no audio output: {}", e)));
                }
            }
            return;
        }
    };
    info!("🔊 Audio thread started");

    let mut queued: VecDeque<Request> = VecDeque::new();
    loop {
        let request = match queued.pop_front() {
            Some(request) => request,
            None => match inbox.recv() {
                Ok(request) => request,
                Err(_) => break,
            },
        };

        match request {
            Request::Clip(path, reply) => {
                debug!("🔊 Playing {:?}", path);
                busy.store(true, Ordering::SeqCst);
                let started = Instant::now();
                let result = output.start(&path).map(|()| {
                    wait_for_end(&mut output, &inbox, &mut queued);
                    started.elapsed()
                });
                busy.store(false, Ordering::SeqCst);
                if let Err(e) = &result {
                    error!("❌ Playback failed for {:?}: {}", path, e);
                }
                let _ = reply.send(result.map_err(|e| e.to_string()));
            }
            Request::Halt => {
                info!("🛑 Playback stopped");
                output.halt();
            }
        }
    }

    info!("🔇 Audio thread stopped");
}

/// Block until the sink drains, still honouring `Halt`. Other requests wait their turn.
fn wait_for_end(
    output: &mut Output,
    inbox: &mpsc::Receiver<Request>,
    queued: &mut VecDeque<Request>,
) {
    while !output.sink.empty() {
        match inbox.recv_timeout(POLL) {
            Ok(Request::Halt) => {
                info!("🛑 Playback stopped");
                output.halt();
                return;
            }
            Ok(other) => queued.push_back(other),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_clip_is_an_error() {
        let engine = SoundEngine::new().expect("audio thread spawns");
        let result = engine.play_file_sync("/nonexistent/jazmin/clip.mp3");
        assert!(result.is_err());
        assert!(!engine.is_busy());
    }
}
