//! Background music on a worker thread.
//!
//! The worker never sees session state. It talks back only through the
//! notice channel and is told to stop through a shared flag.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::notify::{hint, Notice};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Something that can play the music track once.
pub trait Playback: Clone + Send + 'static {
    /// Play until the track ends or `stop` is raised.
    fn play_once(&mut self, stop: &AtomicBool) -> Result<()>;
}

/// Plays the track by running an external program, e.g. `aplay music.wav`.
#[derive(Debug, Clone)]
pub struct CommandPlayback {
    program: String,
    args: Vec<String>,
}

impl CommandPlayback {
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Playback for CommandPlayback {
    fn play_once(&mut self, stop: &AtomicBool) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::Audio(format!("{} not found", self.program)),
                _ => Error::Io(e),
            })?;

        loop {
            if stop.load(Ordering::Relaxed) {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(());
            }
            match child.try_wait()? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(Error::Audio(format!("{} exited with {status}", self.program)))
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

/// Owns the music worker. Start is idempotent while the worker runs, and
/// once playback has failed it is not retried, so the failure is reported
/// a single time.
pub struct MusicController<P: Playback = CommandPlayback> {
    playback: P,
    tx: Sender<Notice>,
    stop: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<P: Playback> MusicController<P> {
    pub fn new(playback: P, tx: Sender<Notice>) -> Self {
        Self {
            playback,
            tx,
            stop: Arc::new(AtomicBool::new(false)),
            failed: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn start(&mut self) {
        if self.is_playing() || self.has_failed() {
            return;
        }
        // reap a worker that ended on its own
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let playback = self.playback.clone();
        self.stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&self.stop);
        let failed = Arc::clone(&self.failed);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("colormem-music".into())
            .spawn(move || music_loop(playback, &stop, &failed, &tx));
        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "could not spawn music worker");
                self.failed.store(true, Ordering::Relaxed);
                let _ = self
                    .tx
                    .send(Notice::message("Music not available.", hint::TIMER_OFF));
            }
        }
    }

    /// Signal the worker to stop without waiting for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop and wait for the worker to exit.
    pub fn cleanup(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<P: Playback> Drop for MusicController<P> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn music_loop<P: Playback>(
    mut playback: P,
    stop: &AtomicBool,
    failed: &AtomicBool,
    tx: &Sender<Notice>,
) {
    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = playback.play_once(stop) {
            tracing::warn!(error = %e, "music playback stopped");
            failed.store(true, Ordering::Relaxed);
            let _ = tx.send(Notice::message(
                format!("Music playback failed: {e}"),
                hint::TIMER_OFF,
            ));
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Terminal bell as the feedback sound. Best-effort.
pub fn ring_bell() {
    let mut out = io::stdout();
    let _ = out.write_all(b"\x07");
    let _ = out.flush();
}
