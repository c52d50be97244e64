//! Background filler: a console mini-game that keeps the user busy while
//! the pipeline runs.
//!
//! The filler runs on its own threads and shares exactly one thing with the
//! rest of the program: a [`StopSignal`]. Two detached threads are used:
//!
//! - a reader that blocks on input and forwards lines over a channel;
//! - the game loop, which waits for lines at most one poll interval at a
//!   time and checks the signal before and after every wait.
//!
//! [`FillerHandle::stop`] sets the signal, then waits up to the grace period
//! for the game loop to exit. The reader may stay blocked on input; it is
//! abandoned and ends with the process.

mod game;
mod signal;
mod writer;

pub use game::{FillerGame, GuessingGame};
pub use signal::StopSignal;
pub use writer::{is_stopped, GatedWriter};

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Filler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillerConfig {
    /// Whether the CLI starts the filler.
    pub enabled: bool,
    /// How often the game loop re-checks the stop signal while idle.
    pub poll_interval_ms: u64,
    /// How long `stop` waits for the game loop to exit.
    pub stop_grace_ms: u64,
    /// Smallest number the game may pick.
    pub min_number: u32,
    /// Largest number the game may pick.
    pub max_number: u32,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: 100,
            stop_grace_ms: 200,
            min_number: 1,
            max_number: 100,
        }
    }
}

impl FillerConfig {
    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the stop grace period.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero poll interval or an empty number range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("filler.poll_interval_ms", "must be at least 1"));
        }
        if self.min_number > self.max_number {
            return Err(ConfigError::invalid(
                "filler.min_number",
                format!(
                    "must not exceed max_number ({} > {})",
                    self.min_number, self.max_number
                ),
            ));
        }
        Ok(())
    }

    /// Builds the default game for these settings.
    #[must_use]
    pub fn game(&self) -> GuessingGame {
        GuessingGame::new(self.min_number..=self.max_number)
    }
}

/// How the filler ended, as seen by [`FillerHandle::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerExit {
    /// The game loop exited within the grace period.
    Finished,
    /// The game loop was still running when the grace period ran out.
    Abandoned,
}

/// Entry point for starting a filler.
#[derive(Debug)]
pub struct FillerTask;

impl FillerTask {
    /// Starts `game` on background threads, reading lines from `input` and
    /// writing to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned.
    pub fn start<R, W>(
        mut game: Box<dyn FillerGame>,
        input: R,
        output: W,
        config: &FillerConfig,
    ) -> io::Result<FillerHandle>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let signal = StopSignal::new();
        let poll = config.poll_interval();
        let (line_tx, line_rx) = mpsc::channel::<String>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("crewflow-filler-input".to_string())
            .spawn(move || {
                let mut input = input;
                loop {
                    let mut line = String::new();
                    match input.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if line_tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "Filler input closed");
                            break;
                        }
                    }
                }
            })?;

        let loop_signal = signal.clone();
        thread::Builder::new()
            .name("crewflow-filler".to_string())
            .spawn(move || {
                let mut writer = GatedWriter::new(output, loop_signal.clone());
                game_loop(game.as_mut(), &line_rx, &mut writer, &loop_signal, poll);
                // Dropping `done_tx` wakes up `stop`.
                drop(done_tx);
            })?;

        Ok(FillerHandle {
            signal,
            done: done_rx,
            grace: config.stop_grace(),
        })
    }
}

fn game_loop<W: Write>(
    game: &mut dyn FillerGame,
    lines: &Receiver<String>,
    writer: &mut GatedWriter<W>,
    signal: &StopSignal,
    poll: Duration,
) {
    if !emit(writer, &game.intro()) {
        return;
    }

    loop {
        if signal.is_stopped() {
            return;
        }
        let line = match lines.recv_timeout(poll) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };
        if signal.is_stopped() {
            return;
        }
        let reply = game.respond(line.trim_end_matches(['\r', '\n']));
        if !emit(writer, &reply) {
            return;
        }
    }
}

fn emit<W: Write>(writer: &mut GatedWriter<W>, text: &str) -> bool {
    match writer.write_all(text.as_bytes()) {
        Ok(()) => true,
        Err(e) if is_stopped(&e) => false,
        Err(e) => {
            warn!(error = %e, "Filler output failed");
            false
        }
    }
}

/// Handle to a running filler.
///
/// Dropping the handle sets the stop signal without waiting.
#[derive(Debug)]
pub struct FillerHandle {
    signal: StopSignal,
    done: Receiver<()>,
    grace: Duration,
}

impl FillerHandle {
    /// Returns a clone of the stop signal.
    #[must_use]
    pub fn signal(&self) -> StopSignal {
        self.signal.clone()
    }

    /// Stops the filler. No filler output is written after this returns.
    ///
    /// Waits up to the grace period for the game loop to exit; the threads
    /// are never joined.
    pub fn stop(self) -> FillerExit {
        self.signal.stop("pipeline finished");
        match self.done.recv_timeout(self.grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => FillerExit::Finished,
            Err(RecvTimeoutError::Timeout) => {
                debug!(grace_ms = self.grace.as_millis(), "Filler still running; abandoning it");
                FillerExit::Abandoned
            }
        }
    }
}

impl Drop for FillerHandle {
    fn drop(&mut self) {
        self.signal.stop("filler handle dropped");
    }
}
