//! Renderer supervision.
//!
//! The renderer runs as a child process with both pipes captured. One
//! reader thread per pipe forwards lines over a channel; the supervising
//! thread classifies each line and kills the child when it has been
//! silent for longer than the idle timeout or when cancellation is
//! requested. A renderer that exits while a background process still
//! holds its pipes is judged by its own exit status.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use dih_core::errors::RenderError;
use dih_core::traits::cancellation::{Cancellable, CancellationToken};

use super::patterns::{LineClass, OutputClassifier};
use super::progress::parse_progress;
use super::types::{OutputLine, Progress, RenderOutcome, RenderRequest, RenderStatus, Stream};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long buffered output is still read after the renderer has exited.
const EXIT_DRAIN: Duration = Duration::from_millis(200);

/// Runs renderer invocations and judges their output.
pub struct RenderMonitor {
    classifier: OutputClassifier,
    cancel: Option<CancellationToken>,
}

enum Stop {
    Kill(RenderStatus),
    Exited(ExitStatus),
}

#[derive(Default)]
struct Collected {
    warnings: Vec<String>,
    errors: Vec<String>,
    last_progress: Option<Progress>,
    lines: usize,
}

impl RenderMonitor {
    pub fn new(classifier: OutputClassifier) -> Self {
        Self {
            classifier,
            cancel: None,
        }
    }

    /// Kill the renderer once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn run(&self, request: &RenderRequest) -> Result<RenderOutcome, RenderError> {
        let start = Instant::now();
        let command_line = request.display_command();
        info!(
            command = %command_line,
            dir = %request.source_dir.display(),
            idle_timeout_secs = request.idle_timeout.as_secs(),
            "starting renderer"
        );

        let mut child = Command::new(&request.command)
            .args(&request.args)
            .current_dir(&request.source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut collected = Collected::default();
        let mut last_activity = Instant::now();
        let stop = loop {
            if self.is_cancelled() {
                warn!(command = %command_line, "render cancelled");
                break Stop::Kill(RenderStatus::Cancelled);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    last_activity = Instant::now();
                    self.handle_line(&mut collected, line);
                }
                Err(RecvTimeoutError::Timeout) => {
                    // A background grandchild can keep the pipes open after the renderer exits.
                    let exited = child.try_wait().map_err(|source| RenderError::Wait { source })?;
                    if let Some(exit) = exited {
                        let deadline = Instant::now() + EXIT_DRAIN;
                        while let Ok(line) = rx.recv_deadline(deadline) {
                            self.handle_line(&mut collected, line);
                        }
                        debug!(command = %command_line, "renderer exited with its pipes still open");
                        break Stop::Exited(exit);
                    }
                    if last_activity.elapsed() >= request.idle_timeout {
                        warn!(
                            command = %command_line,
                            idle_secs = last_activity.elapsed().as_secs(),
                            last_progress = ?collected.last_progress,
                            "renderer produced no output within the idle timeout, killing it"
                        );
                        break Stop::Kill(RenderStatus::TimedOut);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    for reader in readers.drain(..) {
                        let _ = reader.join();
                    }
                    break Stop::Exited(child.wait().map_err(|source| RenderError::Wait { source })?);
                }
            }
        };

        let (status, exit_code) = match stop {
            Stop::Kill(status) => {
                kill(&mut child);
                (status, None)
            }
            Stop::Exited(exit) => {
                let status = if !exit.success() {
                    RenderStatus::Failed
                } else if collected.errors.is_empty() && collected.warnings.is_empty() {
                    RenderStatus::Succeeded
                } else {
                    RenderStatus::WarningsDetected
                };
                (status, exit.code())
            }
        };

        let outcome = RenderOutcome {
            format: request.format,
            status,
            exit_code,
            warnings: collected.warnings,
            errors: collected.errors,
            last_progress: collected.last_progress,
            lines: collected.lines,
            fail_on_warnings: request.fail_on_warnings,
            duration: start.elapsed(),
        };
        info!(
            format = %outcome.format,
            status = ?outcome.status,
            exit_code = ?outcome.exit_code,
            warnings = outcome.warnings.len(),
            errors = outcome.errors.len(),
            elapsed_ms = outcome.duration.as_millis() as u64,
            "renderer finished"
        );
        Ok(outcome)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    fn handle_line(&self, collected: &mut Collected, line: OutputLine) {
        collected.lines += 1;
        if let Some(progress) = parse_progress(&line.text) {
            info!(current = progress.current, total = progress.total, file = %progress.file, "render progress");
            collected.last_progress = Some(progress);
            return;
        }
        match self.classifier.classify(&line.text) {
            LineClass::Error => {
                error!(stream = ?line.stream, "{}", line.text);
                collected.errors.push(line.text);
            }
            LineClass::Warning => {
                warn!(stream = ?line.stream, "{}", line.text);
                collected.warnings.push(line.text);
            }
            LineClass::Info => debug!(stream = ?line.stream, "{}", line.text),
        }
    }
}

/// Forward lines from `pipe` until EOF or until the receiver is gone.
fn spawn_reader<R>(pipe: R, stream: Stream, tx: Sender<OutputLine>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c| c == '\n' || c == '\r')
                        .to_string();
                    if tx.send(OutputLine { stream, text }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(?stream, error = %e, "renderer pipe read failed");
                    break;
                }
            }
        }
    })
}

/// Reader threads are left to end on their own: a grandchild may still
/// hold the pipes open.
fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "renderer already exited");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "could not reap renderer");
    }
}
