//! The controller worker: owns the serial port and every piece of firmware
//! dialogue (request/response pairing, the startup handshake, the idle
//! poll, probing, and streaming a program file). Runs on its own OS
//! thread; the [`Controller`] handle talks to it over a channel so the
//! calling thread never blocks on serial I/O directly.

pub mod coords;
pub mod transport;

pub use coords::CoordinatePair;
pub use transport::SerialTransport;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::command::{Command, GCommand};
use crate::config::ControlParameters;
use crate::geometry::Point;
use crate::interpolator::{Interpolator, InterpolatorType};
use crate::probe::{self, Extent, LevelingError, ProbeLink};
use crate::rewriter::{self, Dispatcher, RewriterError, SendOutcome};

/// Marlin's per-line transmit buffer (§4.F); a line longer than this is
/// rejected before it is ever written to the port.
const TX_BUFFER_LEN: usize = 96;
const MARLIN_BANNER: &str = "Marlin";
const IDLE_POLL_ITERATION_CAP: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line exceeds the {TX_BUFFER_LEN}-byte transmit buffer: {0:?}")]
    LineTooLong(String),
    #[error("expecting Marlin version string")]
    HandshakeFailed,
    #[error("leveling error: {0}")]
    Leveling(#[from] LevelingError),
    #[error("error reading program file: {0}")]
    Rewriter(#[from] RewriterError),
    #[error("connection reset by user")]
    Reset,
    #[error("controller worker is not running")]
    WorkerGone,
}

/// One event the core emits toward a UI (or, headless, a log sink). The
/// corpus's signal/slot surface (`addList`, `sendMsg`, `updateCoordinates`,
/// ...) is modeled as variants of a single enum sent over an
/// `mpsc::Sender<ControllerEvent>`, since there is no GUI to wire real
/// slots to.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    AddList(String),
    SendMsg(String),
    PortOpened,
    PortClosed,
    UpdateCoordinates(CoordinatePair),
    SetLivePoint { x: f64, y: f64, mm: f64 },
    SetProgress(u8),
    LevelingProgress(usize),
    LevelingEnded,
    RecomputeOffsetEnded(f64),
    GcodeResult { id: u64, reply: String },
    StopSending,
    ResetTimer(bool),
}

enum ControllerRequest {
    SendLine {
        line: String,
        reply: Sender<Result<String, ControllerError>>,
    },
    StreamFile {
        path: PathBuf,
        reply: Sender<Result<SendOutcome, ControllerError>>,
    },
    LevelBed {
        extent: Extent,
        nx: usize,
        ny: usize,
        start_z: f64,
        travel_feed: f64,
        z_safe: f64,
        initial_offset: f64,
        kind: InterpolatorType,
        reply: Sender<Result<(), ControllerError>>,
    },
    RecomputeOffset {
        new_z: f64,
        reply: Sender<Result<f64, ControllerError>>,
    },
}

/// A handle to a running controller worker. Cloning is not supported —
/// there is exactly one owner of the request channel — but the
/// coordinate snapshot, current interpolator, and cancellation flags are
/// each cheaply shareable for a read-only UI thread.
pub struct Controller {
    requests: Option<Sender<ControllerRequest>>,
    coordinates: Arc<RwLock<CoordinatePair>>,
    interpolator: Arc<RwLock<Option<Interpolator>>>,
    abort: Arc<AtomicBool>,
    reset: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Controller {
    /// Opens the handshake with `transport` and spawns the worker thread.
    /// Blocks until the handshake completes or fails — a failed handshake
    /// never spawns a lingering worker.
    pub fn spawn<T>(
        transport: T,
        config: ControlParameters,
        events: Sender<ControllerEvent>,
        wait_sec: u64,
    ) -> Result<Self, ControllerError>
    where
        T: SerialTransport + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let coordinates = Arc::new(RwLock::new(CoordinatePair::default()));
        let interpolator = Arc::new(RwLock::new(None));
        let abort = Arc::new(AtomicBool::new(false));
        let reset = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut worker = Worker {
            transport,
            config,
            events,
            coordinates: coordinates.clone(),
            interpolator: interpolator.clone(),
            abort: abort.clone(),
            reset: reset.clone(),
            shutdown: shutdown.clone(),
        };

        let handle = thread::spawn(move || {
            if let Err(e) = worker.handshake(wait_sec) {
                let _ = ready_tx.send(Err(e));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            worker.run(req_rx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                requests: Some(req_tx),
                coordinates,
                interpolator,
                abort,
                reset,
                shutdown,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(ControllerError::WorkerGone)
            }
        }
    }

    fn send_request(&self, req: ControllerRequest) -> Result<(), ControllerError> {
        self.requests
            .as_ref()
            .ok_or(ControllerError::WorkerGone)?
            .send(req)
            .map_err(|_| ControllerError::WorkerGone)
    }

    pub fn send_line(&self, line: impl Into<String>) -> Result<String, ControllerError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_request(ControllerRequest::SendLine {
            line: line.into(),
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| ControllerError::WorkerGone)?
    }

    pub fn stream_file(&self, path: impl Into<PathBuf>) -> Result<SendOutcome, ControllerError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_request(ControllerRequest::StreamFile {
            path: path.into(),
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| ControllerError::WorkerGone)?
    }

    #[allow(clippy::too_many_arguments)]
    pub fn level_bed(
        &self,
        extent: Extent,
        nx: usize,
        ny: usize,
        start_z: f64,
        travel_feed: f64,
        z_safe: f64,
        initial_offset: f64,
        kind: InterpolatorType,
    ) -> Result<(), ControllerError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_request(ControllerRequest::LevelBed {
            extent,
            nx,
            ny,
            start_z,
            travel_feed,
            z_safe,
            initial_offset,
            kind,
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| ControllerError::WorkerGone)?
    }

    pub fn recompute_offset(&self, new_z: f64) -> Result<f64, ControllerError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_request(ControllerRequest::RecomputeOffset {
            new_z,
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| ControllerError::WorkerGone)?
    }

    /// A stable read snapshot of the last reported machine/work position.
    pub fn coordinates(&self) -> CoordinatePair {
        *self.coordinates.read().unwrap()
    }

    /// A stable read snapshot of the currently loaded interpolator, if any.
    pub fn interpolator(&self) -> Option<Interpolator> {
        self.interpolator.read().unwrap().clone()
    }

    /// Halts the program stream after the current command.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn clear_abort(&self) {
        self.abort.store(false, Ordering::SeqCst);
    }

    /// Abandons any outstanding response wait and re-opens the port.
    pub fn reset(&self) {
        self.reset.store(true, Ordering::SeqCst);
    }

    /// Irrecoverably stops the worker thread. Closing the request channel
    /// wakes the worker out of its blocking `recv`, which is the only
    /// place it can be parked between commands (§5's suspension points do
    /// not include an idle wait on this channel).
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owns the transport and runs entirely on the controller's OS thread.
/// Implements both [`Dispatcher`] and [`ProbeLink`] directly against the
/// transport, so the streaming rewriter and the probe driver need no
/// knowledge of channels, threads, or events.
struct Worker<T: SerialTransport> {
    transport: T,
    config: ControlParameters,
    events: Sender<ControllerEvent>,
    coordinates: Arc<RwLock<CoordinatePair>>,
    interpolator: Arc<RwLock<Option<Interpolator>>>,
    abort: Arc<AtomicBool>,
    reset: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl<T: SerialTransport> Worker<T> {
    fn handshake(&mut self, wait_sec: u64) -> Result<(), ControllerError> {
        self.transport.write_line("M115")?;
        for _ in 0..wait_sec.saturating_mul(10) {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(ControllerError::HandshakeFailed);
            }
            if let Some(line) = self.transport.poll_line(Duration::from_millis(100))? {
                if line.contains(MARLIN_BANNER) {
                    info!("handshake complete");
                    let _ = self.events.send(ControllerEvent::PortOpened);
                    return Ok(());
                }
            }
        }
        warn!("no Marlin banner within the handshake window");
        Err(ControllerError::HandshakeFailed)
    }

    fn run(mut self, requests: Receiver<ControllerRequest>) {
        while let Ok(req) = requests.recv() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match req {
                ControllerRequest::SendLine { line, reply } => {
                    let result = self.send_and_await_ok(&line);
                    let _ = reply.send(result);
                }
                ControllerRequest::StreamFile { path, reply } => {
                    let fourth_letter = self.config.fourth_axis_type.letter();
                    let config = self.config.clone();
                    let interp = self.interpolator.read().unwrap().clone();
                    let outcome = rewriter::send_file(
                        &path,
                        &mut self,
                        &config,
                        fourth_letter,
                        interp.as_ref(),
                    )
                    .map_err(ControllerError::from);
                    let _ = reply.send(outcome);
                    self.idle_poll();
                }
                ControllerRequest::LevelBed {
                    extent,
                    nx,
                    ny,
                    start_z,
                    travel_feed,
                    z_safe,
                    initial_offset,
                    kind,
                    reply,
                } => {
                    let result = probe::perform_z_leveling(
                        &mut self,
                        extent,
                        nx,
                        ny,
                        start_z,
                        travel_feed,
                        z_safe,
                        initial_offset,
                        kind,
                    );
                    match result {
                        Ok(interp) => {
                            *self.interpolator.write().unwrap() = Some(interp);
                            let _ = self.events.send(ControllerEvent::LevelingEnded);
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e.into()));
                        }
                    }
                }
                ControllerRequest::RecomputeOffset { new_z, reply } => {
                    let result = match self.interpolator.read().unwrap().as_ref() {
                        Some(interp) => Ok(interp.calculate_offset(new_z)),
                        None => Err(ControllerError::Leveling(LevelingError::Aborted)),
                    };
                    if let Ok(offset) = result {
                        let _ = self.events.send(ControllerEvent::RecomputeOffsetEnded(offset));
                    }
                    let _ = reply.send(result);
                }
            }
        }
        let _ = self.events.send(ControllerEvent::PortClosed);
    }

    /// Repeatedly polls `M114` until two consecutive replies settle on the
    /// same position, or the iteration cap is hit.
    fn idle_poll(&mut self) {
        let mut last = self.coordinates();
        for _ in 0..IDLE_POLL_ITERATION_CAP {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = self.send_and_await_ok("M114") {
                warn!(error = %e, "idle poll failed");
                return;
            }
            let current = self.coordinates();
            if current == last {
                return;
            }
            last = current;
        }
        warn!("idle poll exceeded its iteration cap without settling");
    }

    fn coordinates(&self) -> CoordinatePair {
        *self.coordinates.read().unwrap()
    }

    /// Sends one CR-terminated line and blocks until the firmware replies
    /// `ok` or `error`, or the user requests a reset/shutdown. Any reply
    /// line matching the position-report pattern updates the coordinate
    /// snapshot as a side effect rather than being returned to the caller.
    fn send_and_await_ok(&mut self, line: &str) -> Result<String, ControllerError> {
        if line.len() > TX_BUFFER_LEN {
            return Err(ControllerError::LineTooLong(line.to_string()));
        }
        self.transport.write_line(line)?;
        let _ = self.events.send(ControllerEvent::AddList(line.to_string()));

        let mut reply = String::new();
        loop {
            if self.reset.load(Ordering::SeqCst) {
                self.reset.store(false, Ordering::SeqCst);
                self.transport.reset()?;
                return Err(ControllerError::Reset);
            }
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(ControllerError::WorkerGone);
            }

            let Some(received) = self.transport.poll_line(Duration::from_millis(4))? else {
                continue;
            };

            if let Some(point) = coords::parse_position_reply(&received) {
                let pair = CoordinatePair::from_point(point);
                *self.coordinates.write().unwrap() = pair;
                let _ = self.events.send(ControllerEvent::UpdateCoordinates(pair));
                continue;
            }

            if received.contains("ok") {
                return Ok(reply);
            }
            if received.contains("error") {
                warn!(line = %received, "firmware reported error");
                return Ok(reply);
            }

            let _ = self.events.send(ControllerEvent::SendMsg(received.clone()));
            reply.push_str(&received);
            reply.push('\n');
        }
    }
}

impl<T: SerialTransport> Dispatcher for Worker<T> {
    type Error = ControllerError;

    fn dispatch(&mut self, line: &str) -> Result<(), Self::Error> {
        self.send_and_await_ok(line).map(|_| ())
    }

    fn should_abort(&self) -> bool {
        self.abort.load(Ordering::SeqCst) || self.shutdown.load(Ordering::SeqCst)
    }

    fn report_progress(&mut self, lines_done: usize, lines_total: usize) {
        let percent = if lines_total == 0 {
            100
        } else {
            ((lines_done * 100) / lines_total) as u8
        };
        let _ = self.events.send(ControllerEvent::SetProgress(percent));
    }

    fn track_position(&mut self, cmd: &GCommand) {
        if cmd.x().is_none() && cmd.y().is_none() && cmd.z().is_none() {
            return;
        }
        let mut current = self.coordinates();
        if let Some(x) = cmd.x() {
            current.machine.x = x;
            current.work.x = x;
        }
        if let Some(y) = cmd.y() {
            current.machine.y = y;
            current.work.y = y;
        }
        if let Some(z) = cmd.z() {
            current.machine.z = z;
            current.work.z = z;
        }
        *self.coordinates.write().unwrap() = current;
        let _ = self.events.send(ControllerEvent::UpdateCoordinates(current));
    }
}

impl<T: SerialTransport> ProbeLink for Worker<T> {
    fn send_command(&mut self, cmd: &Command) -> Result<String, LevelingError> {
        self.send_and_await_ok(&cmd.to_string())
            .map_err(|e| LevelingError::Transport(e.to_string()))
    }

    fn should_abort(&self) -> bool {
        self.abort.load(Ordering::SeqCst) || self.shutdown.load(Ordering::SeqCst)
    }

    fn report_progress(&mut self, cells_done: usize, _cells_total: usize) {
        let _ = self.events.send(ControllerEvent::LevelingProgress(cells_done));
    }
}
