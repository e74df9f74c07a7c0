//! Minimal demonstration binary: open a serial port, optionally load a
//! `ControlParameters` TOML file, and stream a G-code program through it.
//!
//! This is an external harness, not part of the core's tested surface —
//! the core is the library (`levelctl::controller`, `::rewriter`,
//! `::probe`, `::interpolator`); a real deployment wires its own UI to
//! the same `Controller` handle used here.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Once;

use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use levelctl::config::{self, ControlParameters};
use levelctl::controller::{Controller, ControllerEvent};
use levelctl::controller::transport::SerialPortTransport;

struct Args {
    port: String,
    baud_rate: u32,
    config: Option<PathBuf>,
    program: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut argv = std::env::args().skip(1);
    let port = argv.next()?;
    let mut baud_rate = 250_000;
    let mut config = None;
    let mut program = None;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--baud" => baud_rate = argv.next()?.parse().ok()?,
            "--config" => config = Some(PathBuf::from(argv.next()?)),
            other => program = Some(PathBuf::from(other)),
        }
    }

    Some(Args {
        port,
        baud_rate,
        config,
        program,
    })
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let file_appender = tracing_appender::rolling::never(log_dir, "levelctl.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!(target: "panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn load_config(path: Option<&Path>) -> ControlParameters {
    match path {
        None => ControlParameters::default(),
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match config::parse(&text) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!(error = %e, path = %path.display(), "invalid control parameters, using defaults");
                    ControlParameters::default()
                }
            },
            Err(e) => {
                error!(error = %e, path = %path.display(), "could not read config file, using defaults");
                ControlParameters::default()
            }
        },
    }
}

fn main() {
    let _guard = configure_logging();
    install_panic_hook();

    let Some(args) = parse_args() else {
        eprintln!("usage: levelctl <serial-port> [--baud <rate>] [--config <path>] [program.gcode]");
        std::process::exit(2);
    };

    let config = load_config(args.config.as_deref());

    let transport = match SerialPortTransport::open(&args.port, args.baud_rate) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, port = %args.port, "failed to open serial port");
            std::process::exit(1);
        }
    };

    let (events_tx, events_rx) = mpsc::channel();
    let event_log = std::thread::spawn(move || {
        while let Ok(event) = events_rx.recv() {
            match event {
                ControllerEvent::SendMsg(msg) => info!(target: "firmware", "{msg}"),
                ControllerEvent::AddList(line) => info!(target: "tx", "{line}"),
                event => info!(target: "controller", ?event, "event"),
            }
        }
    });

    let wait_sec = config.wait_time.max(1);
    let controller = match Controller::spawn(transport, config, events_tx, wait_sec) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "controller handshake failed");
            std::process::exit(1);
        }
    };

    if let Some(program) = args.program {
        match controller.stream_file(program.clone()) {
            Ok(outcome) => info!(?outcome, path = %program.display(), "program streamed"),
            Err(e) => error!(error = %e, path = %program.display(), "streaming failed"),
        }
    } else {
        info!("no program file given, holding the connection open");
    }

    drop(controller);
    let _ = event_log.join();
}
