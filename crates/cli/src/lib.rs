#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! Parses the relay binary's fixed positional argument grammar — `relay
//! <client|server> <bindhost> <bindport> <remotehost> <remoteport>
//! <password> [-c <command>] [-v]` — into an [`engine::RelayConfig`], installs
//! logging, and runs the accept loop to completion.
//!
//! # Design
//!
//! `clap`'s derive API parses into [`Args`], a type this crate owns; `engine`
//! never sees a `clap` type, only the plain [`engine::RelayConfig`] [`Args`]
//! is converted into. `--help`/`--version` are handled entirely by `clap`
//! before [`run`] touches `engine` at all.
//!
//! # Exit codes
//!
//! [`ExitCode`] gives the process three outcomes: a clean run or a clean
//! `Ctrl-C` shutdown (`Ok`), a usage error `clap` itself reports (`Usage`),
//! or a fatal [`engine::RelayError`] (`Fatal`).

use std::ffi::OsString;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use engine::{Mode, RelayConfig};

/// Parsed CLI surface: `relay <client|server> <bindhost> <bindport>
/// <remotehost> <remoteport> <password> [-c <command>] [-v]`.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Structural-steganography HTTP/TCP relay", long_about = None)]
struct Args {
    /// Which side of the tunnel to run.
    mode: ModeArg,
    /// Local interface to listen on.
    bind_host: String,
    /// Local TCP port to listen on.
    bind_port: u16,
    /// Remote host to connect out to once a local peer has connected.
    remote_host: String,
    /// Remote TCP port to connect out to.
    remote_port: u16,
    /// Shared password gating the covert channel. This authenticates the
    /// channel, not the traffic it carries in clear — see the crate's
    /// Non-goals around confidentiality.
    password: String,
    /// Runs <command> as the plaintext peer instead of this process's own
    /// stdin/stdout.
    #[arg(short = 'c', long = "command")]
    command: Option<String>,
    /// Emits connection lifecycle events to stderr.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ModeArg {
    /// Listens for the plaintext TCP client.
    Client,
    /// Listens for steganographically encoded traffic.
    Server,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Client => Mode::Client,
            ModeArg::Server => Mode::Server,
        }
    }
}

impl From<Args> for RelayConfig {
    fn from(args: Args) -> Self {
        RelayConfig {
            mode: args.mode.into(),
            bind_host: args.bind_host,
            bind_port: args.bind_port,
            remote_host: args.remote_host,
            remote_port: args.remote_port,
            password: args.password.into_bytes(),
            command: args.command,
            verbose: args.verbose,
        }
    }
}

/// The process exit code a relay invocation produces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ExitCode {
    /// Ran (and, for a long-lived relay, shut down) cleanly.
    Ok = 0,
    /// The arguments could not be parsed; `clap` already printed why.
    Usage = 1,
    /// A fatal [`engine::RelayError`] ended the run.
    Fatal = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

/// Parses `args`, installs logging, and runs the relay to completion (or
/// until `stop` is set, see [`stop_flag`]), returning the process's exit
/// code.
pub fn run<I, T>(args: I, stop: Arc<AtomicBool>) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let parsed = match Args::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => ExitCode::Ok,
                _ => ExitCode::Usage,
            };
        }
    };

    logging::init(logging::Verbosity::from_flag(parsed.verbose));

    let config = RelayConfig::from(parsed);
    match engine::run(&config, stop) {
        Ok(()) => ExitCode::Ok,
        Err(err) => {
            tracing::error!(error = %err, "relay run failed");
            ExitCode::Fatal
        }
    }
}

/// Builds the stop flag `run` watches, with `SIGINT` wired to set it via
/// `signal_hook`'s async-signal-safe flag registration (`spec.md` §6:
/// "Signals: SIGINT causes a clean shutdown"). A second `SIGINT` before the
/// accept loop notices the first is handled the same way every other wake
/// of the poll interval is: the flag is already set, so the loop simply
/// exits the next time it checks.
pub fn stop_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag)) {
        tracing::warn!(%err, "failed to install SIGINT handler; Ctrl-C will terminate the process immediately");
    }
    flag
}
