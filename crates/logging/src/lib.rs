#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! Installs the `tracing_subscriber` formatter the relay binary logs
//! through, gated by the `-v` flag the legacy reference checks before every
//! `print >> sys.stderr` call. There is exactly one knob: [`Verbosity`].
//!
//! # Design
//!
//! [`init`] is idempotent-enough for this binary's needs (it is called once,
//! from `main`, before the accept loop starts) but does not itself guard
//! against a second call; `tracing_subscriber::fmt().try_init()` reports an
//! error instead of panicking if a global subscriber is already installed,
//! and `init` swallows that error since a relay run only ever calls it once.

use tracing_subscriber::EnvFilter;

/// How much the relay should log to stderr.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet,
    /// Connection lifecycle events too (`-v`), matching the legacy
    /// reference's verbose accept/connect/close/child-exit messages.
    Verbose,
}

impl Verbosity {
    /// Resolves the `-v` CLI flag to a verbosity level.
    pub fn from_flag(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Quiet
        }
    }

    fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Verbose => "info",
        }
    }
}

/// Installs a `tracing_subscriber::fmt` subscriber writing to stderr at
/// `verbosity`'s level. Safe to call once per process; a second call is a
/// no-op (the subscriber is already installed).
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
