//! Plain configuration data consumed by [`crate::run`], independent of
//! whatever argument-parsing library built it.

/// Which side of the tunnel to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Listens for the plaintext TCP client, forwards steganographically
    /// encoded traffic to the server side.
    Client,
    /// Listens for steganographically encoded traffic, forwards decoded
    /// plaintext to the real destination.
    Server,
}

/// Everything a relay run needs, resolved from CLI arguments into plain data.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Which side of the tunnel this process runs.
    pub mode: Mode,
    /// Local interface to listen on.
    pub bind_host: String,
    /// Local TCP port to listen on.
    pub bind_port: u16,
    /// Remote host to connect out to once a local peer has connected.
    pub remote_host: String,
    /// Remote TCP port to connect out to.
    pub remote_port: u16,
    /// Shared password authenticating the covert channel's bit preamble.
    pub password: Vec<u8>,
    /// Command to run as the plaintext peer instead of this process's own
    /// stdin/stdout, split on whitespace the way the legacy reference does.
    pub command: Option<String>,
    /// Emit progress/connection events to stderr.
    pub verbose: bool,
}
