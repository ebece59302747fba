//! Attaches an optional child process (`-c <command>`) in place of this
//! process's own stdin/stdout as the plaintext peer.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};

use crate::error::RelayError;

/// The plaintext-side read/write handles a relay loop drives, plus the child
/// process they belong to, if any.
pub struct Plaintext {
    /// Source of plaintext bytes to steganographically encode and forward.
    pub reader: Box<dyn Read + Send>,
    /// Sink for plaintext bytes decoded from the covert channel.
    pub writer: Box<dyn Write + Send>,
    /// The spawned child, if `-c <command>` was given; polled for an exit
    /// code once the connection loop ends.
    pub child: Option<Child>,
}

/// Spawns `command` (split on whitespace, matching the legacy reference) with
/// its stdout/stdin piped and its stderr merged into stdout, or falls back to
/// this process's own stdin/stdout when `command` is `None`.
pub fn attach(command: Option<&str>) -> Result<Plaintext, RelayError> {
    match command {
        None => Ok(Plaintext {
            reader: Box::new(std::io::stdin()),
            writer: Box::new(std::io::stdout()),
            child: None,
        }),
        Some(command) => {
            let words: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
            let Some((program, args)) = words.split_first() else {
                return Err(RelayError::EmptyCommand);
            };
            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| RelayError::ChildSpawn(words.clone(), e))?;
            let reader = child.stdout.take().expect("stdout was piped");
            let writer = child.stdin.take().expect("stdin was piped");
            Ok(Plaintext {
                reader: Box::new(reader),
                writer: Box::new(writer),
                child: Some(child),
            })
        }
    }
}
