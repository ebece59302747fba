//! Accept/connect/forward loop: wires the codec stack in `filters` and
//! `bitstream` onto real sockets for one relay run.
//!
//! # Design
//!
//! The legacy reference drives each connection with a `select()` loop across
//! both sockets and the plaintext pipe. Idiomatic synchronous Rust has no
//! built-in equivalent, so this implementation alternates short-timeout reads
//! on the two [`TcpStream`]s instead — see [`ForwardingWorker::run`].
//!
//! Only one connection is serviced at a time: the plaintext peer (stdin, or a
//! `-c <command>` child) is attached once per relay run, and the codec
//! pipeline built around it is reused, connection after connection, rather
//! than rebuilt — two connections running concurrently would race over the
//! same covert bit stream. A dedicated thread feeds the shared
//! [`SyncFifo`](crate::fifo::SyncFifo) from the plaintext source's blocking
//! reads (mirroring `spec.md`'s synchronized-buffer contract: one thread
//! writes plaintext bytes in, another reads them out), while the accept loop
//! and every connection's forwarding both run on this process's main thread.
//!
//! Exactly one authentication pair exists in the whole system: the client's
//! encode direction prepends the shared password to its covert bits, and the
//! server's decode direction verifies it. The server's own encode direction
//! (the response path) carries no second password preamble; it is simply
//! gated off by [`BinaryOnOffReader`] until the request direction's
//! authentication succeeds. `DESIGN.md` records this as the resolution of
//! `spec.md` §9's dedup/mutual-auth open question.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use bitstream::{
    AuthEvent, BinaryAuthenticateReader, BinaryAuthenticateWriter, BinaryOnOffReader, BinaryReader,
    BinaryTransactionReader, BinaryTransactionWriter, BinaryWriter, BitSink, BitSource, PacketReader,
    PacketWriter,
};
use filters::{
    Filter, FilterState, HtmlTagsPermutFilterIn, HtmlTagsPermutFilterOut, HttpDataExtractorFilter,
    HttpHeaderHostChanger, HttpHeaderPermutFilterIn, HttpHeaderPermutFilterOut, SerialFilterGroup,
    DEFAULT_CHUNK_SIZE,
};

use crate::config::{Mode, RelayConfig};
use crate::error::RelayError;
use crate::fifo::SyncFifo;
use crate::pipe::WriterSink;
use crate::process;

/// How long a socket read blocks before the worker re-checks the stop flag,
/// and how long the accept loop sleeps between non-blocking accept attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Commits or rolls back a transactional bit reader/writer whose concrete
/// type is otherwise erased behind a [`Filter`]'s generic bit source/sink.
trait Transactional {
    fn commit(&self);
    fn rollback(&self);
}

impl<R: BitSource> Transactional for Rc<RefCell<BinaryTransactionReader<R>>> {
    fn commit(&self) {
        self.borrow_mut().commit();
    }
    fn rollback(&self) {
        self.borrow_mut().rollback();
    }
}

impl<W: BitSink> Transactional for Rc<RefCell<BinaryTransactionWriter<W>>> {
    fn commit(&self) {
        self.borrow_mut().commit();
    }
    fn rollback(&self) {
        self.borrow_mut().rollback();
    }
}

/// One direction's filter chain plus the transactional bit layer the
/// forwarding worker commits or rolls back once it knows whether the bytes
/// that chain produced reached their destination.
struct Direction {
    filter: Box<dyn Filter>,
    txn: Box<dyn Transactional>,
}

impl Direction {
    fn new(filter: Box<dyn Filter>, txn: impl Transactional + 'static) -> Self {
        Self {
            filter,
            txn: Box::new(txn),
        }
    }

    /// Resets the filter chain and discards any uncommitted bits, the way a
    /// fresh connection (or a prior connection's abrupt close) requires.
    fn reset(&mut self) {
        self.filter.reset();
        self.txn.rollback();
    }
}

type TxnReader = Rc<RefCell<BinaryTransactionReader<BinaryReader<PacketReader<Arc<SyncFifo>>>>>>;
type TxnWriter = Rc<RefCell<BinaryTransactionWriter<BinaryWriter<PacketWriter<WriterSink>>>>>;

fn txn_reader(source: Arc<SyncFifo>) -> TxnReader {
    Rc::new(RefCell::new(BinaryTransactionReader::new(BinaryReader::new(PacketReader::new(source)))))
}

fn txn_writer(sink: WriterSink) -> TxnWriter {
    Rc::new(RefCell::new(BinaryTransactionWriter::new(BinaryWriter::new(PacketWriter::new(sink)))))
}

/// Builds the client side's two directions: header-permutation encoding of
/// covert bits (read from the local plaintext source, prefixed with the
/// shared password) into the outgoing request stream, and header- plus
/// HTML-tag-permutation decoding of the response stream back into the local
/// plaintext sink.
fn build_client_directions(
    config: &RelayConfig,
    source: Arc<SyncFifo>,
    sink: WriterSink,
) -> Result<(Direction, Direction), RelayError> {
    let reader = txn_reader(source);
    let auth_reader = BinaryAuthenticateReader::new(reader.clone(), &config.password);
    let encode = HttpHeaderPermutFilterIn::new(auth_reader)?;

    let writer = txn_writer(sink);
    let decode = SerialFilterGroup::new(vec![
        Box::new(HttpHeaderPermutFilterOut::new(writer.clone())?),
        Box::new(HttpDataExtractorFilter::new(
            HtmlTagsPermutFilterOut::new(writer.clone())?,
            DEFAULT_CHUNK_SIZE,
        )?),
    ]);

    Ok((Direction::new(Box::new(encode), reader), Direction::new(Box::new(decode), writer)))
}

/// Builds the server side's two directions, in `(near_to_far, far_to_near)`
/// order matching [`run`]'s destructuring: first, header decoding (verifying
/// the shared password, then rewriting the `Host` header) of the inbound
/// request stream arriving from the near (client-relay) side and forwarded
/// to the real upstream host on the far side; second, header- plus
/// HTML-tag-permutation encoding of covert bits into the upstream's response
/// stream as it flows back from far to near, silenced by
/// [`BinaryOnOffReader`] until the request direction authenticates.
fn build_server_directions(
    config: &RelayConfig,
    source: Arc<SyncFifo>,
    sink: WriterSink,
) -> Result<(Direction, Direction), RelayError> {
    let reader = txn_reader(source);
    let gate = Rc::new(RefCell::new(BinaryOnOffReader::new(reader.clone(), true)));
    let encode = SerialFilterGroup::new(vec![
        Box::new(HttpHeaderPermutFilterIn::new(gate.clone())?),
        Box::new(HttpDataExtractorFilter::new(HtmlTagsPermutFilterIn::new(gate.clone())?, DEFAULT_CHUNK_SIZE)?),
    ]);

    let writer = txn_writer(sink);
    let mut auth_writer = BinaryAuthenticateWriter::new(writer.clone(), &config.password, false);
    auth_writer.set_callback(Box::new(move |event| {
        if event == AuthEvent::Authenticated {
            gate.borrow_mut().set_enabled(true);
        }
    }));
    let decode = SerialFilterGroup::new(vec![
        Box::new(HttpHeaderPermutFilterOut::new(Rc::new(RefCell::new(auth_writer)))?),
        Box::new(HttpHeaderHostChanger::new(format!("{}:{}", config.remote_host, config.remote_port))?),
    ]);

    Ok((Direction::new(Box::new(decode), writer), Direction::new(Box::new(encode), reader)))
}

fn would_block(err: &std::io::Error) -> bool {
    matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
}

/// Binds a listening socket at `addr` with `SO_REUSEADDR` set, so a relay
/// restarted right after a previous run (sockets still in `TIME_WAIT`) does
/// not fail to rebind its own listening port. `std::net::TcpListener::bind`
/// has no portable way to set socket options before binding, hence building
/// the socket through `socket2` first and handing it off to `std` once bound.
fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    Ok(socket.into())
}

/// Feeds bytes read (blocking) from the plaintext source into `sink` until
/// the source is closed. Runs for the whole relay run, independent of how
/// many connections the accept loop services in turn.
fn spawn_feeder(mut reader: Box<dyn Read + Send>, sink: Arc<SyncFifo>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    for &b in &buf[..n] {
                        sink.push(b);
                    }
                }
            }
        }
    })
}

/// Pushes one byte through `direction`'s filter chain; once it reaches
/// [`FilterState::Pass`], writes the produced bytes to `dest` and commits (or
/// rolls back, on write failure) the direction's transactional bit layer.
/// Returns `Err` if the connection must be torn down (a fatal filter error,
/// or a failed write to `dest`).
fn pump_byte(byte: u8, direction: &mut Direction, dest: &mut TcpStream) -> Result<(), ()> {
    let state = direction.filter.write(byte).map_err(|_| ())?;
    if state != FilterState::Pass {
        return Ok(());
    }
    let out = direction.filter.read().map_err(|_| ())?;
    direction.filter.reset();
    match dest.write_all(&out) {
        Ok(()) => {
            direction.txn.commit();
            Ok(())
        }
        Err(_) => {
            direction.txn.rollback();
            Err(())
        }
    }
}

/// Drives one accepted connection to completion, alternating timeout-bounded
/// reads across `near` and `far` instead of `select()`-ing on both at once.
/// Borrows (rather than owns) the pipeline's two directions so the same
/// codec state — and the `SyncFifo`/child-process handles underneath it —
/// carries over to the next connection the accept loop services.
struct ForwardingWorker<'a> {
    near: TcpStream,
    far: TcpStream,
    near_to_far: &'a mut Direction,
    far_to_near: &'a mut Direction,
    stop: Arc<AtomicBool>,
}

impl ForwardingWorker<'_> {
    fn run(mut self) {
        let _ = self.near.set_read_timeout(Some(POLL_INTERVAL));
        let _ = self.far.set_read_timeout(Some(POLL_INTERVAL));

        let mut near_open = true;
        let mut far_open = true;
        let mut buf = [0u8; 1];

        while (near_open || far_open) && !self.stop.load(Ordering::Relaxed) {
            if near_open {
                match self.near.read(&mut buf) {
                    Ok(0) => {
                        near_open = false;
                        let _ = self.far.shutdown(Shutdown::Write);
                    }
                    Ok(_) => {
                        if pump_byte(buf[0], self.near_to_far, &mut self.far).is_err() {
                            near_open = false;
                            far_open = false;
                        }
                    }
                    Err(e) if would_block(&e) => {}
                    Err(_) => {
                        near_open = false;
                        let _ = self.far.shutdown(Shutdown::Write);
                    }
                }
            }

            if far_open {
                match self.far.read(&mut buf) {
                    Ok(0) => {
                        far_open = false;
                        let _ = self.near.shutdown(Shutdown::Write);
                    }
                    Ok(_) => {
                        if pump_byte(buf[0], self.far_to_near, &mut self.near).is_err() {
                            near_open = false;
                            far_open = false;
                        }
                    }
                    Err(e) if would_block(&e) => {}
                    Err(_) => {
                        far_open = false;
                        let _ = self.near.shutdown(Shutdown::Write);
                    }
                }
            }
        }

        self.near_to_far.reset();
        self.far_to_near.reset();
    }
}

/// Runs a relay: binds `config.bind_host:config.bind_port`, attaches the
/// plaintext peer, builds the mode-appropriate codec pipeline once, and
/// services accepted connections one at a time (connecting out to
/// `config.remote_host:config.remote_port` for each) until `stop` is set.
pub fn run(config: &RelayConfig, stop: Arc<AtomicBool>) -> Result<(), RelayError> {
    let bind_addr = format!("{}:{}", config.bind_host, config.bind_port);
    let resolved = std::net::ToSocketAddrs::to_socket_addrs(&bind_addr)
        .map_err(|e| RelayError::Bind(bind_addr.clone(), e))?
        .next()
        .ok_or_else(|| {
            RelayError::Bind(bind_addr.clone(), std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address resolved"))
        })?;
    let listener = bind_listener(resolved).map_err(|e| RelayError::Bind(bind_addr.clone(), e))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| RelayError::Bind(bind_addr.clone(), e))?;
    tracing::info!(bind = %bind_addr, mode = ?config.mode, "listening");

    let plaintext = process::attach(config.command.as_deref())?;
    let source = SyncFifo::shared();
    let _feeder = spawn_feeder(plaintext.reader, source.clone());
    let sink = WriterSink::new(plaintext.writer);
    let mut child = plaintext.child;

    let (mut near_to_far, mut far_to_near) = match config.mode {
        Mode::Client => build_client_directions(config, source, sink)?,
        Mode::Server => build_server_directions(config, source, sink)?,
    };

    let remote_addr = format!("{}:{}", config.remote_host, config.remote_port);

    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((near, peer)) => {
                tracing::info!(%peer, "accepted connection");
                near_to_far.reset();
                far_to_near.reset();
                match TcpStream::connect(&remote_addr) {
                    Ok(far) => {
                        ForwardingWorker {
                            near,
                            far,
                            near_to_far: &mut near_to_far,
                            far_to_near: &mut far_to_near,
                            stop: stop.clone(),
                        }
                        .run();
                    }
                    Err(e) => {
                        tracing::warn!(remote = %remote_addr, error = %e, "failed to connect upstream");
                    }
                }
            }
            Err(e) if would_block(&e) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    if let Some(child) = child.as_mut() {
        match child.wait() {
            Ok(status) => tracing::info!(%status, "child process exited"),
            Err(e) => tracing::warn!(error = %e, "failed to wait for child process"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn bind_listener_accepts_a_loopback_connection() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(listener.accept().is_ok());
    }

    fn test_config(mode: Mode, bind_port: u16, remote_port: u16) -> RelayConfig {
        RelayConfig {
            mode,
            bind_host: "127.0.0.1".to_string(),
            bind_port,
            remote_host: "127.0.0.1".to_string(),
            remote_port,
            password: b"hunter2".to_vec(),
            command: None,
            verbose: false,
        }
    }

    #[test]
    fn client_directions_build_successfully() {
        let config = test_config(Mode::Client, 0, 0);
        let source = SyncFifo::shared();
        let sink = WriterSink::new(Box::new(Cursor::new(Vec::new())));
        assert!(build_client_directions(&config, source, sink).is_ok());
    }

    #[test]
    fn server_directions_build_successfully() {
        let config = test_config(Mode::Server, 0, 0);
        let source = SyncFifo::shared();
        let sink = WriterSink::new(Box::new(Cursor::new(Vec::new())));
        assert!(build_server_directions(&config, source, sink).is_ok());
    }

    #[test]
    fn client_encode_direction_embeds_password_then_payload_header_order() {
        // Two distinct headers -> 1 bit of efficiency per message. Seed the
        // plaintext source with payload bits that would pick the
        // non-alphabetical ordering once the password preamble is exhausted.
        let config = test_config(Mode::Client, 0, 0);
        let source = SyncFifo::shared();
        for &b in b"hunter2" {
            source.push(b);
        }
        source.push(0xFF);
        let sink = WriterSink::new(Box::new(Cursor::new(Vec::new())));
        let (mut encode, _decode) = build_client_directions(&config, source, sink).unwrap();

        let msg = b"GET / HTTP/1.1\r\nHost: a\r\nX-Foo: b\r\n\r\n";
        let mut last = FilterState::Empty;
        for &b in msg {
            last = encode.filter.write(b).unwrap();
            if last == FilterState::Pass {
                break;
            }
        }
        assert_eq!(last, FilterState::Pass);
        let out = encode.filter.read().unwrap();
        // the header lines reach the wire in some order, whichever the
        // password-then-payload bit stream picked; either order is a valid
        // permutation of the same two headers.
        assert!(out.windows(6).any(|w| w == b"Host: "));
        assert!(out.windows(7).any(|w| w == b"X-Foo: "));
    }

    /// A `Write` sink a test can inspect after the fact, standing in for the
    /// plaintext pipe a real relay run hands to [`WriterSink`].
    #[derive(Clone, Default)]
    struct CaptureWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn client_encode_to_server_decode_recovers_one_covert_byte_past_the_password() {
        // A full loopback of the request direction: the client's encode
        // chain embeds the password then one source byte, one covert bit at
        // a time, into successive two-header requests; the server's decode
        // chain (the near_to_far direction `build_server_directions`
        // returns) authenticates and writes the recovered bits to its own
        // plaintext sink. Exercises the near/far wiring `run` depends on,
        // not just each side's codec in isolation.
        let password = b"p".to_vec();
        let client_config = test_config(Mode::Client, 0, 0);
        let client_config = RelayConfig { password: password.clone(), ..client_config };
        let server_config = test_config(Mode::Server, 0, 0);
        let server_config = RelayConfig { password, ..server_config };

        let client_source = SyncFifo::shared();
        client_source.push(0xC3);
        let client_sink = WriterSink::new(Box::new(Cursor::new(Vec::new())));
        let (mut client_encode, _client_decode) =
            build_client_directions(&client_config, client_source, client_sink).unwrap();

        let captured = CaptureWriter::default();
        let server_source = SyncFifo::shared(); // unused: this test only drives the request direction
        let server_sink = WriterSink::new(Box::new(captured.clone()));
        let (mut server_near_to_far, _server_far_to_near) =
            build_server_directions(&server_config, server_source, server_sink).unwrap();

        let msg = b"GET / HTTP/1.1\r\nHost: a\r\nX-Foo: b\r\n\r\n";
        // 8 messages carry the one-byte password, 9 more flush exactly one
        // 9-bit packet of payload (1 covert bit/message here, two headers).
        for _ in 0..20 {
            let mut last = FilterState::Empty;
            for &b in msg {
                last = client_encode.filter.write(b).unwrap();
                if last == FilterState::Pass {
                    break;
                }
            }
            assert_eq!(last, FilterState::Pass);
            let wire = client_encode.filter.read().unwrap();
            client_encode.filter.reset();
            client_encode.txn.commit();

            let mut last = FilterState::Empty;
            for &b in &wire {
                last = server_near_to_far.filter.write(b).unwrap();
                if last == FilterState::Pass {
                    break;
                }
            }
            assert_eq!(last, FilterState::Pass);
            server_near_to_far.filter.read().unwrap();
            server_near_to_far.filter.reset();
            server_near_to_far.txn.commit();

            if !captured.0.lock().unwrap().is_empty() {
                break;
            }
        }

        assert_eq!(*captured.0.lock().unwrap(), vec![0xC3]);
    }
}
