//! Byte-stream transport used by the client.
//!
//! The engine never owns a socket type directly: each channel is any
//! [`Transport`], so the same code runs over a TCP stream, a TLS wrapper
//! provided by the caller, or a scripted stream in tests.
//!
//! The contract mirrors a blocking network client:
//!
//! - [`available`](Transport::available) reports buffered bytes and never blocks
//! - [`read`](Transport::read) blocks until at least one byte arrives, `Ok(0)` is EOF
//! - [`connect`](Transport::connect) is called lazily when
//!   [`connected`](Transport::connected) turns false

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A connected-or-connectable byte stream.
pub trait Transport {
    /// Whether the stream is currently connected.
    fn connected(&self) -> bool;

    /// (Re)connect to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Read into `buf`, blocking until data arrives. `Ok(0)` means the peer closed.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// [`Transport`] over a plain [`TcpStream`].
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Option<Duration>,
}

impl TcpTransport {
    /// A disconnected transport; the client connects it on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the TCP handshake duration.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn drop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

impl Transport for TcpTransport {
    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.drop_stream();
        let stream = match self.connect_timeout {
            Some(timeout) => {
                let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no address resolved");
                let mut connected = None;
                for addr in std::net::ToSocketAddrs::to_socket_addrs(&(host, port))? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_err = e,
                    }
                }
                connected.ok_or(last_err)?
            }
            None => TcpStream::connect((host, port))?,
        };
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn available(&mut self) -> usize {
        let Some(stream) = self.stream.as_ref() else {
            return 0;
        };
        if stream.set_nonblocking(true).is_err() {
            self.drop_stream();
            return 0;
        }
        let mut probe = [0u8; 1024];
        let peeked = stream.peek(&mut probe);
        let _ = stream.set_nonblocking(false);
        match peeked {
            Ok(0) => {
                // Orderly shutdown by the peer.
                self.drop_stream();
                0
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(_) => {
                self.drop_stream();
                0
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        match stream.read(buf) {
            Ok(0) => {
                self.drop_stream();
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.drop_stream();
                Err(e)
            }
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let result = stream.write_all(buf).and_then(|_| stream.flush());
        if result.is_err() {
            self.drop_stream();
        }
        result
    }
}

/// Scripted in-memory transport for unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::Transport;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub(crate) struct MockState {
        pub connected: bool,
        pub refuse_connect: bool,
        pub connects: usize,
        pub inbound: VecDeque<u8>,
        /// Replies queued behind each written request, in order.
        pub replies: VecDeque<Vec<u8>>,
        pub written: Vec<String>,
        /// Upper bound on bytes handed out per `read` call.
        pub fragment: Option<usize>,
    }

    /// Cloneable handle: the client owns one clone, the test keeps another.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockTransport {
        pub state: Rc<RefCell<MockState>>,
    }

    impl MockTransport {
        pub fn connected() -> Self {
            let mock = MockTransport::default();
            mock.state.borrow_mut().connected = true;
            mock
        }

        pub fn push_inbound(&self, bytes: &[u8]) {
            self.state.borrow_mut().inbound.extend(bytes.iter().copied());
        }

        pub fn reply(&self, bytes: &[u8]) {
            self.state.borrow_mut().replies.push_back(bytes.to_vec());
        }

        pub fn written(&self) -> Vec<String> {
            self.state.borrow().written.clone()
        }

        /// Request lines (`GET /path HTTP/1.1`) of everything written so far.
        pub fn request_lines(&self) -> Vec<String> {
            self.state
                .borrow()
                .written
                .iter()
                .filter_map(|request| request.lines().next().map(str::to_string))
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn connected(&self) -> bool {
            self.state.borrow().connected
        }

        fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
            let mut state = self.state.borrow_mut();
            state.connects += 1;
            if state.refuse_connect {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            state.connected = true;
            Ok(())
        }

        fn available(&mut self) -> usize {
            let state = self.state.borrow();
            match state.fragment {
                Some(limit) => state.inbound.len().min(limit),
                None => state.inbound.len(),
            }
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut state = self.state.borrow_mut();
            let limit = state.fragment.unwrap_or(usize::MAX).min(buf.len());
            let mut n = 0;
            while n < limit {
                match state.inbound.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            if n == 0 {
                state.connected = false;
            }
            Ok(n)
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            let mut state = self.state.borrow_mut();
            if !state.connected {
                return Err(io::Error::from(io::ErrorKind::NotConnected));
            }
            state.written.push(String::from_utf8_lossy(buf).into_owned());
            if let Some(reply) = state.replies.pop_front() {
                state.inbound.extend(reply);
            }
            Ok(())
        }
    }
}
