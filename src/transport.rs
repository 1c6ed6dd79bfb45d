//! Socket transport to the playback service.
//!
//! The transport owns exactly one connection and performs blocking,
//! newline-terminated frame exchange with a bounded timeout on every read
//! and write. It knows nothing about opcodes or responses; the client
//! drives it one request at a time.
//!
//! [`Transport`] is the seam used by the client, so that tests can swap in
//! an in-memory implementation.

use std::{
    fmt,
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpStream},
    time::Duration,
};

use crate::{
    error::{Error, Result},
    protocol::TERMINATOR,
};

/// Lifecycle of a connection handle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connected = 1,
    /// The last operation failed. Only [`Transport::connect`] leaves this
    /// state.
    Errored = 2,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Errored,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Errored => write!(f, "errored"),
        }
    }
}

/// Blocking frame exchange with the playback service.
pub trait Transport: Send {
    /// Opens a fresh connection, closing any previous one first.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached.
    fn connect(&mut self) -> Result<()>;

    /// Writes one frame. The terminator is added by the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed, broken, or the write
    /// timed out.
    fn write(&mut self, frame: &str) -> Result<()>;

    /// Reads one frame, without its terminator. An empty line is returned
    /// as an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed, broken, or the read
    /// timed out.
    fn read(&mut self) -> Result<String>;

    /// Closes the connection. Safe to call on a closed handle.
    fn close(&mut self);

    fn state(&self) -> ConnectionState;
}

/// Appends the terminator, so that a frame goes out in a single write.
fn terminated(frame: &str) -> String {
    let mut line = String::with_capacity(frame.len() + TERMINATOR.len_utf8());
    line.push_str(frame);
    line.push(TERMINATOR);
    line
}

/// [`Transport`] over a TCP stream.
pub struct TcpTransport {
    address: SocketAddr,
    timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
    state: ConnectionState,
}

impl TcpTransport {
    #[must_use]
    pub fn new(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout,
            stream: None,
            state: ConnectionState::Disconnected,
        }
    }

    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    fn stream(&mut self) -> Result<&mut BufReader<TcpStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::unavailable("socket is not connected"))
    }

    /// Latches the errored state when `result` is an error.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = ConnectionState::Errored;
        }
        result
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        self.close();

        let result = (|| -> Result<TcpStream> {
            let stream = TcpStream::connect_timeout(&self.address, self.timeout)?;
            stream.set_read_timeout(Some(self.timeout))?;
            stream.set_write_timeout(Some(self.timeout))?;
            stream.set_nodelay(true)?;
            Ok(stream)
        })();

        let stream = self.track(result)?;
        debug!("connected to {}", self.address);
        self.stream = Some(BufReader::new(stream));
        self.state = ConnectionState::Connected;
        Ok(())
    }

    fn write(&mut self, frame: &str) -> Result<()> {
        trace!("-> {frame:?}");
        let result = self.stream().and_then(|stream| {
            let socket = stream.get_mut();
            socket.write_all(terminated(frame).as_bytes())?;
            socket.flush()?;
            Ok(())
        });
        self.track(result)
    }

    fn read(&mut self) -> Result<String> {
        let result = self.stream().and_then(|stream| {
            let mut line = String::new();
            if stream.read_line(&mut line)? == 0 {
                return Err(Error::unavailable("connection closed by service"));
            }
            if line.pop() != Some(TERMINATOR) {
                return Err(Error::data_loss("connection closed mid-frame"));
            }
            if line.ends_with('\r') {
                line.pop();
            }
            Ok(line)
        });

        let line = self.track(result)?;
        trace!("<- {line:?}");
        Ok(line)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.get_ref().shutdown(std::net::Shutdown::Both) {
                // The service may have closed its end already.
                trace!("error shutting down socket: {e}");
            }
            debug!("disconnected from {}", self.address);
        }
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
