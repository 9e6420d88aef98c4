use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

#[cfg(feature = "with-starttls")]
use native_tls::{HandshakeError, TlsConnector, TlsStream};
use tracing::debug;
use trust_dns_resolver::Resolver;
use trust_dns_resolver::system_conf::read_system_conf;

use super::deadline::Deadline;
use super::error::{SmtpFailure, Stage};
use super::reply::{ReplyBuilder, SmtpReply};

/// Upper bound for one reply line; a server streaming bytes without a line
/// break is cut off here.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Open a TCP connection to `host_port` (for example `"mx.example.com:25"`).
///
/// Name resolution and the connect step share one budget of `timeout`.
/// Once connected, a [`Deadline`] of `timeout` is bound to the connection
/// and enforced on every read and write made through it.
pub fn dial_timeout(host_port: &str, timeout: Duration) -> Result<TimedConnection, SmtpFailure> {
    dial_with(&SystemHosts, host_port, timeout)
}

/// Dial a mail exchanger by host name on `port`.
pub fn dial_exchange(
    exchange: &str,
    port: u16,
    timeout: Duration,
) -> Result<TimedConnection, SmtpFailure> {
    dial_timeout(&host_port(exchange, port), timeout)
}

pub(crate) fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Resolves an exchanger name to addresses within a time limit.
pub(crate) trait ResolveHost {
    fn resolve_host(&self, host: &str, timeout: Duration) -> io::Result<Vec<IpAddr>>;
}

impl<F> ResolveHost for F
where
    F: Fn(&str, Duration) -> io::Result<Vec<IpAddr>>,
{
    fn resolve_host(&self, host: &str, timeout: Duration) -> io::Result<Vec<IpAddr>> {
        self(host, timeout)
    }
}

/// A/AAAA lookups with the system resolver configuration, one attempt per
/// name server, each bounded by the time left of the connect budget.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemHosts;

impl ResolveHost for SystemHosts {
    fn resolve_host(&self, host: &str, timeout: Duration) -> io::Result<Vec<IpAddr>> {
        let (config, mut opts) = read_system_conf().map_err(io::Error::from)?;
        opts.timeout = timeout;
        opts.attempts = 1;
        let resolver = Resolver::new(config, opts)?;
        let lookup = resolver.lookup_ip(host).map_err(io::Error::from)?;
        Ok(lookup.iter().collect())
    }
}

pub(crate) fn dial_with<R>(
    resolver: &R,
    host_port: &str,
    timeout: Duration,
) -> Result<TimedConnection, SmtpFailure>
where
    R: ResolveHost + ?Sized,
{
    let budget = Deadline::after(timeout);
    let (host, port) = split_host_port(host_port).ok_or_else(|| {
        SmtpFailure::connect(
            host_port,
            io::Error::new(io::ErrorKind::InvalidInput, "expected host:port"),
        )
    })?;
    let ips = match host.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => {
            let left = budget.remaining().ok_or(SmtpFailure::DeadlineExceeded {
                stage: Stage::Connect,
            })?;
            let ips = resolver
                .resolve_host(host, left)
                .map_err(|err| SmtpFailure::connect(host_port, err))?;
            debug!(host, count = ips.len(), "exchanger resolved");
            ips
        }
    };
    let addrs: Vec<SocketAddr> = ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect();
    connect_any(host_port, &addrs, budget, timeout)
}

/// `host:port` or `[v6]:port`.
fn split_host_port(host_port: &str) -> Option<(&str, u16)> {
    let (host, port) = host_port.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

fn connect_any(
    label: &str,
    addrs: &[SocketAddr],
    budget: Deadline,
    timeout: Duration,
) -> Result<TimedConnection, SmtpFailure> {
    let mut last_err = None;
    for addr in addrs {
        let Some(left) = budget.remaining() else {
            break;
        };
        match TcpStream::connect_timeout(addr, left) {
            Ok(stream) => {
                debug!(%addr, "connected");
                return Ok(TimedConnection::new(stream, *addr, Deadline::after(timeout)));
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }
    match last_err {
        Some(err) => Err(SmtpFailure::connect(label, err)),
        None if addrs.is_empty() => Err(SmtpFailure::connect(
            label,
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no socket address available",
            ),
        )),
        None => Err(SmtpFailure::DeadlineExceeded {
            stage: Stage::Connect,
        }),
    }
}

#[derive(Debug)]
enum StreamState {
    Plain(TcpStream),
    #[cfg(feature = "with-starttls")]
    Tls(Box<TlsStream<TcpStream>>),
    Closed,
}

impl StreamState {
    fn tcp(&self) -> Option<&TcpStream> {
        match self {
            Self::Plain(stream) => Some(stream),
            #[cfg(feature = "with-starttls")]
            Self::Tls(stream) => Some(stream.get_ref()),
            Self::Closed => None,
        }
    }
}

/// A TCP connection to a mail exchanger bound to a [`Deadline`].
///
/// The connection is exclusively owned by one validation call and is closed
/// when dropped.
#[derive(Debug)]
pub struct TimedConnection {
    state: StreamState,
    buffer: Vec<u8>,
    peer: SocketAddr,
    deadline: Deadline,
    broken: bool,
}

impl TimedConnection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr, deadline: Deadline) -> Self {
        Self {
            state: StreamState::Plain(stream),
            buffer: Vec::new(),
            peer,
            deadline,
            broken: false,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// True once an I/O error or the deadline has made the stream unusable.
    pub fn is_broken(&self) -> bool {
        self.broken || matches!(self.state, StreamState::Closed)
    }

    pub fn is_tls(&self) -> bool {
        #[cfg(feature = "with-starttls")]
        {
            matches!(self.state, StreamState::Tls(_))
        }
        #[cfg(not(feature = "with-starttls"))]
        {
            false
        }
    }

    /// Write `line` followed by CRLF.
    pub fn write_line(&mut self, stage: Stage, line: &str) -> Result<(), SmtpFailure> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.arm(stage)?;
        let result = match &mut self.state {
            StreamState::Plain(stream) => stream.write_all(&data).and_then(|()| stream.flush()),
            #[cfg(feature = "with-starttls")]
            StreamState::Tls(stream) => stream.write_all(&data).and_then(|()| stream.flush()),
            StreamState::Closed => return Err(closed_failure(stage)),
        };
        result.map_err(|err| self.fail(stage, err))
    }

    /// Read one complete, possibly multi-line, reply.
    pub fn read_reply(&mut self, stage: Stage) -> Result<SmtpReply, SmtpFailure> {
        let mut builder = ReplyBuilder::default();
        loop {
            let line = self.read_line(stage)?;
            if let Some(reply) = builder.push(&line).inspect_err(|_| self.broken = true)? {
                return Ok(reply);
            }
        }
    }

    /// Shut the socket down. Further operations fail.
    pub fn close(&mut self) {
        if let Some(stream) = self.state.tcp() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.state = StreamState::Closed;
    }

    #[cfg(feature = "with-starttls")]
    pub(crate) fn upgrade_tls(
        &mut self,
        domain: &str,
        connector: &TlsConnector,
    ) -> Result<(), SmtpFailure> {
        if !self.buffer.is_empty() {
            // Bytes received before the handshake would otherwise be read as
            // if they had come over TLS.
            self.broken = true;
            return Err(SmtpFailure::Protocol(
                "unexpected data before TLS negotiation".to_string(),
            ));
        }
        self.arm(Stage::StartTls)?;
        let plain = match std::mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Plain(stream) => stream,
            tls @ StreamState::Tls(_) => {
                self.state = tls;
                return Ok(());
            }
            StreamState::Closed => return Err(closed_failure(Stage::StartTls)),
        };
        match self.complete_handshake(connector, domain, plain) {
            Ok(tls) => {
                self.state = StreamState::Tls(Box::new(tls));
                Ok(())
            }
            Err(err) => {
                self.broken = true;
                Err(err)
            }
        }
    }

    #[cfg(feature = "with-starttls")]
    fn complete_handshake(
        &self,
        connector: &TlsConnector,
        domain: &str,
        stream: TcpStream,
    ) -> Result<TlsStream<TcpStream>, SmtpFailure> {
        let mut pending = match connector.connect(domain, stream) {
            Ok(tls) => return Ok(tls),
            Err(HandshakeError::Failure(err)) => return Err(SmtpFailure::Tls { source: err }),
            Err(HandshakeError::WouldBlock(mid)) => mid,
        };
        loop {
            if self.deadline.is_expired() {
                return Err(SmtpFailure::DeadlineExceeded {
                    stage: Stage::StartTls,
                });
            }
            match pending.handshake() {
                Ok(tls) => return Ok(tls),
                Err(HandshakeError::Failure(err)) => return Err(SmtpFailure::Tls { source: err }),
                Err(HandshakeError::WouldBlock(next)) => pending = next,
            }
        }
    }

    fn read_line(&mut self, stage: Stage) -> Result<String, SmtpFailure> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                // The code is ASCII; the text may be Latin-1 or worse.
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if self.buffer.len() > MAX_LINE_LEN {
                self.broken = true;
                return Err(SmtpFailure::Protocol(format!(
                    "reply line longer than {MAX_LINE_LEN} bytes"
                )));
            }

            self.arm(stage)?;
            let mut chunk = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut chunk),
                #[cfg(feature = "with-starttls")]
                StreamState::Tls(stream) => stream.read(&mut chunk),
                StreamState::Closed => return Err(closed_failure(stage)),
            };
            let read = read.map_err(|err| self.fail(stage, err))?;
            if read == 0 {
                return Err(self.fail(
                    stage,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server"),
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Set the socket timeouts to the time left before the deadline.
    fn arm(&mut self, stage: Stage) -> Result<(), SmtpFailure> {
        let Some(left) = self.deadline.remaining() else {
            self.broken = true;
            return Err(SmtpFailure::DeadlineExceeded { stage });
        };
        let Some(stream) = self.state.tcp() else {
            return Err(closed_failure(stage));
        };
        let armed = stream
            .set_read_timeout(Some(left))
            .and_then(|()| stream.set_write_timeout(Some(left)));
        armed.map_err(|err| self.fail(stage, err))
    }

    fn fail(&mut self, stage: Stage, err: io::Error) -> SmtpFailure {
        self.broken = true;
        SmtpFailure::io(stage, err)
    }
}

impl Drop for TimedConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn closed_failure(stage: Stage) -> SmtpFailure {
    SmtpFailure::Io {
        stage,
        source: io::Error::new(io::ErrorKind::NotConnected, "connection already closed"),
    }
}
