use std::fmt;
use std::io;

use thiserror::Error;

use super::reply::SmtpReply;
use super::session::SessionState;

/// Step of the SMTP conversation a failure happened in.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Greeting,
    Hello,
    StartTls,
    MailFrom,
    RcptTo,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Hello => "EHLO/HELO",
            Self::StartTls => "STARTTLS",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Quit => "QUIT",
        })
    }
}

#[derive(Debug, Error)]
pub enum SmtpFailure {
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },
    #[error("deadline exceeded during {stage}")]
    DeadlineExceeded { stage: Stage },
    #[error("{reply}")]
    Reply { stage: Stage, reply: SmtpReply },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid {what}: a line must not contain CR or LF")]
    InvalidInput { what: &'static str },
    #[error("{command} issued out of sequence (session is {state})")]
    OutOfSequence {
        command: &'static str,
        state: SessionState,
    },
    #[cfg(feature = "with-starttls")]
    #[error("TLS handshake failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("STARTTLS required but not advertised by {host}")]
    StartTlsUnavailable { host: String },
    #[error("STARTTLS requested but TLS support is not compiled in (feature `with-starttls`)")]
    TlsDisabled,
}

impl SmtpFailure {
    pub(crate) fn connect(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            addr: addr.into(),
            source,
        }
    }

    pub(crate) fn rejected(stage: Stage, reply: SmtpReply) -> Self {
        Self::Reply { stage, reply }
    }

    /// Classify an I/O error raised while the connection deadline was armed.
    /// Socket timeouts are always set to the time left before the deadline,
    /// so a timed out read or write means the deadline has passed.
    pub(crate) fn io(stage: Stage, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::DeadlineExceeded { stage },
            _ => Self::Io { stage, source },
        }
    }

    /// The server reply behind this failure, if the server sent one.
    pub fn reply(&self) -> Option<&SmtpReply> {
        match self {
            Self::Reply { reply, .. } => Some(reply),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Connect { .. } => Some(Stage::Connect),
            Self::Io { stage, .. }
            | Self::DeadlineExceeded { stage }
            | Self::Reply { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded { .. } => true,
            Self::Connect { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
