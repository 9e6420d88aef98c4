use std::fmt;

use thiserror::Error;

use crate::smtp::SmtpFailure;

/// Outcome classification shared by every validation tier.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid format")]
    BadFormat,
    #[error("unresolvable host")]
    UnresolvableHost,
    #[error(transparent)]
    Smtp(#[from] SmtpError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadFormat => ErrorKind::BadFormat,
            Self::UnresolvableHost => ErrorKind::UnresolvableHost,
            Self::Smtp(_) => ErrorKind::Smtp,
        }
    }

    pub fn as_smtp(&self) -> Option<&SmtpError> {
        match self {
            Self::Smtp(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SmtpFailure> for Error {
    fn from(failure: SmtpFailure) -> Self {
        Self::Smtp(SmtpError::from(failure))
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadFormat,
    UnresolvableHost,
    Smtp,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadFormat => f.write_str("bad_format"),
            Self::UnresolvableHost => f.write_str("unresolvable_host"),
            Self::Smtp => f.write_str("smtp_error"),
        }
    }
}

/// A network or protocol failure while dialing or talking to a mail
/// exchanger. The underlying [`SmtpFailure`] is kept for diagnostics.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct SmtpError(#[from] SmtpFailure);

impl SmtpError {
    pub fn failure(&self) -> &SmtpFailure {
        &self.0
    }

    pub fn into_failure(self) -> SmtpFailure {
        self.0
    }

    /// Best-effort three character status code.
    ///
    /// When the failure carries a reply parsed from the server, its numeric
    /// code is returned. For every other failure (refused connection,
    /// deadline, malformed reply...) the code is the first three characters
    /// of the error message, which is a guess and not a protocol status.
    pub fn code(&self) -> SmtpCode {
        match self.0.reply() {
            Some(reply) => SmtpCode::Reply(reply.code),
            None => SmtpCode::Heuristic(self.0.to_string().chars().take(3).collect()),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCode {
    /// Status code of a reply sent by the server.
    Reply(u16),
    /// Leading characters of a non-protocol error message.
    Heuristic(String),
}

impl SmtpCode {
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(_))
    }

    pub fn as_reply(&self) -> Option<u16> {
        match self {
            Self::Reply(code) => Some(*code),
            Self::Heuristic(_) => None,
        }
    }
}

impl fmt::Display for SmtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(code) => write!(f, "{code:03}"),
            Self::Heuristic(text) => f.write_str(text),
        }
    }
}
