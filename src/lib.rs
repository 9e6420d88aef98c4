#![forbid(unsafe_code)]
//! checkmail: e-mail address checks in increasing depth.
//!
//! * [`validate_format`]: syntax only, no I/O;
//! * [`validate_mx`]: the domain publishes MX records;
//! * [`validate_host`]: the preferred exchanger accepts a connection;
//! * [`validate_host_and_user`]: the exchanger accepts the address as a
//!   recipient.
//!
//! Network tiers run with [`CheckOptions::default`] unless driven through a
//! [`Checker`].

mod address;
mod check;
mod error;
mod format;
mod options;

pub mod mx;
pub mod smtp;

pub use address::{Address, split};
pub use check::{Checker, validate_host, validate_host_and_user, validate_mx};
pub use error::{Error, ErrorKind, SmtpCode, SmtpError};
pub use format::{is_valid_format, validate_format};
pub use mx::{MxRecord, lookup_mx};
pub use options::{CheckOptions, FORCE_DISCONNECT_AFTER, MxStrategy, SMTP_PORT, TlsMode};
pub use smtp::{SmtpFailure, SmtpReply, Stage, describe_code};
