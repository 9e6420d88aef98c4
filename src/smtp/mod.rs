//! SMTP side of the pipeline: a deadline-bound TCP dialer and the minimal
//! client that walks `EHLO` → `MAIL FROM` → `RCPT TO` without sending mail.

mod deadline;
mod dialer;
mod error;
mod reply;
mod session;

pub use deadline::Deadline;
pub use dialer::{TimedConnection, dial_exchange, dial_timeout};
pub use error::{SmtpFailure, Stage};
pub use reply::{SmtpReply, describe_code};
pub use session::{SessionState, SmtpClient};

#[cfg(test)]
pub(crate) mod tests;
