use std::fmt;
use std::net::SocketAddr;

#[cfg(feature = "with-starttls")]
use native_tls::TlsConnector;
use tracing::debug;

use super::dialer::TimedConnection;
use super::error::{SmtpFailure, Stage};
use super::reply::SmtpReply;

/// Position of a client in the probing conversation. Each state is only
/// reachable from the one before it.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Greeted,
    SenderDeclared,
    RecipientDeclared,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Greeted => "greeted",
            Self::SenderDeclared => "sender declared",
            Self::RecipientDeclared => "recipient declared",
            Self::Closed => "closed",
        })
    }
}

/// Minimal SMTP client that checks a mailbox without sending a message.
///
/// The conversation stops after `RCPT TO`; `DATA` is never issued.
#[derive(Debug)]
pub struct SmtpClient {
    conn: TimedConnection,
    server_name: String,
    state: SessionState,
    client_name: Option<String>,
    ehlo: Option<SmtpReply>,
}

impl SmtpClient {
    /// Wrap a dialed connection and read the server greeting, which must be
    /// a `220`.
    pub fn new(mut conn: TimedConnection, server_name: impl Into<String>) -> Result<Self, SmtpFailure> {
        let server_name = server_name.into();
        let greeting = conn.read_reply(Stage::Greeting)?;
        debug!(server = %server_name, "S: {greeting}");
        if greeting.code != 220 {
            return Err(SmtpFailure::rejected(Stage::Greeting, greeting));
        }
        Ok(Self {
            conn,
            server_name,
            state: SessionState::Connected,
            client_name: None,
            ehlo: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn peer(&self) -> SocketAddr {
        self.conn.peer()
    }

    pub fn is_tls(&self) -> bool {
        self.conn.is_tls()
    }

    /// True when the server answered EHLO and listed `keyword`.
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.ehlo
            .as_ref()
            .is_some_and(|reply| reply.has_extension(keyword))
    }

    /// Identify as `client_name`: `EHLO`, falling back to `HELO` when the
    /// server does not accept EHLO.
    pub fn hello(&mut self, client_name: &str) -> Result<(), SmtpFailure> {
        self.expect_state("EHLO", SessionState::Connected)?;
        validate_line("client host name", client_name)?;

        let ehlo = self.command(Stage::Hello, &format!("EHLO {client_name}"))?;
        if ehlo.is_positive_completion() {
            self.ehlo = Some(ehlo);
        } else {
            let helo = self.command(Stage::Hello, &format!("HELO {client_name}"))?;
            if !helo.is_positive_completion() {
                return Err(SmtpFailure::rejected(Stage::Hello, helo));
            }
            self.ehlo = None;
        }
        self.client_name = Some(client_name.to_string());
        self.state = SessionState::Greeted;
        Ok(())
    }

    /// Upgrade the connection with `STARTTLS` and greet the server again.
    #[cfg(feature = "with-starttls")]
    pub fn starttls(&mut self, connector: &TlsConnector) -> Result<(), SmtpFailure> {
        self.expect_state("STARTTLS", SessionState::Greeted)?;
        if !self.has_extension("STARTTLS") {
            return Err(SmtpFailure::StartTlsUnavailable {
                host: self.server_name.clone(),
            });
        }
        let reply = self.command(Stage::StartTls, "STARTTLS")?;
        if reply.code != 220 {
            return Err(SmtpFailure::rejected(Stage::StartTls, reply));
        }
        let server_name = self.server_name.clone();
        self.conn.upgrade_tls(&server_name, connector)?;
        debug!(server = %self.server_name, "TLS established");

        self.state = SessionState::Connected;
        self.ehlo = None;
        let client_name = self.client_name.take().unwrap_or_else(|| "localhost".to_string());
        self.hello(&client_name)
    }

    /// Declare the envelope sender with `MAIL FROM`.
    pub fn mail(&mut self, from: &str) -> Result<(), SmtpFailure> {
        self.expect_state("MAIL FROM", SessionState::Greeted)?;
        validate_line("sender address", from)?;
        let reply = self.command(Stage::MailFrom, &format!("MAIL FROM:<{from}>"))?;
        if reply.code != 250 {
            return Err(SmtpFailure::rejected(Stage::MailFrom, reply));
        }
        self.state = SessionState::SenderDeclared;
        Ok(())
    }

    /// Declare the recipient under test with `RCPT TO`. Any `25x` reply counts as
    /// accepted.
    pub fn rcpt(&mut self, to: &str) -> Result<(), SmtpFailure> {
        self.expect_state("RCPT TO", SessionState::SenderDeclared)?;
        validate_line("recipient address", to)?;
        let reply = self.command(Stage::RcptTo, &format!("RCPT TO:<{to}>"))?;
        if !(250..260).contains(&reply.code) {
            return Err(SmtpFailure::rejected(Stage::RcptTo, reply));
        }
        self.state = SessionState::RecipientDeclared;
        Ok(())
    }

    /// Send `QUIT` and wait for the `221`.
    pub fn quit(&mut self) -> Result<(), SmtpFailure> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let reply = self.command(Stage::Quit, "QUIT");
        self.state = SessionState::Closed;
        let reply = reply?;
        if reply.code != 221 {
            return Err(SmtpFailure::rejected(Stage::Quit, reply));
        }
        Ok(())
    }

    /// End the session: a polite `QUIT` when the connection is still healthy,
    /// then the socket is closed whatever happened.
    pub fn close(mut self) {
        if !self.conn.is_broken() {
            if let Err(err) = self.quit() {
                debug!(server = %self.server_name, error = %err, "QUIT failed");
            }
        }
        self.state = SessionState::Closed;
        self.conn.close();
    }

    fn command(&mut self, stage: Stage, line: &str) -> Result<SmtpReply, SmtpFailure> {
        debug!(server = %self.server_name, "C: {line}");
        self.conn.write_line(stage, line)?;
        let reply = self.conn.read_reply(stage)?;
        debug!(server = %self.server_name, "S: {reply}");
        Ok(reply)
    }

    fn expect_state(&self, command: &'static str, expected: SessionState) -> Result<(), SmtpFailure> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SmtpFailure::OutOfSequence {
                command,
                state: self.state,
            })
        }
    }
}

fn validate_line(what: &'static str, value: &str) -> Result<(), SmtpFailure> {
    if value.contains(['\r', '\n']) {
        Err(SmtpFailure::InvalidInput { what })
    } else {
        Ok(())
    }
}
