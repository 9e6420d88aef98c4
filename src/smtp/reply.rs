use std::fmt;

use phf::phf_map;

use super::error::SmtpFailure;

static REPLY_DESCRIPTIONS: phf::Map<u16, &'static str> = phf_map! {
    211u16 => "system status",
    214u16 => "help message",
    220u16 => "service ready",
    221u16 => "service closing transmission channel",
    250u16 => "requested action completed",
    251u16 => "user not local; will forward",
    252u16 => "cannot verify user, will attempt delivery",
    354u16 => "start mail input",
    421u16 => "service not available, closing channel",
    450u16 => "mailbox unavailable (busy or temporarily blocked)",
    451u16 => "local error in processing",
    452u16 => "insufficient system storage",
    454u16 => "TLS not available due to temporary reason",
    500u16 => "syntax error, command unrecognized",
    501u16 => "syntax error in parameters or arguments",
    502u16 => "command not implemented",
    503u16 => "bad sequence of commands",
    504u16 => "command parameter not implemented",
    521u16 => "host does not accept mail",
    530u16 => "authentication required",
    550u16 => "mailbox unavailable",
    551u16 => "user not local",
    552u16 => "exceeded storage allocation",
    553u16 => "mailbox name not allowed",
    554u16 => "transaction failed",
    556u16 => "domain does not accept mail",
};

/// A complete (possibly multi-line) SMTP reply.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn new<I, S>(code: u16, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// Generic meaning of the reply code, for the codes RFC 5321 and its
    /// extensions define.
    pub fn describe(&self) -> Option<&'static str> {
        describe_code(self.code)
    }

    /// EHLO keywords advertised by the server. The first line of an EHLO
    /// reply is the server greeting and is skipped.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
    }

    pub fn has_extension(&self, keyword: &str) -> bool {
        self.extensions()
            .any(|ext| ext.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code)?;
        let text = self.lines.join(" ");
        if !text.is_empty() {
            write!(f, " {text}")?;
        }
        Ok(())
    }
}

pub fn describe_code(code: u16) -> Option<&'static str> {
    REPLY_DESCRIPTIONS.get(&code).copied()
}

/// One line of a reply: `CODE[-| ]text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplyLine {
    pub code: u16,
    pub last: bool,
    pub text: String,
}

impl ReplyLine {
    pub(crate) fn parse(raw: &str) -> Result<Self, SmtpFailure> {
        let bytes = raw.as_bytes();
        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(SmtpFailure::Protocol(format!("invalid reply line: '{raw}'")));
        }
        let code = raw[..3]
            .parse::<u16>()
            .map_err(|_| SmtpFailure::Protocol(format!("invalid status code in '{raw}'")))?;
        if !(200..600).contains(&code) {
            return Err(SmtpFailure::Protocol(format!("status code {code} out of range")));
        }
        let (last, text) = match bytes.get(3) {
            None => (true, ""),
            Some(b' ') => (true, &raw[4..]),
            Some(b'-') => (false, &raw[4..]),
            Some(_) => {
                return Err(SmtpFailure::Protocol(format!(
                    "invalid separator in reply line: '{raw}'"
                )));
            }
        };
        Ok(Self {
            code,
            last,
            text: text.to_string(),
        })
    }
}

/// Most lines accepted in one reply.
const MAX_REPLY_LINES: usize = 512;
/// Most text bytes accepted in one reply, all lines together.
const MAX_REPLY_BYTES: usize = 64 * 1024;

/// Accumulates reply lines until the final one arrives.
#[derive(Debug, Default)]
pub(crate) struct ReplyBuilder {
    code: Option<u16>,
    lines: Vec<String>,
    bytes: usize,
}

impl ReplyBuilder {
    /// Feed one raw line; returns the complete reply once the last line has
    /// been seen.
    pub(crate) fn push(&mut self, raw: &str) -> Result<Option<SmtpReply>, SmtpFailure> {
        let line = ReplyLine::parse(raw)?;
        match self.code {
            Some(existing) if existing != line.code => {
                return Err(SmtpFailure::Protocol(format!(
                    "inconsistent reply codes: {existing} vs {}",
                    line.code
                )));
            }
            Some(_) => {}
            None => self.code = Some(line.code),
        }
        if self.lines.len() >= MAX_REPLY_LINES {
            return Err(SmtpFailure::Protocol(format!(
                "reply longer than {MAX_REPLY_LINES} lines"
            )));
        }
        self.bytes += line.text.len();
        if self.bytes > MAX_REPLY_BYTES {
            return Err(SmtpFailure::Protocol(format!(
                "reply larger than {MAX_REPLY_BYTES} bytes"
            )));
        }
        self.lines.push(line.text);
        if !line.last {
            return Ok(None);
        }
        self.bytes = 0;
        let lines = std::mem::take(&mut self.lines);
        Ok(Some(SmtpReply {
            code: line.code,
            lines,
        }))
    }
}
