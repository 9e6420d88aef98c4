use std::time::Duration;

use crate::mx::MxRecord;

/// Port mail exchangers listen on.
pub const SMTP_PORT: u16 = 25;

/// Hard ceiling for one dial, and for the conversation that follows it.
pub const FORCE_DISCONNECT_AFTER: Duration = Duration::from_secs(5);

/// Which of the resolved mail exchangers a check talks to.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MxStrategy {
    /// Only the most preferred exchanger; a failure there is final.
    #[default]
    FirstOnly,
    /// Walk the exchangers in preference order, moving on when one cannot be
    /// dialed or does not greet. A reply to EHLO, MAIL FROM or RCPT TO is
    /// final.
    AllInPreferenceOrder,
}

/// STARTTLS behaviour of the deepest tier.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    #[default]
    Off,
    /// Upgrade when the server advertises STARTTLS.
    Opportunistic,
    /// Fail when the server does not offer STARTTLS.
    Required,
}

/// Controls how [`Checker`](crate::Checker) reaches mail exchangers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    pub port: u16,
    pub timeout: Duration,
    pub mx_strategy: MxStrategy,
    pub tls: TlsMode,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            port: SMTP_PORT,
            timeout: FORCE_DISCONNECT_AFTER,
            mx_strategy: MxStrategy::FirstOnly,
            tls: TlsMode::Off,
        }
    }
}

impl CheckOptions {
    /// The exchangers to try, in order.
    pub fn candidates<'a>(&self, records: &'a [MxRecord]) -> &'a [MxRecord] {
        match self.mx_strategy {
            MxStrategy::FirstOnly => &records[..records.len().min(1)],
            MxStrategy::AllInPreferenceOrder => records,
        }
    }
}
