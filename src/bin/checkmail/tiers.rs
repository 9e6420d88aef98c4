use anyhow::Result;
use checkmail::{Checker, Error, validate_format};
use tracing::info;

use crate::args::{Cli, Identity, Tier};

/// A tier together with whatever it needs besides the address.
pub enum Check<'a> {
    Format,
    Mx,
    Host,
    User(Identity<'a>),
}

impl<'a> Check<'a> {
    pub fn new(tier: Tier, cli: &'a Cli) -> Result<Self> {
        Ok(match tier {
            Tier::Format => Self::Format,
            Tier::Mx => Self::Mx,
            Tier::Host => Self::Host,
            Tier::User => Self::User(cli.identity()?),
        })
    }

    pub fn tier(&self) -> Tier {
        match self {
            Self::Format => Tier::Format,
            Self::Mx => Tier::Mx,
            Self::Host => Tier::Host,
            Self::User(_) => Tier::User,
        }
    }

    pub fn run(&self, checker: &Checker, address: &str) -> Result<(), Error> {
        let outcome = match self {
            Self::Format => validate_format(address),
            Self::Mx => checker.validate_mx(address),
            Self::Host => checker.validate_host(address),
            Self::User(id) => checker.validate_host_and_user(id.helo, id.mail_from, address),
        };
        let tier = self.tier().as_str();
        match &outcome {
            Ok(()) => info!(tier, %address, "check passed"),
            Err(err) => info!(tier, %address, kind = %err.kind(), error = %err, "check failed"),
        }
        outcome
    }
}
