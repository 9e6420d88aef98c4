use std::time::Duration;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use checkmail::{CheckOptions, MxStrategy, SMTP_PORT, TlsMode};

#[derive(Parser)]
#[command(name = "checkmail", version, about = "Check e-mail addresses: format, MX, host, mailbox")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// read addresses from stdin (one per line)
    #[arg(long)]
    pub stdin: bool,

    /// check applied to stdin addresses
    #[arg(long, value_enum, default_value_t = Tier::Format)]
    pub tier: Tier,

    /// name announced in EHLO/HELO (user tier)
    #[arg(long, global = true)]
    pub helo: Option<String>,

    /// envelope sender for MAIL FROM (user tier)
    #[arg(long = "from", global = true)]
    pub mail_from: Option<String>,

    /// SMTP port of the mail exchangers
    #[arg(long, default_value_t = SMTP_PORT, global = true)]
    pub port: u16,

    /// connect budget, then handshake budget (ms)
    #[arg(long = "timeout-ms", default_value_t = 5_000, global = true)]
    pub timeout_ms: u64,

    /// try every MX in preference order instead of the first only
    #[arg(long = "all-mx", global = true)]
    pub all_mx: bool,

    /// STARTTLS during the user tier
    #[arg(long, value_enum, default_value_t = TlsArg::Off, global = true)]
    pub tls: TlsArg,

    /// format: human|json|ndjson|csv
    #[arg(long, default_value = "human", global = true)]
    pub format: String,

    /// write report to file (JSON/NDJSON/CSV per --format)
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// more logging on stderr (-v, -vv, -vvv); RUST_LOG wins when unset
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// syntax only, no network
    Format { email: String },
    /// the domain publishes MX records
    Mx { email: String },
    /// the preferred exchanger accepts a connection
    Host { email: String },
    /// the exchanger accepts the address as a recipient (needs --helo and --from)
    User { email: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tier {
    Format,
    Mx,
    Host,
    User,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Mx => "mx",
            Self::Host => "host",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TlsArg {
    Off,
    Opportunistic,
    Required,
}

impl From<TlsArg> for TlsMode {
    fn from(arg: TlsArg) -> Self {
        match arg {
            TlsArg::Off => TlsMode::Off,
            TlsArg::Opportunistic => TlsMode::Opportunistic,
            TlsArg::Required => TlsMode::Required,
        }
    }
}

/// Client identity for the user tier.
pub struct Identity<'a> {
    pub helo: &'a str,
    pub mail_from: &'a str,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            port: self.port,
            timeout: Duration::from_millis(self.timeout_ms),
            mx_strategy: if self.all_mx {
                MxStrategy::AllInPreferenceOrder
            } else {
                MxStrategy::FirstOnly
            },
            tls: self.tls.into(),
        }
    }

    /// `--helo` and `--from`, both required before any user-tier check.
    pub fn identity(&self) -> Result<Identity<'_>> {
        match (self.helo.as_deref(), self.mail_from.as_deref()) {
            (Some(helo), Some(mail_from)) => Ok(Identity { helo, mail_from }),
            _ => bail!("the user tier needs both --helo NAME and --from ADDR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_options_map_onto_check_options() {
        let cli = Cli::try_parse_from([
            "checkmail",
            "host",
            "user@example.com",
            "--port",
            "2525",
            "--timeout-ms",
            "750",
            "--all-mx",
            "--tls",
            "opportunistic",
        ])
        .expect("valid arguments");
        let options = cli.check_options();
        assert_eq!(options.port, 2525);
        assert_eq!(options.timeout, Duration::from_millis(750));
        assert_eq!(options.mx_strategy, MxStrategy::AllInPreferenceOrder);
        assert_eq!(options.tls, TlsMode::Opportunistic);
    }

    #[test]
    fn user_tier_requires_identity() {
        let cli = Cli::try_parse_from(["checkmail", "user", "user@example.com"]).expect("parses");
        assert!(cli.identity().is_err());

        let cli = Cli::try_parse_from([
            "checkmail",
            "user",
            "--helo",
            "client.test",
            "--from",
            "sender@client.test",
            "user@example.com",
        ])
        .expect("parses");
        let identity = cli.identity().expect("identity");
        assert_eq!(identity.helo, "client.test");
        assert_eq!(identity.mail_from, "sender@client.test");
    }

    #[test]
    fn defaults_follow_the_library() {
        let cli = Cli::try_parse_from(["checkmail", "--stdin"]).expect("parses");
        assert_eq!(cli.tier, Tier::Format);
        assert_eq!(cli.check_options(), CheckOptions::default());
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::clap_command().debug_assert();
    }
}
