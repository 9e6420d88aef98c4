//! The three validation tiers.
//!
//! Every tier splits the address, resolves the domain's mail exchangers and
//! stops at the first failure:
//!
//! * [`validate_mx`]: the domain has at least one MX record;
//! * [`validate_host`]: the preferred exchanger accepts a connection and
//!   greets;
//! * [`validate_host_and_user`]: the exchanger accepts `EHLO`, `MAIL FROM`
//!   and `RCPT TO` for the address. No message is sent.

use tracing::debug;

use crate::address::Address;
use crate::mx::{self, LookupMx, MxRecord, SystemResolver};
use crate::options::{CheckOptions, TlsMode};
use crate::smtp::{SmtpClient, SmtpFailure, dial_exchange};
use crate::{Error, SmtpError};

/// Check that the domain of `address` has MX records.
pub fn validate_mx(address: &str) -> Result<(), Error> {
    Checker::default().validate_mx(address)
}

/// Check that the preferred mail exchanger of `address` accepts connections.
pub fn validate_host(address: &str) -> Result<(), Error> {
    Checker::default().validate_host(address)
}

/// Check that the preferred mail exchanger of `target_address` accepts it as
/// a recipient.
///
/// `client_host_name` is announced in `EHLO` and `sender_address` in
/// `MAIL FROM`. Many servers reject checks whose identity does not
/// reverse-resolve, so both should belong to the calling host.
pub fn validate_host_and_user(
    client_host_name: &str,
    sender_address: &str,
    target_address: &str,
) -> Result<(), Error> {
    Checker::default().validate_host_and_user(client_host_name, sender_address, target_address)
}

/// Runs the validation tiers with non-default [`CheckOptions`].
#[derive(Debug, Clone, Default)]
pub struct Checker {
    options: CheckOptions,
}

impl Checker {
    pub fn new(options: CheckOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn validate_mx(&self, address: &str) -> Result<(), Error> {
        self.validate_mx_with(&SystemResolver, address)
    }

    pub fn validate_host(&self, address: &str) -> Result<(), Error> {
        self.validate_host_with(&SystemResolver, address)
    }

    pub fn validate_host_and_user(
        &self,
        client_host_name: &str,
        sender_address: &str,
        target_address: &str,
    ) -> Result<(), Error> {
        self.validate_host_and_user_with(
            &SystemResolver,
            client_host_name,
            sender_address,
            target_address,
        )
    }

    pub(crate) fn validate_mx_with<R: LookupMx>(
        &self,
        resolver: &R,
        address: &str,
    ) -> Result<(), Error> {
        exchangers(resolver, address)?;
        Ok(())
    }

    pub(crate) fn validate_host_with<R: LookupMx>(
        &self,
        resolver: &R,
        address: &str,
    ) -> Result<(), Error> {
        let records = exchangers(resolver, address)?;
        self.with_session(&records, |_| Ok(()))
    }

    pub(crate) fn validate_host_and_user_with<R: LookupMx>(
        &self,
        resolver: &R,
        client_host_name: &str,
        sender_address: &str,
        target_address: &str,
    ) -> Result<(), Error> {
        let records = exchangers(resolver, target_address)?;
        self.with_session(&records, |client| {
            client.hello(client_host_name)?;
            self.negotiate_tls(client)?;
            client.mail(sender_address)?;
            client.rcpt(target_address)
        })
    }

    /// Open a session with the candidate exchangers in turn and run `drive`
    /// on the first one that greets. The session is closed on every path.
    fn with_session<F>(&self, records: &[MxRecord], drive: F) -> Result<(), Error>
    where
        F: Fn(&mut SmtpClient) -> Result<(), SmtpFailure>,
    {
        let mut last_failure = None;
        for record in self.options.candidates(records) {
            let mut client = match self.open(record) {
                Ok(client) => client,
                Err(failure) => {
                    debug!(exchange = %record.exchange, error = %failure, "exchanger unavailable");
                    last_failure = Some(failure);
                    continue;
                }
            };
            let outcome = drive(&mut client);
            client.close();
            return outcome.map_err(|failure| {
                debug!(exchange = %record.exchange, error = %failure, "SMTP check failed");
                Error::Smtp(SmtpError::from(failure))
            });
        }
        Err(last_failure.map_or(Error::UnresolvableHost, Error::from))
    }

    fn open(&self, record: &MxRecord) -> Result<SmtpClient, SmtpFailure> {
        let conn = dial_exchange(&record.exchange, self.options.port, self.options.timeout)?;
        SmtpClient::new(conn, record.exchange.as_str())
    }

    #[cfg(feature = "with-starttls")]
    fn negotiate_tls(&self, client: &mut SmtpClient) -> Result<(), SmtpFailure> {
        let wanted = match self.options.tls {
            TlsMode::Off => false,
            TlsMode::Opportunistic => client.has_extension("STARTTLS"),
            TlsMode::Required => true,
        };
        if !wanted {
            return Ok(());
        }
        let connector = native_tls::TlsConnector::new().map_err(|source| SmtpFailure::Tls { source })?;
        client.starttls(&connector)
    }

    #[cfg(not(feature = "with-starttls"))]
    fn negotiate_tls(&self, _client: &mut SmtpClient) -> Result<(), SmtpFailure> {
        match self.options.tls {
            TlsMode::Off | TlsMode::Opportunistic => Ok(()),
            TlsMode::Required => Err(SmtpFailure::TlsDisabled),
        }
    }
}

/// Mail exchangers for the domain of `raw`. An address without a domain is
/// unresolvable and never reaches the resolver.
fn exchangers<R: LookupMx>(resolver: &R, raw: &str) -> Result<Vec<MxRecord>, Error> {
    let address = Address::split(raw);
    if !address.has_domain() {
        debug!(%address, "no domain to resolve");
        return Err(Error::UnresolvableHost);
    }
    mx::resolve(resolver, address.domain)
}
