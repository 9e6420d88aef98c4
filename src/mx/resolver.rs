use tracing::debug;
use trust_dns_resolver::Resolver;

use super::MxRecord;
use super::error::LookupError;
use crate::Error;

/// Look up the mail exchangers of `domain` with the system resolver.
///
/// Records come back sorted by ascending preference. Any failure (empty
/// domain, resolver setup, NXDOMAIN, timeout, no records) is reported as
/// [`Error::UnresolvableHost`].
pub fn lookup_mx(domain: &str) -> Result<Vec<MxRecord>, Error> {
    resolve(&SystemResolver, domain)
}

/// Same as [`lookup_mx`], through any [`LookupMx`] implementation.
pub(crate) fn resolve<R>(resolver: &R, domain: &str) -> Result<Vec<MxRecord>, Error>
where
    R: LookupMx + ?Sized,
{
    resolve_with(resolver, domain).map_err(|err| {
        debug!(domain, error = %err, "MX resolution failed");
        Error::UnresolvableHost
    })
}

pub(crate) fn resolve_with<R>(resolver: &R, domain: &str) -> Result<Vec<MxRecord>, LookupError>
where
    R: LookupMx + ?Sized,
{
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(LookupError::EmptyDomain);
    }

    let mut records: Vec<MxRecord> = resolver
        .lookup_mx(domain)?
        .into_iter()
        .map(|record| MxRecord::new(record.preference, normalize_exchange(&record.exchange)))
        // A lone "." is the null MX of RFC 7505: the domain takes no mail.
        .filter(|record| !record.exchange.is_empty())
        .collect();

    records.sort();
    records.dedup();

    if records.is_empty() {
        return Err(LookupError::NoRecords);
    }
    debug!(domain, count = records.len(), first = %records[0], "MX records resolved");
    Ok(records)
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim().trim_end_matches('.').to_ascii_lowercase()
}

pub(crate) trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupError> {
        let lookup = Resolver::mx_lookup(self, domain).map_err(LookupError::lookup)?;
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
            .collect())
    }
}

/// Builds a resolver from the system configuration for each lookup, so no
/// state is shared between validation calls.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemResolver;

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupError> {
        let resolver = Resolver::from_system_conf().map_err(LookupError::resolver_init)?;
        LookupMx::lookup_mx(&resolver, domain)
    }
}

#[cfg(test)]
impl LookupMx for crate::mx::tests::StubResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupError> {
        (self.on_lookup)(domain)
    }
}
