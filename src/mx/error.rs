use thiserror::Error;

/// Why an MX lookup produced no usable exchanger. Callers only ever see
/// [`Error::UnresolvableHost`](crate::Error::UnresolvableHost); the detail is
/// logged and dropped.
#[derive(Debug, Error)]
pub(crate) enum LookupError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("MX lookup failed: {source}")]
    Lookup {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("no mail exchanger for the domain")]
    NoRecords,
}

impl LookupError {
    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn lookup(source: trust_dns_resolver::error::ResolveError) -> Self {
        Self::Lookup { source }
    }
}
