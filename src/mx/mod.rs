//! DNS MX resolution.
//!
//! The public entry point is [`lookup_mx`], a synchronous lookup with the
//! system resolver. Every failure collapses to
//! [`Error::UnresolvableHost`](crate::Error::UnresolvableHost) so callers see
//! one stable error whatever DNS did.

mod error;
mod resolver;
mod types;

pub use resolver::lookup_mx;
pub use types::MxRecord;

pub(crate) use resolver::{LookupMx, SystemResolver, resolve};

#[cfg(test)]
pub(crate) mod tests;
