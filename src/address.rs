//! Splitting of a raw address into its local part and domain.
//!
//! The split is purely positional: everything before the last `@` is the
//! local part, everything after it is the domain. Nothing is validated here;
//! pair it with [`validate_format`](crate::validate_format) when stricter
//! guarantees are needed.

use std::fmt;

/// A raw address viewed as `local@domain`, borrowing from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address<'a> {
    pub local: &'a str,
    pub domain: &'a str,
}

impl<'a> Address<'a> {
    /// Split `raw` on its last `@`.
    ///
    /// Without any `@`, the whole input becomes the local part and the
    /// domain is empty, which makes any later MX lookup fail as an
    /// unresolvable host.
    pub fn split(raw: &'a str) -> Self {
        let (local, domain) = split(raw);
        Self { local, domain }
    }

    pub fn has_domain(&self) -> bool {
        !self.domain.trim().is_empty()
    }
}

impl fmt::Display for Address<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// Returns `(local, domain)` split on the last `@` of `raw`.
pub fn split(raw: &str) -> (&str, &str) {
    match raw.rsplit_once('@') {
        Some((local, domain)) => (local, domain),
        None => (raw, ""),
    }
}
