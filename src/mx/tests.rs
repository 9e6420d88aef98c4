use std::cell::Cell;

use super::error::LookupError;
use super::{MxRecord, resolver};
use crate::Error;

type LookupResult = Result<Vec<MxRecord>, LookupError>;
type LookupFn = dyn Fn(&str) -> LookupResult;

pub(crate) struct StubResolver {
    pub on_lookup: Box<LookupFn>,
}

impl StubResolver {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> LookupResult + 'static,
    {
        Self {
            on_lookup: Box::new(f),
        }
    }

    /// Resolver answering every query with `records`.
    pub(crate) fn with_records(records: Vec<MxRecord>) -> Self {
        Self::new(move |_| Ok(records.clone()))
    }

    /// Resolver failing every query.
    pub(crate) fn failing() -> Self {
        Self::new(|_| Err(LookupError::NoRecords))
    }
}

#[test]
fn empty_domain_fails_without_querying() {
    let queried = std::rc::Rc::new(Cell::new(false));
    let flag = queried.clone();
    let stub = StubResolver::new(move |_| {
        flag.set(true);
        Ok(vec![MxRecord::new(10, "mx.example.com")])
    });

    let err = resolver::resolve_with(&stub, "  ").expect_err("empty domain should fail");
    assert!(matches!(err, LookupError::EmptyDomain));
    assert!(!queried.get());

    let err = resolver::resolve(&stub, "").expect_err("empty domain should fail");
    assert!(matches!(err, Error::UnresolvableHost));
}

#[test]
fn resolve_sorts_normalizes_and_dedups_records() {
    let stub = StubResolver::new(|domain| {
        assert_eq!(domain, "example.com");
        Ok(vec![
            MxRecord::new(20, "mx2.example.com."),
            MxRecord::new(10, "MX1.example.com."),
            MxRecord::new(10, "mx1.example.com"),
            MxRecord::new(30, "mx3.example.com."),
        ])
    });

    let records = resolver::resolve(&stub, "example.com").expect("lookup succeeds");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0], MxRecord::new(10, "mx1.example.com"));
    assert_eq!(records[1].exchange, "mx2.example.com");
    assert_eq!(records[2].preference, 30);
}

#[test]
fn no_records_is_unresolvable() {
    let stub = StubResolver::with_records(Vec::new());
    let err = resolver::resolve(&stub, "example.com").expect_err("no exchangers");
    assert!(matches!(err, Error::UnresolvableHost));
}

#[test]
fn null_mx_is_unresolvable() {
    let stub = StubResolver::with_records(vec![MxRecord::new(0, ".")]);
    let err = resolver::resolve_with(&stub, "example.com").expect_err("null MX");
    assert!(matches!(err, LookupError::NoRecords));
}

#[test]
fn lookup_errors_collapse_to_unresolvable() {
    let err = resolver::resolve(&StubResolver::failing(), "example.com").expect_err("fails");
    assert!(matches!(err, Error::UnresolvableHost));
}

#[test]
fn normalize_exchange_trims_dot_and_lowercases() {
    assert_eq!(
        resolver::normalize_exchange("Mail.EXAMPLE.com."),
        "mail.example.com"
    );
}

#[test]
fn invalid_tld_is_unresolvable() {
    // `.invalid` is reserved (RFC 2606); this holds with or without network.
    let err = super::lookup_mx("nonexistent-domain-xyz.invalid").expect_err("reserved TLD");
    assert!(matches!(err, Error::UnresolvableHost));
}
