//! Syntactic address check.
//!
//! [`validate_format`] is a pure predicate over the mailbox grammar. It is
//! independent from the MX and SMTP tiers: an address it rejects may still
//! split into a usable domain, and the other way round.

mod grammar;

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::Error;

static MAILBOX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(&grammar::mailbox())
        .case_insensitive(true)
        .build()
        .expect("mailbox grammar is a valid pattern")
});

/// Check `address` against the mailbox grammar (`local@domain`, optionally
/// as `Display Name <local@domain>`), ignoring case.
pub fn validate_format(address: &str) -> Result<(), Error> {
    if is_valid_format(address) {
        Ok(())
    } else {
        Err(Error::BadFormat)
    }
}

pub fn is_valid_format(address: &str) -> bool {
    MAILBOX.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn grammar_compiles() {
        assert!(Regex::new(&grammar::addr_spec()).is_ok());
        LazyLock::force(&MAILBOX);
    }

    #[test]
    fn accepts_common_addresses() {
        for ok in [
            "user@example.com",
            "USER@EXAMPLE.COM",
            "first.last+tag@sub.example.co.uk",
            "o'brien@example.ie",
            "\"john doe\"@example.com",
            "\"quoted\\\"quote\"@example.com",
            "admin@[192.0.2.1]",
            "user@localhost",
            "John Doe <john@example.com>",
            "\"Doe, John\" <john@example.com>",
            "<john@example.com>",
        ] {
            assert!(validate_format(ok).is_ok(), "{ok:?} should be accepted");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "not-an-email",
            "",
            "@domain.com",
            "user@",
            "user@@example.com",
            ".user@example.com",
            "user.@example.com",
            "us..er@example.com",
            "user@example..com",
            "user name@example.com",
            "user@exa mple.com",
            "user@example.com\n",
            "John <john@example.com",
            "a\"b@example.com",
        ] {
            assert!(
                matches!(validate_format(bad), Err(Error::BadFormat)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_comments_and_folding_white_space() {
        for ok in [
            "(comment)user@example.com",
            "user(comment)@example.com",
            "user@(comment)example.com",
            "user@example.com (Work)",
            " user@example.com ",
            "(a) (b) user@example.com",
            "user@example.com\r\n (folded)",
            "(escaped \\) paren)user@example.com",
            "John (work) <john@example.com>",
            "John Doe <(c)john@example.com>",
        ] {
            assert!(is_valid_format(ok), "{ok:?} should be accepted");
        }
    }

    #[test]
    fn rejects_broken_comments() {
        for bad in [
            "((nested))user@example.com",
            "(unterminated user@example.com",
            "user@example.com)",
            "us(comment)er@example.com",
            "user@exa(comment)mple.com",
            "user@example.com\n (bare LF)",
        ] {
            assert!(!is_valid_format(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn empty_local_part_disagrees_with_the_splitter() {
        let (local, domain) = crate::address::split("@domain.com");
        assert_eq!((local, domain), ("", "domain.com"));
        assert!(!is_valid_format("@domain.com"));
    }

    proptest! {
        #[test]
        fn no_at_sign_never_validates(raw in "[^@<>\"]*") {
            prop_assert!(!is_valid_format(&raw));
        }

        #[test]
        fn simple_addresses_validate(
            local in "[a-z0-9][a-z0-9._+-]{0,15}[a-z0-9]",
            host in "[a-z][a-z0-9-]{0,10}[a-z0-9]",
            tld in "[a-z]{2,6}",
        ) {
            prop_assume!(!local.contains(".."));
            let address = format!("{local}@{host}.{tld}");
            prop_assert!(is_valid_format(&address), "{}", address);
        }
    }
}
