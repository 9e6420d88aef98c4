//! Pieces of the mailbox grammar (RFC 5322 §3.4), assembled into one
//! anchored pattern. Comments and folding white space may surround every
//! token; comments do not nest.

/// `atext`, matched case-insensitively.
const ATEXT: &str = r"[a-z0-9!#$%&'*+/=?^_`{|}~\-]";
/// `qtext`: printable ASCII except `"` and `\`.
const QTEXT: &str = r"[\x21\x23-\x5b\x5d-\x7e]";
/// `ctext`: printable ASCII except `(`, `)` and `\`.
const CTEXT: &str = r"[\x21-\x27\x2a-\x5b\x5d-\x7e]";
const QUOTED_PAIR: &str = r"\\[\x20-\x7e]";
/// `dtext`: printable ASCII except `[`, `]` and `\`.
const DTEXT: &str = r"[\x21-\x5a\x5e-\x7e]";
const WSP: &str = r"[ \t]";

/// `FWS`: white space, optionally folded onto a new line.
fn fws() -> String {
    format!(r"(?:\r\n)?{WSP}+")
}

fn comment() -> String {
    let fws = fws();
    format!(r"\((?:(?:{fws})?(?:{CTEXT}|{QUOTED_PAIR}))*(?:{fws})?\)")
}

/// `CFWS`: comments with optional white space between them, or white space
/// alone.
fn cfws() -> String {
    let fws = fws();
    format!("(?:(?:(?:{fws})?{})+(?:{fws})?|{fws})", comment())
}

/// `pattern` with optional CFWS on both sides.
fn padded(pattern: &str) -> String {
    let cfws = cfws();
    format!("(?:{cfws})?{pattern}(?:{cfws})?")
}

fn dot_atom() -> String {
    format!(r"{ATEXT}+(?:\.{ATEXT}+)*")
}

fn quoted_string() -> String {
    format!(r"\x22(?:{WSP}*(?:{QTEXT}|{QUOTED_PAIR}))*{WSP}*\x22")
}

fn domain_literal() -> String {
    format!(r"\[(?:{WSP}*{DTEXT})*{WSP}*\]")
}

pub(super) fn addr_spec() -> String {
    let dot_atom = dot_atom();
    let local = format!("(?:{}|{})", padded(&dot_atom), padded(&quoted_string()));
    let domain = format!("(?:{}|{})", padded(&dot_atom), padded(&domain_literal()));
    format!("{local}@{domain}")
}

fn display_name() -> String {
    let word = format!("(?:{ATEXT}+|{})", quoted_string());
    format!("(?:{})+", padded(&word))
}

/// `mailbox = addr-spec / [display-name] "<" addr-spec ">"`, anchored.
pub(super) fn mailbox() -> String {
    let addr_spec = addr_spec();
    let angle_addr = padded(&format!("<{addr_spec}>"));
    format!("^(?:{addr_spec}|(?:{})?{angle_addr})$", display_name())
}
