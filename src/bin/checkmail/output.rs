#[cfg(any(feature = "with-serde", feature = "with-csv"))]
use anyhow::Context;
use anyhow::{Result, bail};
use checkmail::{Error, ErrorKind, SmtpCode, describe_code};

use crate::args::{Cli, Tier};

#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub address: String,
    pub tier: &'static str,
    pub valid: bool,
    pub kind: Option<ErrorKind>,
    /// SMTP status, or the leading characters of a non-protocol error.
    pub code: Option<String>,
    pub description: Option<&'static str>,
    pub error: Option<String>,
}

impl OutputRow {
    pub fn new(address: &str, tier: Tier, outcome: &Result<(), Error>) -> Self {
        let mut row = Self {
            address: address.to_string(),
            tier: tier.as_str(),
            valid: outcome.is_ok(),
            kind: None,
            code: None,
            description: None,
            error: None,
        };
        if let Err(err) = outcome {
            row.kind = Some(err.kind());
            row.error = Some(err.to_string());
            if let Some(smtp) = err.as_smtp() {
                let code = smtp.code();
                if let SmtpCode::Reply(value) = code {
                    row.description = describe_code(value);
                }
                row.code = Some(code.to_string());
            }
        }
        row
    }
}

pub fn write_reports(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    match cli.format.as_str() {
        "human" => write_human(rows),
        "json" => write_json(rows, cli),
        "ndjson" => write_ndjson(rows, cli),
        "csv" => write_csv(rows, cli),
        other => bail!("unknown --format '{other}', use: human|json|ndjson|csv"),
    }
}

pub fn any_invalid(rows: &[OutputRow]) -> bool {
    rows.iter().any(|row| !row.valid)
}

fn write_human(rows: &[OutputRow]) -> Result<()> {
    for row in rows {
        println!("{}", human_line(row));
    }
    Ok(())
}

fn human_line(row: &OutputRow) -> String {
    if row.valid {
        return format!("[OK]      {} ({})", row.address, row.tier);
    }
    let mut line = format!("[INVALID] {} ({})", row.address, row.tier);
    if let Some(kind) = row.kind {
        line.push_str(&format!(" :: {kind}"));
    }
    if let Some(error) = &row.error {
        line.push_str(&format!(": {error}"));
    }
    if let Some(description) = row.description {
        line.push_str(&format!(" [{description}]"));
    }
    line
}

#[cfg(feature = "with-serde")]
fn write_json(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    let payload = serde_json::to_string_pretty(rows).context("encode JSON report")?;
    match &cli.out {
        Some(path) => write_all_atomically(path, payload.as_bytes()),
        None => {
            println!("{payload}");
            Ok(())
        }
    }
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_rows: &[OutputRow], _cli: &Cli) -> Result<()> {
    bail!("format=json requires the 'with-serde' feature")
}

#[cfg(feature = "with-serde")]
fn write_ndjson(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    let mut buf = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut buf, row).context("encode NDJSON row")?;
        buf.push(b'\n');
    }
    match &cli.out {
        Some(path) => write_all_atomically(path, &buf),
        None => {
            print!("{}", String::from_utf8_lossy(&buf));
            Ok(())
        }
    }
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson(_rows: &[OutputRow], _cli: &Cli) -> Result<()> {
    bail!("format=ndjson requires the 'with-serde' feature")
}

#[cfg(feature = "with-csv")]
fn write_csv(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row).context("encode CSV row")?;
    }
    let data = wtr.into_inner().context("flush CSV writer")?;
    match &cli.out {
        Some(path) => write_all_atomically(path, &data),
        None => {
            print!("{}", String::from_utf8_lossy(&data));
            Ok(())
        }
    }
}

#[cfg(not(feature = "with-csv"))]
fn write_csv(_rows: &[OutputRow], _cli: &Cli) -> Result<()> {
    bail!("format=csv requires the 'with-csv' feature")
}

#[cfg(any(feature = "with-serde", feature = "with-csv"))]
fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp).with_context(|| format!("create {tmp}"))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} to {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkmail::{SmtpFailure, SmtpReply, Stage};

    #[test]
    fn passing_row_has_no_error_fields() {
        let row = OutputRow::new("user@example.com", Tier::Mx, &Ok(()));
        assert!(row.valid);
        assert_eq!(row.kind, None);
        assert_eq!(human_line(&row), "[OK]      user@example.com (mx)");
    }

    #[test]
    fn unresolvable_row() {
        let row = OutputRow::new("nope", Tier::Host, &Err(Error::UnresolvableHost));
        assert!(!row.valid);
        assert_eq!(row.code, None);
        insta::assert_snapshot!(
            human_line(&row),
            @"[INVALID] nope (host) :: unresolvable_host: unresolvable host"
        );
    }

    #[test]
    fn rejected_recipient_row_carries_code_and_description() {
        let failure = SmtpFailure::Reply {
            stage: Stage::RcptTo,
            reply: SmtpReply::new(550, ["5.1.1 User unknown"]),
        };
        let row = OutputRow::new("x@example.com", Tier::User, &Err(Error::from(failure)));
        assert_eq!(row.kind, Some(ErrorKind::Smtp));
        assert_eq!(row.code.as_deref(), Some("550"));
        assert!(row.description.is_some());
        assert!(any_invalid(&[row]));
    }
}
