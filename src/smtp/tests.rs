use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::{SessionState, SmtpClient, SmtpFailure, Stage, dial_exchange};

pub(crate) type Script = Vec<(&'static str, &'static str)>;

/// Loopback SMTP server answering `sessions` connections in turn. Each one
/// gets `greeting`, then every scripted command is checked and answered.
/// After the script, `QUIT` gets a `221` and anything else a `502`, until
/// the client hangs up.
pub(crate) fn spawn_mock_server(
    greeting: &'static str,
    script: Script,
    sessions: usize,
) -> (u16, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("addr").port();
    let (ready_tx, ready_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        ready_tx.send(()).ok();
        let mut seen = Vec::new();
        for _ in 0..sessions {
            if let Ok((mut stream, _)) = listener.accept() {
                handle_session(&mut stream, greeting, &script, &mut seen).ok();
            }
        }
        seen
    });
    ready_rx.recv().expect("server ready");
    (port, handle)
}

fn handle_session(
    stream: &mut TcpStream,
    greeting: &str,
    script: &Script,
    seen: &mut Vec<String>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    stream.write_all(greeting.as_bytes())?;
    stream.flush()?;
    for (expected, response) in script {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        seen.push(line.trim_end().to_string());
        assert!(
            line.starts_with(expected),
            "expected command starting with '{expected}', got '{line}'"
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()?;
    }
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        seen.push(line.trim_end().to_string());
        if line.starts_with("QUIT") {
            stream.write_all(b"221 2.0.0 Bye\r\n")?;
            stream.flush()?;
            return Ok(());
        }
        stream.write_all(b"502 5.5.2 Unexpected command\r\n")?;
        stream.flush()?;
    }
}

fn connect(port: u16) -> SmtpClient {
    let conn = dial_exchange("127.0.0.1", port, Duration::from_secs(5)).expect("dial");
    SmtpClient::new(conn, "mock.smtp.test").expect("greeting")
}

#[test]
fn walks_the_full_handshake() {
    let (port, handle) = spawn_mock_server(
        "220 mock.smtp.test ESMTP\r\n",
        vec![
            ("EHLO client.test", "250-mock.smtp.test\r\n250 PIPELINING\r\n"),
            ("MAIL FROM:<sender@client.test>", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:<user@example.com>", "250 2.1.5 Ok\r\n"),
        ],
        1,
    );
    let mut client = connect(port);
    assert_eq!(client.state(), SessionState::Connected);
    client.hello("client.test").expect("hello");
    assert!(client.has_extension("pipelining"));
    client.mail("sender@client.test").expect("mail");
    client.rcpt("user@example.com").expect("rcpt");
    assert_eq!(client.state(), SessionState::RecipientDeclared);
    client.close();

    let seen = handle.join().expect("server thread");
    assert_eq!(seen.last().map(String::as_str), Some("QUIT"));
}

#[test]
fn falls_back_to_helo() {
    let (port, handle) = spawn_mock_server(
        "220 old.smtp.test\r\n",
        vec![
            ("EHLO", "500 5.5.1 Command unrecognized\r\n"),
            ("HELO client.test", "250 old.smtp.test\r\n"),
        ],
        1,
    );
    let mut client = connect(port);
    client.hello("client.test").expect("hello via HELO");
    assert_eq!(client.state(), SessionState::Greeted);
    assert!(!client.has_extension("STARTTLS"));
    client.close();
    handle.join().expect("server thread");
}

#[test]
fn non_220_greeting_is_rejected_with_its_code() {
    let (port, handle) = spawn_mock_server("554 5.3.2 No service\r\n", Vec::new(), 1);
    let conn = dial_exchange("127.0.0.1", port, Duration::from_secs(5)).expect("dial");
    let err = SmtpClient::new(conn, "mock").expect_err("greeting refused");
    match err {
        SmtpFailure::Reply { stage, reply } => {
            assert_eq!(stage, Stage::Greeting);
            assert_eq!(reply.code, 554);
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    handle.join().expect("server thread");
}

#[test]
fn rejected_recipient_keeps_state() {
    let (port, handle) = spawn_mock_server(
        "220 mock.smtp.test ESMTP\r\n",
        vec![
            ("EHLO", "250 mock.smtp.test\r\n"),
            ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:", "550 5.1.1 User unknown\r\n"),
        ],
        1,
    );
    let mut client = connect(port);
    client.hello("client.test").expect("hello");
    client.mail("sender@client.test").expect("mail");
    let err = client.rcpt("nobody@example.com").expect_err("rejected");
    assert_eq!(err.reply().map(|r| r.code), Some(550));
    assert_eq!(err.stage(), Some(Stage::RcptTo));
    assert_eq!(client.state(), SessionState::SenderDeclared);
    client.close();
    handle.join().expect("server thread");
}

#[test]
fn commands_out_of_sequence_are_refused_locally() {
    let (port, handle) = spawn_mock_server("220 mock.smtp.test ESMTP\r\n", Vec::new(), 1);
    let mut client = connect(port);
    let err = client.rcpt("user@example.com").expect_err("no MAIL FROM yet");
    assert!(matches!(
        err,
        SmtpFailure::OutOfSequence {
            command: "RCPT TO",
            state: SessionState::Connected,
        }
    ));
    let err = client.mail("sender@client.test").expect_err("no EHLO yet");
    assert!(matches!(err, SmtpFailure::OutOfSequence { .. }));
    client.close();

    let seen = handle.join().expect("server thread");
    assert_eq!(seen, vec!["QUIT".to_string()]);
}

#[test]
fn line_breaks_in_arguments_are_refused() {
    let (port, handle) = spawn_mock_server(
        "220 mock.smtp.test ESMTP\r\n",
        vec![
            ("EHLO", "250 mock.smtp.test\r\n"),
            ("MAIL FROM:<sender@client.test>", "250 2.1.0 Ok\r\n"),
        ],
        1,
    );
    let mut client = connect(port);
    let err = client
        .hello("client.test\r\nRSET")
        .expect_err("CRLF injection");
    assert!(matches!(err, SmtpFailure::InvalidInput { .. }));
    client.hello("client.test").expect("hello");
    let err = client
        .mail("a@b.test>\r\nRCPT TO:<victim@example.com")
        .expect_err("CRLF injection");
    assert!(matches!(err, SmtpFailure::InvalidInput { .. }));
    client.mail("sender@client.test").expect("mail");
    let err = client.rcpt("a@b\r\nDATA").expect_err("CRLF injection");
    assert!(matches!(err, SmtpFailure::InvalidInput { .. }));
    assert_eq!(client.state(), SessionState::SenderDeclared);
    client.close();

    let seen = handle.join().expect("server thread");
    assert!(!seen.iter().any(|line| line.starts_with("DATA") || line.starts_with("RCPT")));
}

#[test]
fn stalled_handshake_hits_the_connection_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        stream.write_all(b"220 slow.smtp.test\r\n").ok();
        // Never answer EHLO.
        thread::sleep(Duration::from_millis(800));
    });

    let conn = dial_exchange("127.0.0.1", port, Duration::from_millis(300)).expect("dial");
    let mut client = SmtpClient::new(conn, "slow.smtp.test").expect("greeting");
    let err = client.hello("client.test").expect_err("stalled");
    assert!(
        matches!(
            err,
            SmtpFailure::DeadlineExceeded {
                stage: Stage::Hello
            }
        ),
        "{err:?}"
    );
    client.close();
    server.join().expect("server thread");
}
