//! STOMP 1.2 frame codec.
//!
//! Frames travel as WebSocket text messages:
//!
//! ```text
//! COMMAND\n
//! header:value\n
//! ...\n
//! \n
//! body\0
//! ```
//!
//! A text message holding only an EOL is a heart-beat and decodes to `None`.
//! Header names and values are escaped (`\\`, `\n`, `\r`, `\c`) on every
//! command except `CONNECT` and `CONNECTED`.

use std::fmt;

use thiserror::Error;

/// STOMP frame decoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StompError {
    /// Command line is not a known command.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Header line without a colon.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// Header uses an escape STOMP does not define.
    #[error("invalid escape in header: {0:?}")]
    InvalidEscape(String),

    /// Frame ended before the blank line or the NUL terminator.
    #[error("truncated frame")]
    Truncated,
}

/// Frame commands used by the client and the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client: open a session.
    Connect,
    /// Broker: session opened.
    Connected,
    /// Client: publish to a destination.
    Send,
    /// Client: subscribe to a destination.
    Subscribe,
    /// Client: cancel a subscription.
    Unsubscribe,
    /// Client: close the session.
    Disconnect,
    /// Broker: message on a subscription.
    Message,
    /// Broker: receipt for a client frame.
    Receipt,
    /// Broker: error, usually followed by closing the socket.
    Error,
}

impl Command {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    fn parse(line: &str) -> Result<Self, StompError> {
        Ok(match line {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(StompError::UnknownCommand(other.to_owned())),
        })
    }

    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A STOMP frame with a UTF-8 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Repeated names are allowed; the first wins.
    pub headers: Vec<(String, String)>,
    /// Body (JSON for every frame this client handles).
    pub body: String,
}

impl Frame {
    /// Frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: String::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// `CONNECT` for STOMP 1.2 without heart-beating.
    pub fn connect(host: &str) -> Self {
        Self::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    /// `SUBSCRIBE` with auto acknowledgement.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// `SEND` of a JSON body.
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        Self::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(body)
    }

    /// `DISCONNECT`.
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Serialize to wire text, NUL terminator included.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                push_escaped(&mut out, name);
                out.push(':');
                push_escaped(&mut out, value);
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse wire text. Returns `Ok(None)` for a heart-beat.
    ///
    /// When a `content-length` header is present the body is exactly that many
    /// bytes; otherwise it runs to the first NUL.
    pub fn decode(text: &str) -> Result<Option<Self>, StompError> {
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_head(text).ok_or(StompError::Truncated)?;
        let mut lines = head.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

        let command = Command::parse(lines.next().ok_or(StompError::Truncated)?)?;
        let escaped = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) =
                line.split_once(':').ok_or_else(|| StompError::MalformedHeader(line.to_owned()))?;
            if escaped {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_owned(), value.to_owned()));
            }
        }

        let mut frame = Self { command, headers, body: String::new() };
        let length = frame.get("content-length").and_then(|v| v.trim().parse::<usize>().ok());
        frame.body = match length {
            Some(length) => rest.get(..length).ok_or(StompError::Truncated)?.to_owned(),
            None => rest.split_once('\0').ok_or(StompError::Truncated)?.0.to_owned(),
        };
        Ok(Some(frame))
    }
}

/// Split at the blank line that ends the headers.
fn split_head(text: &str) -> Option<(&str, &str)> {
    let lf = text.find("\n\n").map(|i| (i, 2));
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let (index, width) = match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    Some((&text[..index], &text[index + width..]))
}

fn push_escaped(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::InvalidEscape(raw.to_owned())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_send_frame() {
        let frame = Frame::send("/app/send-private-messages", r#"{"id":1}"#);
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/send-private-messages\ncontent-type:application/json\n\n{\"id\":1}\0"
        );
    }

    #[test]
    fn decodes_message_frame() {
        let wire = "MESSAGE\r\ndestination:/user/queue/private-messages\r\nsubscription:sub-0\r\n\r\n{\"content\":\"hi\"}\0\n";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/user/queue/private-messages"));
        assert_eq!(frame.body, "{\"content\":\"hi\"}");
    }

    #[test]
    fn heartbeat_is_none() {
        assert_eq!(Frame::decode("\n"), Ok(None));
        assert_eq!(Frame::decode("\r\n"), Ok(None));
    }

    #[test]
    fn headers_are_escaped_except_on_connect() {
        let frame = Frame::new(Command::Send).header("note", "a:b\nc\\");
        assert!(frame.encode().contains("note:a\\cb\\nc\\\\\n"));
        let back = Frame::decode(&frame.encode()).unwrap().unwrap();
        assert_eq!(back.get("note"), Some("a:b\nc\\"));

        let connect = Frame::connect("localhost:8080");
        assert!(connect.encode().contains("host:localhost:8080\n"));
    }

    #[test]
    fn content_length_bounds_body() {
        let wire = "MESSAGE\ncontent-length:2\n\nab\0cd\0";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.body, "ab");
    }

    #[test]
    fn rejects_bad_frames() {
        assert_eq!(Frame::decode("HELLO\n\n\0"), Err(StompError::UnknownCommand("HELLO".into())));
        assert_eq!(
            Frame::decode("MESSAGE\nnocolon\n\n\0"),
            Err(StompError::MalformedHeader("nocolon".into()))
        );
        assert_eq!(Frame::decode("MESSAGE\ndestination:x\n"), Err(StompError::Truncated));
        assert_eq!(Frame::decode("MESSAGE\n\nbody without nul"), Err(StompError::Truncated));
        assert!(matches!(
            Frame::decode("ERROR\nmessage:bad\\x\n\n\0"),
            Err(StompError::InvalidEscape(_))
        ));
    }

    #[test]
    fn error_frame_carries_message_header() {
        let frame = Frame::decode("ERROR\nmessage:Bad destination\n\ndetails\0").unwrap().unwrap();
        assert_eq!(frame.command, Command::Error);
        assert_eq!(frame.get("message"), Some("Bad destination"));
        assert_eq!(frame.body, "details");
    }
}
