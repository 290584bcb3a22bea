//! Line codec for the control channel.
//!
//! A request is one line of comma separated fields. A response is a status token
//! followed by zero or more fields, every element terminated by the delimiter, and the
//! whole response terminated by a newline: `OK,10,20,\n`.

use std::fmt;

pub const DELIMITER: char = ',';

/// Version reported by `GET,TRANSPORT_VERSION`.
pub const TRANSPORT_VERSION: u32 = 1;

/// Split a raw request line into fields.
///
/// The delimiter is never escaped, so a value containing it is cut at the first
/// occurrence. An empty line still yields a single empty field.
pub fn split_request(line: &str) -> Vec<&str> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    line.split(DELIMITER).collect()
}

/// Join fields into a newline terminated request line.
pub fn encode_request<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());
    line.push('\n');
    line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadCommand,
    BadArgument,
    TargetInvalid,
    MsgNotFound,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadCommand => "BadCommand",
            Status::BadArgument => "BadArgument",
            Status::TargetInvalid => "TargetInvalid",
            Status::MsgNotFound => "MSG_NOT_FOUND",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "OK" => Some(Status::Ok),
            "BadCommand" => Some(Status::BadCommand),
            "BadArgument" => Some(Status::BadArgument),
            "TargetInvalid" => Some(Status::TargetInvalid),
            "MSG_NOT_FOUND" => Some(Status::MsgNotFound),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus ordered fields, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    fields: Vec<String>,
}

impl Default for Response {
    fn default() -> Self {
        Self::with_status(Status::BadCommand)
    }
}

impl Response {
    pub fn ok() -> Self {
        Self::with_status(Status::Ok)
    }

    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, value: impl ToString) -> Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(16);
        out.push_str(self.status.as_str());
        out.push(DELIMITER);
        for field in &self.fields {
            out.push_str(field);
            out.push(DELIMITER);
        }
        out.push('\n');
        out
    }

    /// Parse an encoded response line. Returns `None` for an unknown status token.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut parts: Vec<&str> = line.split(DELIMITER).collect();
        // every element is delimiter terminated, so the final split piece is empty
        if parts.len() > 1 && parts.last() == Some(&"") {
            parts.pop();
        }
        let mut parts = parts.into_iter();
        let status = Status::parse(parts.next()?)?;
        Some(Self {
            status,
            fields: parts.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode().trim_end_matches('\n'))
    }
}
