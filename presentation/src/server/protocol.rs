//! Client wire protocol
//!
//! Requests are `SH <command> [<length> <data>]$`, responses are
//! `SH <code> <length> <data>$\r\n`. Tokens are separated by a single space
//! and `<data>` runs from after the length token up to the first `$`.

use std::fmt;
use thiserror::Error;

/// Magic token opening every request and response
pub const MAGIC: &str = "SH";

/// End-of-message delimiter
pub const DELIMITER: char = '$';

/// Request and response read/parse failures.
///
/// The display text is what the client receives in the ERROR response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid magic string")]
    InvalidMagic,

    #[error("Missing command")]
    MissingCommand,

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Missing length")]
    MissingLength,

    #[error("Invalid length")]
    InvalidLength,

    #[error("Length exceeds the maximum allowed size")]
    LengthTooLarge,

    #[error("Missing delimiter")]
    MissingDelimiter,

    #[error("Data length mismatch")]
    DataLengthMismatch,

    #[error("Connection closed by client")]
    ConnectionClosed,

    #[error("Message size exceeds the maximum allowed size")]
    MessageTooLarge,

    #[error("Message is not valid UTF-8")]
    InvalidEncoding,

    #[error("Failed to read data: {0}")]
    Io(String),

    #[error("Bad Request")]
    BadRequest,
}

/// Command codes of the client protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    GetAnswers = 0,
    SetAnswers = 1,
    Review = 2,
    Echo = 3,
    Shutdown = 4,
}

impl Command {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Command::GetAnswers),
            1 => Some(Command::SetAnswers),
            2 => Some(Command::Review),
            3 => Some(Command::Echo),
            4 => Some(Command::Shutdown),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the command carries `<length> <data>`
    pub fn takes_data(self) -> bool {
        !matches!(self, Command::GetAnswers | Command::Shutdown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::GetAnswers => "GET_ANSWERS",
            Command::SetAnswers => "SET_ANSWERS",
            Command::Review => "REVIEW",
            Command::Echo => "ECHO",
            Command::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetAnswers,
    SetAnswers(String),
    Review(String),
    Echo(String),
    Shutdown,
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::GetAnswers => Command::GetAnswers,
            Request::SetAnswers(_) => Command::SetAnswers,
            Request::Review(_) => Command::Review,
            Request::Echo(_) => Command::Echo,
            Request::Shutdown => Command::Shutdown,
        }
    }

    fn data(&self) -> Option<&str> {
        match self {
            Request::SetAnswers(data) | Request::Review(data) | Request::Echo(data) => Some(data),
            Request::GetAnswers | Request::Shutdown => None,
        }
    }

    /// Frame the request for the wire
    pub fn encode(&self) -> String {
        let code = self.command().code();
        match self.data() {
            Some(data) => format!("{MAGIC} {code} {} {data}{DELIMITER}", data.len()),
            None => format!("{MAGIC} {code}{DELIMITER}"),
        }
    }

    fn with_data(command: Command, data: String) -> Self {
        match command {
            Command::SetAnswers => Request::SetAnswers(data),
            Command::Review => Request::Review(data),
            Command::Echo => Request::Echo(data),
            Command::GetAnswers => Request::GetAnswers,
            Command::Shutdown => Request::Shutdown,
        }
    }
}

/// Split off the token before the next space.
///
/// Returns the token and the remainder after the space, or `None` as the
/// remainder when no space follows.
fn next_token(input: &str) -> (&str, Option<&str>) {
    match input.split_once(' ') {
        Some((token, rest)) => (token, Some(rest)),
        None => (input, None),
    }
}

/// Parse one request.
///
/// `message` is the received text; everything from the first `$` on is
/// ignored. `max_length` bounds the declared data length.
pub fn parse_request(message: &str, max_length: usize) -> Result<Request, ProtocolError> {
    let body = match message.split_once(DELIMITER) {
        Some((body, _)) => body,
        None => return Err(ProtocolError::MissingDelimiter),
    };

    let (magic, rest) = next_token(body);
    if magic != MAGIC {
        return Err(ProtocolError::InvalidMagic);
    }

    let (command_token, rest) = match rest {
        Some(rest) => next_token(rest),
        None => return Err(ProtocolError::MissingCommand),
    };
    if command_token.is_empty() {
        return Err(ProtocolError::MissingCommand);
    }
    let command = command_token
        .parse::<u8>()
        .ok()
        .and_then(Command::from_code)
        .ok_or(ProtocolError::InvalidCommand)?;

    if !command.takes_data() {
        return Ok(Request::with_data(command, String::new()));
    }

    let (length_token, data) = match rest {
        Some(rest) => next_token(rest),
        None => return Err(ProtocolError::MissingLength),
    };
    if length_token.is_empty() {
        return Err(ProtocolError::MissingLength);
    }
    let length = length_token
        .parse::<usize>()
        .map_err(|_| ProtocolError::InvalidLength)?;
    if length > max_length {
        return Err(ProtocolError::LengthTooLarge);
    }

    let data = data.ok_or(ProtocolError::MissingDelimiter)?;
    if data.len() != length {
        return Err(ProtocolError::DataLengthMismatch);
    }

    Ok(Request::with_data(command, data.to_string()))
}

/// Response status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0,
    Error = 1,
}

impl ResponseCode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ResponseCode::Ok),
            1 => Some(ResponseCode::Error),
            _ => None,
        }
    }
}

/// A response to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    pub data: String,
}

impl Response {
    pub fn ok(data: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::Ok,
            data: data.into(),
        }
    }

    pub fn error(data: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::Error,
            data: data.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }

    /// Frame the response for the wire
    pub fn encode(&self) -> String {
        format!(
            "{MAGIC} {} {} {}{DELIMITER}\r\n",
            self.code as u8,
            self.data.len(),
            self.data
        )
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Response::error(err.to_string())
    }
}

/// Parse a framed response.
///
/// The data is taken by its declared length, so it may itself contain `$`.
pub fn parse_response(message: &str) -> Result<Response, ProtocolError> {
    let (magic, rest) = next_token(message);
    if magic != MAGIC {
        return Err(ProtocolError::InvalidMagic);
    }

    let (code_token, rest) = next_token(rest.ok_or(ProtocolError::MissingCommand)?);
    let code = code_token
        .parse::<u8>()
        .ok()
        .and_then(ResponseCode::from_code)
        .ok_or(ProtocolError::InvalidCommand)?;

    let (length_token, rest) = next_token(rest.ok_or(ProtocolError::MissingLength)?);
    let length = length_token
        .parse::<usize>()
        .map_err(|_| ProtocolError::InvalidLength)?;

    let rest = rest.ok_or(ProtocolError::MissingDelimiter)?;
    let data = rest.get(..length).ok_or(ProtocolError::DataLengthMismatch)?;
    if !rest[length..].starts_with(DELIMITER) {
        return Err(ProtocolError::MissingDelimiter);
    }

    Ok(Response {
        code,
        data: data.to_string(),
    })
}
