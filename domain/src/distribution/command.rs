//! Worker control commands

use super::codec::CodecError;

/// The only two control signals a coordinator sends to a worker.
///
/// Encoded as a single byte on the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Shutdown,
    Review,
}

impl WorkerCommand {
    pub fn as_byte(self) -> u8 {
        match self {
            WorkerCommand::Shutdown => 0,
            WorkerCommand::Review => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerCommand::Shutdown => "shutdown",
            WorkerCommand::Review => "review",
        }
    }
}

impl TryFrom<u8> for WorkerCommand {
    type Error = CodecError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(WorkerCommand::Shutdown),
            1 => Ok(WorkerCommand::Review),
            other => Err(CodecError::UnknownCommand(other)),
        }
    }
}

impl std::fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
