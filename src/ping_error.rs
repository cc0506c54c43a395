use std::net::Ipv4Addr;
use std::{error::Error, fmt, io};

pub type GenericError = Box<dyn Error + Send + Sync + 'static>;

pub type PingResult<T> = std::result::Result<T, PingError>;

#[derive(Debug)]
pub enum PingError {
    /// No matching echo reply arrived before the deadline. The pinger stays usable.
    Timeout {
        addr: Ipv4Addr,
        sequence_number: u16,
    },
    /// The echo request could not be sent.
    Send {
        addr: Ipv4Addr,
        sequence_number: u16,
        source: io::Error,
    },
    /// The shared socket failed.
    Io(io::Error),
    Message { message: String },
}

impl PingError {
    pub(crate) fn message(message: impl Into<String>) -> PingError {
        PingError::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, PingError::Timeout { .. })
    }

    /// The sequence number of the echo request this error belongs to, if any.
    #[must_use]
    pub fn sequence_number(&self) -> Option<u16> {
        match self {
            Self::Timeout { sequence_number, .. } | Self::Send { sequence_number, .. } => {
                Some(*sequence_number)
            }
            Self::Io(_) | Self::Message { .. } => None,
        }
    }
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            PingError::Timeout {
                addr,
                sequence_number,
            } => write!(f, "timeout from {addr}: icmp_seq={sequence_number}"),
            PingError::Send {
                addr,
                sequence_number: seq,
                source,
            } => write!(f, "could not send to {addr}: icmp_seq={seq}: {source}"),
            PingError::Io(e) => write!(f, "socket error: {e}"),
            PingError::Message { message } => {
                write!(f, "PingError")?;
                if !message.is_empty() {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for PingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PingError::Send { source, .. } => Some(source),
            PingError::Io(e) => Some(e),
            PingError::Timeout { .. } | PingError::Message { .. } => None,
        }
    }
}

impl From<io::Error> for PingError {
    fn from(error: io::Error) -> PingError {
        PingError::Io(error)
    }
}
