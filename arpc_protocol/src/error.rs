use std::{error::Error as StdError, fmt, io, result};

/// A specialized Result type for arpc operations.
pub type Result<T> = result::Result<T, Error>;

/// A list specifying general categories of arpc errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// malformed frames, bad magic numbers, truncated bodies.
    Protocol,
    IO,
    /// errors raised by the client before or after the call reached the wire.
    Client,
    Network,
    /// errors reported by the remote service.
    Server,
    Serialization,
    Timeout,
    InvalidArgument,
    Other,
}

impl ErrorKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match *self {
            ErrorKind::Protocol => "invalid protocol",
            ErrorKind::IO => "io issue",
            ErrorKind::Client => "client error",
            ErrorKind::Network => "network issue",
            ErrorKind::Server => "server error",
            ErrorKind::Serialization => "serialization failure",
            ErrorKind::Timeout => "call timed out",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Error {
    repr: Repr,
}

enum Repr {
    Other(String),
    Simple(ErrorKind),
    Custom(Box<Custom>),
}

#[derive(Debug)]
struct Custom {
    kind: ErrorKind,
    error: Box<dyn StdError + Send + Sync>,
}

impl Error {
    /// Creates a new error from a known kind of error as well as an
    /// arbitrary error payload.
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            repr: Repr::Custom(Box::new(Custom {
                kind,
                error: error.into(),
            })),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            Repr::Other(_) => ErrorKind::Other,
            Repr::Custom(ref c) => c.kind,
            Repr::Simple(kind) => kind,
        }
    }

    pub fn get_ref(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self.repr {
            Repr::Custom(ref c) => Some(&*c.error),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Other(ref s) => f.debug_tuple("Other").field(s).finish(),
            Repr::Custom(ref c) => fmt::Debug::fmt(c, f),
            Repr::Simple(kind) => f.debug_tuple("Kind").field(&kind).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Other(ref s) => f.write_str(s),
            Repr::Custom(ref c) => fmt::Display::fmt(&c.error, f),
            Repr::Simple(kind) => f.write_str(kind.as_str()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.repr {
            Repr::Custom(ref c) => c.error.source(),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error {
            repr: Repr::Other(s),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error {
            repr: Repr::Other(s.to_owned()),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            repr: Repr::Simple(kind),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new(ErrorKind::IO, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::new(ErrorKind::Serialization, err)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Error {
        Error::new(ErrorKind::Protocol, err)
    }
}
