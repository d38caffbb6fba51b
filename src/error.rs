use std::convert::From;
use std::error::Error as StdError;
use std::fmt;
use std::io;

use email_format::rfc5322::ParseError;

#[derive(Debug)]
pub enum Error {
    /// The pasted text held no usable address
    NoRecipients,
    /// A campaign is already running
    AlreadyRunning,
    /// A stopped worker is still waiting for its last send to return
    WorkerBusy,
    InvalidConfig,
    LockPoisoned,
    WorkerPanicked,
    Storage(String),
    Io(io::Error),
    TomlDe(toml::de::Error),
    TomlSer(toml::ser::Error),
    Http(reqwest::Error),
    EmailParser(ParseError),
    Address(lettre::error::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::NoRecipients => write!(f, "No valid recipient addresses"),
            Error::AlreadyRunning => write!(f, "A campaign is already running"),
            Error::WorkerBusy => write!(f, "The previous worker has not finished yet"),
            Error::InvalidConfig => write!(f, "Invalid configuration"),
            Error::LockPoisoned => write!(f, "Lock poisoned"),
            Error::WorkerPanicked => write!(f, "Worker thread panicked"),
            Error::Storage(ref s) => write!(f, "Storage error: {}", s),
            Error::Io(ref e) => write!(f, "I/O error: {}", e),
            Error::TomlDe(ref e) => write!(f, "Invalid TOML: {}", e),
            Error::TomlSer(ref e) => write!(f, "Unable to write TOML: {}", e),
            Error::Http(ref e) => write!(f, "HTTP client error: {}", e),
            Error::EmailParser(ref e) => write!(f, "Email parse error: {:?}", e),
            Error::Address(ref e) => write!(f, "Invalid address: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            Error::TomlDe(ref e) => Some(e),
            Error::TomlSer(ref e) => Some(e),
            Error::Http(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::TomlDe(e)
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Error {
        Error::TomlSer(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::Http(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Error {
        Error::EmailParser(e)
    }
}

impl From<lettre::error::Error> for Error {
    fn from(e: lettre::error::Error) -> Error {
        Error::Address(e)
    }
}
