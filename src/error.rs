use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidConfig(String),
    InvalidSnapshot(String),
    ChannelClosed,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidSnapshot(msg) => write!(f, "invalid passcode snapshot: {msg}"),
            Error::ChannelClosed => write!(f, "clock channel closed"),
        }
    }
}

impl std::error::Error for Error {}
