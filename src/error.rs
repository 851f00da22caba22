use thiserror::Error;

use crate::scpi::error::ScpiError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transfer layer error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial protocol error: {0}")]
    Serial(#[from] serial::Error),
    #[error("scpi error: {0}")]
    Scpi(#[from] ScpiError),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            Error::Scpi(ScpiError::Communication(e)) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
