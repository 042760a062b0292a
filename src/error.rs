//! Define a general purpose ScopeDomeError struct.

use regex::Error as RegexError;
use std::{
    error::Error,
    fmt::{self, Debug},
    result,
};
use tokio::time::error::Elapsed;

pub type ScopeDomeResult<T> = result::Result<T, ScopeDomeError>;

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDomeError {
    err_msg: String,
}

impl Error for ScopeDomeError {}

impl fmt::Display for ScopeDomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = &self.err_msg;
        write!(f, "ScopeDomeError::{err_msg}")
    }
}

impl ScopeDomeError {
    pub fn new(err_msg: &str) -> ScopeDomeError {
        ScopeDomeError {
            err_msg: String::from(err_msg),
        }
    }

    pub fn from_error(error: impl Error) -> ScopeDomeError {
        ScopeDomeError {
            err_msg: error.to_string(),
        }
    }

    pub fn get_error_message(&self) -> &str {
        &self.err_msg
    }
}

impl From<Box<dyn Error>> for ScopeDomeError {
    fn from(item: Box<dyn Error>) -> ScopeDomeError {
        ScopeDomeError::new(&item.to_string())
    }
}

impl From<RegexError> for ScopeDomeError {
    fn from(item: RegexError) -> ScopeDomeError {
        ScopeDomeError::from_error(item)
    }
}

impl From<std::io::Error> for ScopeDomeError {
    fn from(item: std::io::Error) -> ScopeDomeError {
        ScopeDomeError::from_error(item)
    }
}

impl From<Elapsed> for ScopeDomeError {
    fn from(_: Elapsed) -> ScopeDomeError {
        ScopeDomeError::new("Timed out waiting for reply from dome card.")
    }
}

impl From<tokio_serial::Error> for ScopeDomeError {
    fn from(item: tokio_serial::Error) -> ScopeDomeError {
        ScopeDomeError::from_error(item)
    }
}
