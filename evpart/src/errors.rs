// SPDX-License-Identifier: MIT

use core::fmt;

use evio::errors::*;

/// Unified error type for boot sector parsing, classification and fabrication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartError {
    IO(EvIOError),
    /// Bytes 510..512 are not `55 AA`.
    NotASectorSignature {
        found: [u8; 2],
    },
    /// Neither a partition table nor a volume boot record could be told apart.
    ClassificationAmbiguous(&'static str),
    Invalid(&'static str),
    Other(&'static str),
}

impl PartError {
    pub fn msg(&self) -> &str {
        match self {
            PartError::IO(e) => e.msg(),
            PartError::NotASectorSignature { .. } => "Missing boot sector signature",
            PartError::ClassificationAmbiguous(msg) => msg,
            PartError::Invalid(msg) => msg,
            PartError::Other(msg) => msg,
        }
    }
}

impl From<&'static str> for PartError {
    fn from(s: &'static str) -> Self {
        PartError::Other(s)
    }
}

impl From<EvIOError> for PartError {
    fn from(e: EvIOError) -> Self {
        PartError::IO(e)
    }
}

impl fmt::Display for PartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartError::NotASectorSignature { found } => write!(
                f,
                "{} (expected 55 AA at offset 510, found {:02X} {:02X})",
                self.msg(),
                found[0],
                found[1]
            ),
            PartError::ClassificationAmbiguous(reason) => {
                write!(f, "Cannot tell full disk from partition image: {reason}")
            }
            _ => write!(f, "{}", self.msg()),
        }
    }
}

impl PartError {
    /// Names the file an IO error happened on.
    pub fn at_path(self, path: &std::path::Path) -> Self {
        match self {
            PartError::IO(e) => PartError::IO(e.at_path(path)),
            other => other,
        }
    }
}

impl std::error::Error for PartError {}

pub type PartResult<T = ()> = Result<T, PartError>;
