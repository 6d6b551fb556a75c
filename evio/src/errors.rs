// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for EvIO operations.
pub type EvIOResult<T = ()> = core::result::Result<T, EvIOError>;

/// Error type for EvIO operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvIOError {
    Other(&'static str),
    OutOfBounds,
    Unsupported,
    /// Underlying OS error, with the context it happened in.
    Io {
        kind: std::io::ErrorKind,
        detail: String,
    },
}

impl EvIOError {
    pub fn msg(&self) -> &str {
        match self {
            EvIOError::Other(msg) => msg,
            EvIOError::OutOfBounds => "Out of bounds",
            EvIOError::Unsupported => "Unsupported operation",
            EvIOError::Io { detail, .. } => detail,
        }
    }

    /// Attaches a path to an OS error so the caller can report which artifact failed.
    pub fn at_path(self, path: &std::path::Path) -> Self {
        match self {
            EvIOError::Io { kind, detail } => EvIOError::Io {
                kind,
                detail: format!("{}: {detail}", path.display()),
            },
            other => other,
        }
    }
}

impl From<&'static str> for EvIOError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        EvIOError::Other(msg)
    }
}

impl From<std::io::Error> for EvIOError {
    #[cold]
    #[inline(never)]
    fn from(e: std::io::Error) -> Self {
        EvIOError::Io {
            kind: e.kind(),
            detail: e.to_string(),
        }
    }
}

impl fmt::Display for EvIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        Ok(())
    }
}

impl std::error::Error for EvIOError {}
