// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the serialization engine.
//!
//! Every failure is surfaced synchronously to the caller of the triggering
//! read or write; nothing is swallowed or retried inside the codec. After a
//! [`Error::StreamCorrupted`] or [`Error::ArrayMismatch`] the stream must be
//! reset or reopened before reuse.

use std::fmt;

/// Errors raised by the serialization engine.
#[derive(Debug)]
pub enum Error {
    /// A wire value had a shape the protocol state does not allow (e.g. a
    /// back-reference to a handle that was never assigned). Fatal for the
    /// stream.
    StreamCorrupted { reason: String },
    /// A type name arrived that is not registered in the directory on this
    /// side. Recoverable; carries the offending name.
    UnknownType(String),
    /// The operation is not available in the stream's mode (e.g. object
    /// traffic on a data-mode stream). Fatal for the call only.
    Unsupported {
        mode: &'static str,
        operation: &'static str,
    },
    /// Failure of the underlying byte channel, propagated unchanged.
    Io(std::io::Error),
    /// An array header disagreed with the caller's declared kind or length.
    /// Fatal, since buffer bounds would otherwise be violated.
    ArrayMismatch { reason: String },
    /// Invalid stream construction, e.g. an unknown mode name.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StreamCorrupted { reason } => write!(f, "stream corrupted: {}", reason),
            Error::UnknownType(name) => write!(f, "unknown type: {}", name),
            Error::Unsupported { mode, operation } => {
                write!(f, "operation {} not supported in {} mode", operation, mode)
            }
            Error::Io(err) => write!(f, "channel i/o failure: {}", err),
            Error::ArrayMismatch { reason } => write!(f, "array mismatch: {}", reason),
            Error::Config(reason) => write!(f, "configuration error: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl Error {
    /// Shorthand for a corruption error with a formatted reason.
    pub(crate) fn corrupt(reason: impl Into<String>) -> Error {
        Error::StreamCorrupted {
            reason: reason.into(),
        }
    }

    /// Shorthand for an array header mismatch.
    pub(crate) fn mismatch(reason: impl Into<String>) -> Error {
        Error::ArrayMismatch {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
