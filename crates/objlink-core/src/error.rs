//! Shared error type across objlink crates.

use thiserror::Error;

/// Stable error categories exposed to embedders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed or unexpected inbound message.
    BadMessage,
    /// Message names an object the registry does not hold.
    UnknownObject,
    /// Unknown method, property, or signal on a proxy.
    UnknownMember,
    /// A previously-unknown object arrived without its descriptor.
    MissingData,
    /// Outbound request already carried a correlation id.
    DuplicateId,
    /// Response arrived for a request id with no pending entry.
    UnmatchedResponse,
    /// Transport-level failure.
    Transport,
}

impl ErrorCode {
    /// String representation used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadMessage => "BAD_MESSAGE",
            ErrorCode::UnknownObject => "UNKNOWN_OBJECT",
            ErrorCode::UnknownMember => "UNKNOWN_MEMBER",
            ErrorCode::MissingData => "MISSING_DATA",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
            ErrorCode::UnmatchedResponse => "UNMATCHED_RESPONSE",
            ErrorCode::Transport => "TRANSPORT",
        }
    }
}

/// Which kind of proxy member a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Property,
    Signal,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberKind::Method => write!(f, "method"),
            MemberKind::Property => write!(f, "property"),
            MemberKind::Signal => write!(f, "signal"),
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ObjLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum ObjLinkError {
    #[error("bad message: {0}")]
    BadMessage(String),
    #[error("unknown object: {0}")]
    UnknownObject(String),
    #[error("unknown {kind} {object}::{name}")]
    UnknownMember {
        kind: MemberKind,
        object: String,
        name: String,
    },
    #[error("cannot materialize object {0} without descriptor data")]
    MissingData(String),
    #[error("outbound request already carries an id")]
    DuplicateId,
    #[error("response for unknown request id {0}")]
    UnmatchedResponse(u64),
    #[error("transport: {0}")]
    Transport(String),
}

impl ObjLinkError {
    /// Map the error to a stable category.
    pub fn code(&self) -> ErrorCode {
        match self {
            ObjLinkError::BadMessage(_) => ErrorCode::BadMessage,
            ObjLinkError::UnknownObject(_) => ErrorCode::UnknownObject,
            ObjLinkError::UnknownMember { .. } => ErrorCode::UnknownMember,
            ObjLinkError::MissingData(_) => ErrorCode::MissingData,
            ObjLinkError::DuplicateId => ErrorCode::DuplicateId,
            ObjLinkError::UnmatchedResponse(_) => ErrorCode::UnmatchedResponse,
            ObjLinkError::Transport(_) => ErrorCode::Transport,
        }
    }
}
