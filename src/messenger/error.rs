//! Messenger and transport error types.

use core::fmt;

use thiserror::Error;

/// Failure reported by a [`Transport`](super::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The engine side of the transport has shut down.
    Closed,
    /// No more reply handles can be allocated right now.
    HandlesExhausted {
        /// Number of handles currently outstanding.
        outstanding: usize,
    },
    /// The engine refused the message.
    Rejected {
        /// Channel the message was addressed to.
        channel: String,
        /// Reason given by the engine.
        reason: String,
    },
    /// Payload length exceeds what the transport can carry.
    PayloadTooLarge {
        /// Length of the payload provided by the caller.
        len: usize,
        /// Maximum payload length supported by the transport.
        max: usize,
    },
    /// A response token was not recognised (already answered or forged).
    UnknownToken {
        /// Raw token id.
        id: u64,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "transport closed"),
            Self::HandlesExhausted { outstanding } => {
                write!(f, "reply handles exhausted ({outstanding} outstanding)")
            }
            Self::Rejected { channel, reason } => {
                write!(f, "message on '{channel}' rejected: {reason}")
            }
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {len} bytes (max {max})")
            }
            Self::UnknownToken { id } => write!(f, "unknown response token {id}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors delivered to outbound send completions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessengerError {
    /// The transport failed to accept or deliver the message.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The message exceeds the messenger's configured limit.
    #[error("message on '{channel}' is {len} bytes (max {max})")]
    MessageTooLarge {
        /// Channel the message was addressed to.
        channel: String,
        /// Message length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The transport discarded the pending reply without delivering it.
    #[error("reply on '{channel}' was dropped by the transport")]
    ReplyDropped {
        /// Channel the original message was sent on.
        channel: String,
    },
}

/// Result type for messenger operations.
pub type Result<T> = std::result::Result<T, MessengerError>;
