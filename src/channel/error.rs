//! Channel error types

use thiserror::Error;

use crate::codec::CodecError;
use crate::messenger::MessengerError;

/// Errors raised by method and event channels
#[derive(Error, Debug)]
pub enum ChannelError {
    /// A call, envelope or event could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The messenger or transport failed
    #[error("messenger error: {0}")]
    Messenger(#[from] MessengerError),

    /// The event sink outlived the listener it was created for
    #[error("no active listener on event channel '{channel}'")]
    ListenerGone {
        /// Event channel name
        channel: String,
    },
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;
