use crate::peer::state::ChannelStatus;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a transport engine
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer connection error: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("transport rejected the operation: {0}")]
    Rejected(String),
}

/// Everything a channel operation can fail with
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel not found")]
    NotFound,

    #[error("channel is not waiting for answer (status {status})")]
    InvalidState { status: ChannelStatus },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("negotiation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("malformed request body: {0}")]
    MalformedRequest(String),
}
