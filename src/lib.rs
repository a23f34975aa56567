//! Initiator-side WebRTC signaling over HTTP.
//!
//! `POST /channels` creates a peer connection, waits for its offer and its
//! gathered ICE candidates and returns both. The remote peer posts its answer
//! to `/channels/:id/answer`, and `/channels/:id/close` tears the channel down.

pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use error::{ChannelError, TransportError};
pub use peer::{
    ChannelStatus, IceCandidate, RtcTransportFactory, SessionDescription, TransportEngine,
    TransportEvents, TransportFactory,
};
pub use session::{Session, SessionRegistry};
pub use signaling::{ChannelOffer, ChannelService, OfferBarrier};
