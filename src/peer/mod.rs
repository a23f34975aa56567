pub mod connection;
pub mod data_channel;
pub mod ice;
pub mod state;
pub mod types;

pub use connection::{RtcTransportFactory, TransportEngine, TransportEvents, TransportFactory};
pub use state::ChannelStatus;
pub use types::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
