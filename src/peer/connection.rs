use crate::error::TransportError;
use crate::peer::data_channel::attach_dc;
use crate::peer::ice::candidate_from_rtc;
use crate::peer::types::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::{
    api::{APIBuilder, API},
    data_channel::{data_channel_init::RTCDataChannelInit, RTCDataChannel},
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
};

/// Signals flowing into a channel's negotiation task
#[derive(Debug)]
pub(crate) enum NegotiationEvent {
    Candidate(IceCandidate),
    GatheringComplete,
    LocalDescriptionApplied(SessionDescription),
    ChannelOpen,
    Closed,
}

/// Callback handle a transport engine reports through.
///
/// Every clone feeds the same per-channel queue, so callbacks may fire from
/// any task or thread.
#[derive(Clone, Debug)]
pub struct TransportEvents {
    tx: mpsc::UnboundedSender<NegotiationEvent>,
}

impl TransportEvents {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<NegotiationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A local connectivity candidate was found
    pub fn candidate_discovered(&self, candidate: IceCandidate) {
        self.send(NegotiationEvent::Candidate(candidate));
    }

    /// End-of-discovery sentinel
    pub fn gathering_complete(&self) {
        self.send(NegotiationEvent::GatheringComplete);
    }

    /// The data channel opened
    pub fn channel_open(&self) {
        self.send(NegotiationEvent::ChannelOpen);
    }

    pub(crate) fn local_description_applied(&self, description: SessionDescription) {
        self.send(NegotiationEvent::LocalDescriptionApplied(description));
    }

    pub(crate) fn closed(&self) {
        self.send(NegotiationEvent::Closed);
    }

    fn send(&self, event: NegotiationEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!(event = ?err.0, "channel already closed, dropping transport event");
        }
    }
}

/// Peer connection backing one channel
#[async_trait]
pub trait TransportEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    /// Releases every resource held by the connection
    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates one transport engine per channel
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        events: TransportEvents,
    ) -> Result<Arc<dyn TransportEngine>, TransportError>;
}

// ========== WEBRTC-RS ENGINE ==========

/// Builds initiator-side peer connections with one data channel each
pub struct RtcTransportFactory {
    api: API,
    ice_servers: Vec<IceServerConfig>,
    data_channel_label: String,
}

impl RtcTransportFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>, data_channel_label: impl Into<String>) -> Self {
        Self {
            api: APIBuilder::new().build(),
            ice_servers,
            data_channel_label: data_channel_label.into(),
        }
    }

    fn rtc_config(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: vec![server.url.clone()],
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            bundle_policy: RTCBundlePolicy::MaxBundle,
            rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn open(
        &self,
        events: TransportEvents,
    ) -> Result<Arc<dyn TransportEngine>, TransportError> {
        let pc = Arc::new(self.api.new_peer_connection(self.rtc_config()).await?);

        // None marks the end of gathering
        let candidate_events = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            match cand {
                Some(c) => match candidate_from_rtc(&c) {
                    Ok(candidate) => candidate_events.candidate_discovered(candidate),
                    Err(err) => warn!(error = %err, "failed to serialize local ICE candidate"),
                },
                None => candidate_events.gathering_complete(),
            }
            Box::pin(async {})
        }));

        pc.on_peer_connection_state_change(Box::new(|st: RTCPeerConnectionState| {
            match st {
                RTCPeerConnectionState::Failed => warn!(state = %st, "peer connection failed"),
                _ => debug!(state = %st, "peer connection state changed"),
            }
            Box::pin(async {})
        }));

        // the data channel has to exist before the offer so that it gets an m-line
        let dc = open_data_channel(&pc, &self.data_channel_label).await?;
        attach_dc(&dc, events);

        Ok(Arc::new(RtcTransport {
            pc,
            _data_channel: dc,
        }))
    }
}

/// Creates the channel's data channel, closing `pc` if that fails
async fn open_data_channel(
    pc: &RTCPeerConnection,
    label: &str,
) -> Result<Arc<RTCDataChannel>, TransportError> {
    match pc
        .create_data_channel(label, Some(RTCDataChannelInit::default()))
        .await
    {
        Ok(dc) => Ok(dc),
        Err(err) => {
            if let Err(close_err) = pc.close().await {
                debug!(error = %close_err, "failed to close half-built peer connection");
            }
            Err(err.into())
        }
    }
}

struct RtcTransport {
    pc: Arc<RTCPeerConnection>,
    _data_channel: Arc<RTCDataChannel>,
}

#[async_trait]
impl TransportEngine for RtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self.pc.create_offer(None).await?;
        description_from_rtc(offer)
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc
            .set_local_description(description_to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc
            .set_remote_description(description_to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await?;
        Ok(())
    }
}

fn description_from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Rollback => SdpKind::Rollback,
        RTCSdpType::Unspecified => {
            return Err(TransportError::Rejected(
                "session description has no type".into(),
            ))
        }
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

fn description_to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let converted = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpKind::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpKind::Rollback => {
            return Err(TransportError::Rejected(
                "rollback descriptions are not supported".into(),
            ))
        }
    };
    Ok(converted)
}
