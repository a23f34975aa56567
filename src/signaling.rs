//! Channel negotiation.
//!
//! A create request only gets its answer once two independent engine signals
//! have both fired: the local description was applied, and candidate
//! gathering reached its end-of-candidates sentinel. Every event of a channel
//! goes through one queue drained by a single task per channel, which is the
//! only writer of that channel's [`OfferBarrier`].

use crate::error::{ChannelError, TransportError};
use crate::peer::connection::{NegotiationEvent, TransportEngine, TransportEvents, TransportFactory};
use crate::peer::ice::{analyze_candidates, dump_candidate};
use crate::peer::state::ChannelStatus;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::session::{Session, SessionRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Offer and the candidates gathered before the end-of-candidates sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedOffer {
    pub offer: SessionDescription,
    pub candidates: Vec<IceCandidate>,
}

/// AND-join over "local description applied" and "gathering complete".
///
/// Either signal may arrive first and either may repeat; the join releases
/// exactly once.
#[derive(Debug, Default)]
pub struct OfferBarrier {
    offer: Option<SessionDescription>,
    gathering_done: bool,
    candidates: Vec<IceCandidate>,
    released: bool,
}

impl OfferBarrier {
    /// Records a candidate; returns `false` when it came after the sentinel
    pub fn candidate_discovered(&mut self, candidate: IceCandidate) -> bool {
        if self.gathering_done {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn gathering_complete(&mut self) -> Option<NegotiatedOffer> {
        self.gathering_done = true;
        self.try_release()
    }

    pub fn local_description_applied(
        &mut self,
        offer: SessionDescription,
    ) -> Option<NegotiatedOffer> {
        if self.offer.is_none() {
            self.offer = Some(offer);
        }
        self.try_release()
    }

    fn try_release(&mut self) -> Option<NegotiatedOffer> {
        if self.released || !self.gathering_done {
            return None;
        }
        let offer = self.offer.clone()?;
        self.released = true;
        Some(NegotiatedOffer {
            offer,
            candidates: std::mem::take(&mut self.candidates),
        })
    }
}

/// Drains a channel's event queue until the channel is closed
async fn drive_negotiation(
    session: Arc<Session>,
    mut events: mpsc::UnboundedReceiver<NegotiationEvent>,
    reply: oneshot::Sender<NegotiatedOffer>,
) {
    let channel_id = session.id().to_string();
    let mut barrier = OfferBarrier::default();
    let mut reply = Some(reply);

    while let Some(event) = events.recv().await {
        let released = match event {
            NegotiationEvent::Candidate(candidate) => {
                dump_candidate(&channel_id, "local", &candidate);
                if !barrier.candidate_discovered(candidate) {
                    debug!(channel_id = %channel_id, "candidate arrived after gathering completed, not delivered");
                }
                None
            }
            NegotiationEvent::GatheringComplete => {
                debug!(channel_id = %channel_id, "ICE gathering complete");
                barrier.gathering_complete()
            }
            NegotiationEvent::LocalDescriptionApplied(offer) => {
                debug!(channel_id = %channel_id, "local description applied");
                barrier.local_description_applied(offer)
            }
            NegotiationEvent::ChannelOpen => {
                if session.mark_established() {
                    info!(channel_id = %channel_id, "data channel established");
                } else {
                    warn!(
                        channel_id = %channel_id,
                        status = %session.status(),
                        "data channel opened outside of ANSWERED, status unchanged"
                    );
                }
                None
            }
            NegotiationEvent::Closed => break,
        };

        if let Some(negotiated) = released {
            analyze_candidates(&channel_id, &negotiated.candidates);
            session.finalize_offer(negotiated.offer.clone(), negotiated.candidates.clone());
            if let Some(tx) = reply.take() {
                if tx.send(negotiated).is_err() {
                    debug!(channel_id = %channel_id, "create request gone before the offer was ready");
                }
            }
        }
    }

    debug!(channel_id = %channel_id, "negotiation task finished");
}

/// Response to a successful create request
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOffer {
    pub channel_id: String,
    pub offer: SessionDescription,
    pub ice_candidates: Vec<IceCandidate>,
}

/// Point-in-time view of a registered channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSnapshot {
    pub channel_id: String,
    pub status: ChannelStatus,
    pub created_at: DateTime<Utc>,
}

/// Create / answer / close entry points, shared by every request handler
#[derive(Clone)]
pub struct ChannelService {
    registry: SessionRegistry,
    factory: Arc<dyn TransportFactory>,
    negotiation_timeout: Duration,
}

impl ChannelService {
    pub fn new(factory: Arc<dyn TransportFactory>, negotiation_timeout: Duration) -> Self {
        Self::with_registry(SessionRegistry::new(), factory, negotiation_timeout)
    }

    pub fn with_registry(
        registry: SessionRegistry,
        factory: Arc<dyn TransportFactory>,
        negotiation_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            factory,
            negotiation_timeout,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Opens a transport, registers the channel and waits for its offer.
    ///
    /// On failure or timeout the channel stays registered in
    /// `WAITING_FOR_ANSWER`; the caller closes it explicitly.
    pub async fn create_channel(&self) -> Result<ChannelOffer, ChannelError> {
        let (events, queue) = TransportEvents::channel();
        let transport = self.factory.open(events.clone()).await?;
        let session = self.registry.register(Arc::clone(&transport), events.clone());
        let channel_id = session.id().to_string();
        info!(channel_id = %channel_id, "channel created");

        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::spawn(drive_negotiation(Arc::clone(&session), queue, reply_tx));

        let negotiated = match timeout(
            self.negotiation_timeout,
            negotiate(&channel_id, transport.as_ref(), &events, reply_rx),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    channel_id = %channel_id,
                    timeout = ?self.negotiation_timeout,
                    "negotiation timed out"
                );
                return Err(ChannelError::Timeout(self.negotiation_timeout));
            }
        };

        info!(
            channel_id = %channel_id,
            candidates = negotiated.candidates.len(),
            "offer ready"
        );
        Ok(ChannelOffer {
            channel_id,
            offer: negotiated.offer,
            ice_candidates: negotiated.candidates,
        })
    }

    /// Applies the remote peer's answer.
    ///
    /// Remote candidates are only logged, they are not handed to the engine.
    pub async fn submit_answer(
        &self,
        channel_id: &str,
        answer: SessionDescription,
        remote_candidates: &[IceCandidate],
    ) -> Result<(), ChannelError> {
        let session = self.registry.get(channel_id).ok_or(ChannelError::NotFound)?;
        session.mark_answered().inspect_err(|err| {
            warn!(channel_id = %channel_id, error = %err, "rejecting answer");
        })?;
        info!(channel_id = %channel_id, "answer accepted, setting remote description");

        for candidate in remote_candidates {
            dump_candidate(channel_id, "remote (ignored)", candidate);
        }

        // closed between the lookup and now
        let transport = session.transport().ok_or(ChannelError::NotFound)?;
        transport.set_remote_description(answer).await.inspect_err(|err| {
            warn!(channel_id = %channel_id, error = %err, "failed to set remote description");
        })?;
        Ok(())
    }

    /// Removes the channel and releases its transport
    pub async fn close_channel(&self, channel_id: &str) -> Result<(), ChannelError> {
        let session = self.registry.remove(channel_id).ok_or(ChannelError::NotFound)?;
        release(&session).await;
        Ok(())
    }

    pub fn channel_status(&self, channel_id: &str) -> Result<ChannelSnapshot, ChannelError> {
        let session = self.registry.get(channel_id).ok_or(ChannelError::NotFound)?;
        Ok(ChannelSnapshot {
            channel_id: session.id().to_string(),
            status: session.status(),
            created_at: session.created_at(),
        })
    }

    /// Closes every registered channel
    pub async fn shutdown(&self) {
        let sessions = self.registry.drain();
        info!(channels = sessions.len(), "closing all channels");
        for session in sessions {
            release(&session).await;
        }
    }
}

async fn negotiate(
    channel_id: &str,
    transport: &dyn TransportEngine,
    events: &TransportEvents,
    reply: oneshot::Receiver<NegotiatedOffer>,
) -> Result<NegotiatedOffer, ChannelError> {
    debug!(channel_id = %channel_id, "creating offer");
    let offer = transport.create_offer().await.inspect_err(|err| {
        warn!(channel_id = %channel_id, error = %err, "failed to create offer");
    })?;

    debug!(channel_id = %channel_id, "setting local description");
    transport
        .set_local_description(offer.clone())
        .await
        .inspect_err(|err| {
            warn!(channel_id = %channel_id, error = %err, "failed to set local description");
        })?;
    events.local_description_applied(offer);

    reply.await.map_err(|_| {
        ChannelError::Transport(TransportError::Rejected(
            "channel closed during negotiation".into(),
        ))
    })
}

async fn release(session: &Session) {
    info!(channel_id = %session.id(), status = %session.status(), "closing channel");
    session.events().closed();
    if let Some(transport) = session.take_transport() {
        if let Err(err) = transport.close().await {
            warn!(channel_id = %session.id(), error = %err, "transport close failed");
        }
    }
}
