use crate::error::ChannelError;
use crate::peer::connection::{TransportEngine, TransportEvents};
use crate::peer::state::ChannelStatus;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::utils::random_id;
use chrono::{DateTime, Utc};
use dashmap::{
    mapref::entry::{Entry, VacantEntry},
    DashMap,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// One negotiated (or negotiating) channel
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    status: Mutex<ChannelStatus>,
    transport: Mutex<Option<Arc<dyn TransportEngine>>>,
    events: TransportEvents,
    local_description: OnceCell<SessionDescription>,
    local_candidates: OnceCell<Vec<IceCandidate>>,
}

impl Session {
    fn new(id: String, transport: Arc<dyn TransportEngine>, events: TransportEvents) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            status: Mutex::new(ChannelStatus::default()),
            transport: Mutex::new(Some(transport)),
            events,
            local_description: OnceCell::new(),
            local_candidates: OnceCell::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.lock()
    }

    pub fn events(&self) -> &TransportEvents {
        &self.events
    }

    /// Transport handle, `None` once the session was closed
    pub fn transport(&self) -> Option<Arc<dyn TransportEngine>> {
        self.transport.lock().clone()
    }

    pub(crate) fn take_transport(&self) -> Option<Arc<dyn TransportEngine>> {
        self.transport.lock().take()
    }

    /// Moves to `Answered`; fails without touching the status otherwise
    pub fn mark_answered(&self) -> Result<(), ChannelError> {
        let mut status = self.status.lock();
        *status = status.answer()?;
        Ok(())
    }

    /// Moves to `ChannelEstablished`, returning whether the status changed
    pub fn mark_established(&self) -> bool {
        let mut status = self.status.lock();
        match status.channel_open() {
            Some(next) => {
                *status = next;
                true
            }
            None => false,
        }
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.get()
    }

    pub fn local_candidates(&self) -> Option<&[IceCandidate]> {
        self.local_candidates.get().map(Vec::as_slice)
    }

    /// Freezes the negotiated offer; later calls are ignored
    pub(crate) fn finalize_offer(&self, offer: SessionDescription, candidates: Vec<IceCandidate>) {
        if self.local_description.set(offer).is_err() {
            warn!(channel_id = %self.id, "local description already set, keeping the first one");
            return;
        }
        let _ = self.local_candidates.set(candidates);
    }
}

type IdSource = dyn Fn() -> String + Send + Sync;

/// Process-wide channel table, shared by handle
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    sessions: DashMap<String, Arc<Session>>,
    next_id: Box<IdSource>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_id_source(random_id)
    }

    /// Registry drawing ids from `next_id` instead of the random generator
    pub fn with_id_source(next_id: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                sessions: DashMap::new(),
                next_id: Box::new(next_id),
            }),
        }
    }

    /// Draws ids until one is not registered. Does not reserve it.
    pub fn allocate_id(&self) -> String {
        self.with_free_id(|entry| entry.key().clone())
    }

    /// Allocates an id and inserts the session under it in one step
    pub fn register(
        &self,
        transport: Arc<dyn TransportEngine>,
        events: TransportEvents,
    ) -> Arc<Session> {
        self.with_free_id(|entry| {
            let session = Arc::new(Session::new(entry.key().clone(), transport, events));
            entry.insert(Arc::clone(&session));
            session
        })
    }

    /// Runs `claim` on the first drawn id with no registered session.
    /// The shard stays locked until `claim` returns.
    fn with_free_id<T>(
        &self,
        claim: impl FnOnce(VacantEntry<'_, String, Arc<Session>>) -> T,
    ) -> T {
        loop {
            let id = (self.inner.next_id)();
            match self.inner.sessions.entry(id) {
                Entry::Occupied(entry) => {
                    debug!(channel_id = %entry.key(), "channel id collision, drawing again");
                }
                Entry::Vacant(entry) => return claim(entry),
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.sessions.remove(id).map(|(_, session)| session)
    }

    /// Removes every session, for shutdown
    pub fn drain(&self) -> Vec<Arc<Session>> {
        let ids: Vec<String> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }
}
