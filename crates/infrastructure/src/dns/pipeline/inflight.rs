use dashmap::DashMap;
use dotline_domain::DomainError;
use hickory_proto::op::Message;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Random IDs tried after the preferred one is taken.
const MAX_ID_ATTEMPTS: usize = 64;

pub(crate) type Outcome = Result<Message, DomainError>;

struct InFlightRequest {
    token: u64,
    submitted_at: Instant,
    deadline: Instant,
    responder: oneshot::Sender<Outcome>,
}

pub(crate) struct Registration {
    pub id: u16,
    pub token: u64,
    pub receiver: oneshot::Receiver<Outcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegisterError {
    Closed,
    IdsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered { rtt: Duration },
    /// Matched a query whose deadline had already passed.
    Late,
    /// No query is waiting on this ID.
    Unknown,
}

/// Queries sent on one connection and still waiting for their response,
/// keyed by wire ID.
///
/// Every entry is completed at most once: whoever removes it from the map
/// owns its responder. Once closed, the table refuses new entries, and an
/// entry inserted concurrently with `close` is either drained by it or
/// withdrawn by `register`.
pub(crate) struct InFlightTable {
    upstream: Arc<str>,
    requests: DashMap<u16, InFlightRequest, FxBuildHasher>,
    closed: AtomicBool,
    next_token: AtomicU64,
}

impl InFlightTable {
    pub fn new(upstream: Arc<str>) -> Self {
        Self {
            upstream,
            requests: DashMap::with_hasher(FxBuildHasher),
            closed: AtomicBool::new(false),
            next_token: AtomicU64::new(0),
        }
    }

    /// Reserve a wire ID, preferring `preferred_id` when it is free.
    pub fn register(
        &self,
        preferred_id: u16,
        deadline: Instant,
    ) -> Result<Registration, RegisterError> {
        if self.is_closed() {
            return Err(RegisterError::Closed);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (responder, receiver) = oneshot::channel();
        let submitted_at = Instant::now();

        let mut id = preferred_id;
        for _ in 0..=MAX_ID_ATTEMPTS {
            if let dashmap::Entry::Vacant(slot) = self.requests.entry(id) {
                slot.insert(InFlightRequest {
                    token,
                    submitted_at,
                    deadline,
                    responder,
                });

                if self.is_closed() {
                    self.release(id, token);
                    return Err(RegisterError::Closed);
                }
                return Ok(Registration {
                    id,
                    token,
                    receiver,
                });
            }
            id = fastrand::u16(..);
        }

        Err(RegisterError::IdsExhausted)
    }

    /// Drop an entry without completing it, if it is still ours.
    pub fn release(&self, id: u16, token: u64) {
        self.requests.remove_if(&id, |_, request| request.token == token);
    }

    /// Hand a response to the query waiting on `id`.
    pub fn complete(&self, id: u16, response: Message) -> Delivery {
        let Some((_, request)) = self.requests.remove(&id) else {
            return Delivery::Unknown;
        };

        if Instant::now() > request.deadline {
            let _ = request.responder.send(Err(DomainError::QueryTimeout {
                server: self.upstream.to_string(),
            }));
            return Delivery::Late;
        }

        let rtt = request.submitted_at.elapsed();
        let _ = request.responder.send(Ok(response));
        Delivery::Delivered { rtt }
    }

    /// Fail the single query waiting on `id`. Returns whether one was waiting.
    pub fn fail(&self, id: u16, error: DomainError) -> bool {
        match self.requests.remove(&id) {
            Some((_, request)) => {
                let _ = request.responder.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Refuse new entries and fail every waiting query with `error`.
    /// Returns how many were failed.
    pub fn close(&self, error: &DomainError) -> usize {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<u16> = self.requests.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if self.fail(id, error.clone()) {
                failed += 1;
            }
        }
        failed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
