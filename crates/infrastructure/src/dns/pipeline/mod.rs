//! Query pipelining over one persistent stream connection (RFC 7766 §6.2.1.1)
//!
//! Many queries share one connection: each is written as soon as it is
//! submitted and responses are matched back by message ID in whatever order
//! the upstream sends them. The connection is opened lazily by the first
//! query after a failure, and every query waiting on a connection that
//! breaks fails with `ConnectionLost`. Nothing is retried here; that is left
//! to the caller.

mod connection;
mod inflight;
mod metrics;

pub use metrics::PipelineStats;

use crate::dns::codec::{encode_frame, encode_message};
use crate::dns::transport::Connector;
use connection::Connection;
use dotline_domain::DomainError;
use hickory_proto::op::Message;
use inflight::RegisterError;
use metrics::PipelineMetrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long a connection may sit with nothing in flight before it is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts to register on a live connection when the one found is closing.
const REGISTER_ATTEMPTS: usize = 2;

type ConnectOutcome = Option<Result<Arc<Connection>, DomainError>>;

enum ConnState {
    Disconnected,
    Connecting(watch::Receiver<ConnectOutcome>),
    Open(Arc<Connection>),
}

/// Pipelined query client for one upstream.
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    upstream: Arc<str>,
    connector: Arc<dyn Connector>,
    idle_timeout: Duration,
    state: Mutex<ConnState>,
    generation: AtomicU64,
    metrics: Arc<PipelineMetrics>,
}

/// Withdraws a query's in-flight entry when its caller stops waiting.
struct InFlightGuard<'a> {
    conn: &'a Connection,
    id: u16,
    token: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.conn.release(self.id, self.token);
    }
}

impl Pipeline {
    pub fn new(upstream: impl Into<Arc<str>>, connector: Arc<dyn Connector>) -> Self {
        Self::with_idle_timeout(upstream, connector, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(
        upstream: impl Into<Arc<str>>,
        connector: Arc<dyn Connector>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                upstream: upstream.into(),
                connector,
                idle_timeout,
                state: Mutex::new(ConnState::Disconnected),
                generation: AtomicU64::new(0),
                metrics: Arc::new(PipelineMetrics::default()),
            }),
        }
    }

    /// Send `query` and wait up to `timeout` for its response.
    ///
    /// The response carries the same ID as `query`, even if a different
    /// one was used on the wire.
    pub async fn resolve(&self, query: Message, timeout: Duration) -> Result<Message, DomainError> {
        let inner = &self.inner;
        let deadline = Instant::now() + timeout;

        match tokio::time::timeout_at(deadline, inner.exchange(query, deadline)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                if e.is_timeout() {
                    PipelineMetrics::incr(&inner.metrics.timeouts);
                } else {
                    PipelineMetrics::incr(&inner.metrics.errors);
                }
                Err(e)
            }
            Err(_) => {
                PipelineMetrics::incr(&inner.metrics.timeouts);
                Err(DomainError::QueryTimeout {
                    server: inner.upstream.to_string(),
                })
            }
        }
    }

    pub fn upstream(&self) -> &str {
        &self.inner.upstream
    }

    pub fn protocol_name(&self) -> &'static str {
        self.inner.connector.protocol_name()
    }

    /// Number of connections opened so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> PipelineStats {
        let in_flight = match &*self.inner.lock_state() {
            ConnState::Open(conn) => conn.in_flight(),
            _ => 0,
        };
        self.inner.metrics.snapshot(self.generation(), in_flight)
    }
}

impl PipelineInner {
    fn lock_state(&self) -> MutexGuard<'_, ConnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn exchange(
        self: &Arc<Self>,
        mut query: Message,
        deadline: Instant,
    ) -> Result<Message, DomainError> {
        let original_id = query.id();
        let (conn, registration) = self.register(original_id, deadline).await?;
        let _guard = InFlightGuard {
            conn: &conn,
            id: registration.id,
            token: registration.token,
        };

        query.set_id(registration.id);
        let frame = encode_message(&query).and_then(|bytes| encode_frame(&bytes))?;
        conn.send(frame)?;

        let mut response = registration
            .receiver
            .await
            .map_err(|_| conn.lost("query abandoned by connection"))??;

        response.set_id(original_id);
        Ok(response)
    }

    async fn register(
        self: &Arc<Self>,
        preferred_id: u16,
        deadline: Instant,
    ) -> Result<(Arc<Connection>, inflight::Registration), DomainError> {
        for _ in 0..REGISTER_ATTEMPTS {
            let conn = self.connection().await?;
            match conn.register(preferred_id, deadline) {
                Ok(registration) => return Ok((conn, registration)),
                Err(RegisterError::Closed) => continue,
                Err(RegisterError::IdsExhausted) => {
                    return Err(DomainError::IdSpaceExhausted {
                        server: self.upstream.to_string(),
                    })
                }
            }
        }

        Err(DomainError::ConnectionLost {
            server: self.upstream.to_string(),
            reason: "connection closed before the query was sent".to_string(),
        })
    }

    /// Current open connection, establishing one if there is none.
    /// Concurrent callers share a single connection attempt.
    async fn connection(self: &Arc<Self>) -> Result<Arc<Connection>, DomainError> {
        let mut attempt = {
            let mut state = self.lock_state();
            match &*state {
                ConnState::Open(conn) if !conn.is_closed() => return Ok(Arc::clone(conn)),
                ConnState::Connecting(rx) => rx.clone(),
                _ => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let (tx, rx) = watch::channel(None);
                    *state = ConnState::Connecting(rx.clone());
                    tokio::spawn(Arc::clone(self).establish(generation, tx));
                    rx
                }
            }
        };

        let outcome = attempt.wait_for(Option::is_some).await.map_err(|_| {
            DomainError::TransportConnect {
                server: self.upstream.to_string(),
                reason: "connection attempt abandoned".to_string(),
            }
        })?;

        match &*outcome {
            Some(result) => result.clone(),
            None => Err(DomainError::TransportConnect {
                server: self.upstream.to_string(),
                reason: "connection attempt abandoned".to_string(),
            }),
        }
    }

    async fn establish(self: Arc<Self>, generation: u64, outcome: watch::Sender<ConnectOutcome>) {
        let result = match self.connector.connect().await {
            Ok(stream) => {
                PipelineMetrics::incr(&self.metrics.connects);
                debug!(
                    upstream = %self.upstream,
                    target = %self.connector.target(),
                    protocol = self.connector.protocol_name(),
                    generation,
                    "Connected to upstream"
                );
                Ok(Connection::open(
                    stream,
                    generation,
                    Arc::clone(&self.upstream),
                    Arc::clone(&self.metrics),
                    self.idle_timeout,
                ))
            }
            Err(e) => {
                PipelineMetrics::incr(&self.metrics.connect_failures);
                warn!(
                    upstream = %self.upstream,
                    target = %self.connector.target(),
                    error = %e,
                    "Failed to connect to upstream"
                );
                Err(e)
            }
        };

        *self.lock_state() = match &result {
            Ok(conn) => ConnState::Open(Arc::clone(conn)),
            Err(_) => ConnState::Disconnected,
        };
        outcome.send_replace(Some(result));
    }
}

impl Drop for PipelineInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let ConnState::Open(conn) = state {
            debug!(
                upstream = %self.upstream,
                generation = conn.generation(),
                "Closing connection of dropped pipeline"
            );
            conn.close("pipeline dropped");
        }
    }
}
