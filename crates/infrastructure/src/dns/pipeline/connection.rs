use super::inflight::{Delivery, InFlightTable, RegisterError, Registration};
use super::metrics::PipelineMetrics;
use crate::dns::codec::{decode_message, message_id, read_frame};
use crate::dns::transport::BoxedStream;
use dotline_domain::DomainError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Upper bound on the orderly shutdown of a closing stream.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// One live stream to the upstream plus the queries waiting on it.
///
/// A reader task matches responses to waiting queries by ID. A writer task
/// owns the write half, so a frame is always written whole even when the
/// query that queued it gives up halfway.
pub(crate) struct Connection {
    generation: u64,
    upstream: Arc<str>,
    inflight: InFlightTable,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: CancellationToken,
    metrics: Arc<PipelineMetrics>,
}

impl Connection {
    pub fn open(
        stream: BoxedStream,
        generation: u64,
        upstream: Arc<str>,
        metrics: Arc<PipelineMetrics>,
        idle_timeout: Duration,
    ) -> Arc<Self> {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let conn = Arc::new(Self {
            generation,
            inflight: InFlightTable::new(Arc::clone(&upstream)),
            upstream,
            outbound,
            shutdown: CancellationToken::new(),
            metrics,
        });

        tokio::spawn(Arc::clone(&conn).read_loop(reader));
        tokio::spawn(Arc::clone(&conn).write_loop(writer, outbound_rx, idle_timeout));
        conn
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.inflight.is_closed()
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn register(
        &self,
        preferred_id: u16,
        deadline: Instant,
    ) -> Result<Registration, RegisterError> {
        self.inflight.register(preferred_id, deadline)
    }

    pub fn release(&self, id: u16, token: u64) {
        self.inflight.release(id, token);
    }

    /// Queue a complete frame for the writer task.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), DomainError> {
        self.outbound
            .send(frame)
            .map_err(|_| self.lost("connection is closing"))
    }

    /// Tear the connection down, failing every waiting query.
    /// Returns how many queries were failed.
    pub fn close(&self, reason: &str) -> usize {
        let failed = self.inflight.close(&self.lost(reason));
        self.shutdown.cancel();
        failed
    }

    pub fn lost(&self, reason: &str) -> DomainError {
        DomainError::ConnectionLost {
            server: self.upstream.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn read_loop(self: Arc<Self>, mut reader: ReadHalf<BoxedStream>) {
        loop {
            let frame = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                frame = read_frame(&mut reader) => frame,
            };

            match frame {
                Ok(bytes) => self.dispatch(&bytes),
                Err(e) => {
                    let reason = e.to_string();
                    let failed = self.close(&reason);
                    if failed > 0 {
                        warn!(
                            upstream = %self.upstream,
                            generation = self.generation,
                            failed,
                            error = %reason,
                            "Connection lost with queries in flight"
                        );
                    } else {
                        debug!(
                            upstream = %self.upstream,
                            generation = self.generation,
                            error = %reason,
                            "Connection closed"
                        );
                    }
                    return;
                }
            }
        }
    }

    fn dispatch(&self, bytes: &[u8]) {
        let Some(id) = message_id(bytes) else {
            return;
        };

        let delivered = match decode_message(bytes) {
            Ok(response) => match self.inflight.complete(id, response) {
                Delivery::Delivered { rtt } => {
                    trace!(
                        upstream = %self.upstream,
                        id,
                        rtt_us = rtt.as_micros() as u64,
                        "Response matched"
                    );
                    PipelineMetrics::incr(&self.metrics.responses_received);
                    true
                }
                Delivery::Late | Delivery::Unknown => false,
            },
            Err(e) => {
                debug!(upstream = %self.upstream, id, error = %e, "Undecodable response");
                self.inflight.fail(id, e)
            }
        };

        if !delivered {
            PipelineMetrics::incr(&self.metrics.stale_responses);
            debug!(upstream = %self.upstream, id, "Discarding response with no waiting query");
        }
    }

    async fn write_loop(
        self: Arc<Self>,
        mut writer: WriteHalf<BoxedStream>,
        mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
        idle_timeout: Duration,
    ) {
        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = tokio::time::timeout(idle_timeout, outbound.recv()) => next,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_) if self.inflight.is_empty() => {
                    debug!(
                        upstream = %self.upstream,
                        generation = self.generation,
                        "Closing idle connection"
                    );
                    self.close("idle timeout");
                    break;
                }
                Err(_) => continue,
            };

            let written = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                written = self.write_batch(&mut writer, frame, &mut outbound) => written,
            };

            if let Err(e) = written {
                let failed = self.close(&format!("write failed: {}", e));
                warn!(
                    upstream = %self.upstream,
                    generation = self.generation,
                    failed,
                    error = %e,
                    "Write to upstream failed"
                );
                break;
            }
        }

        let _ = tokio::time::timeout(SHUTDOWN_GRACE, writer.shutdown()).await;
    }

    /// Write `first` and whatever else is already queued, then flush once.
    async fn write_batch(
        &self,
        writer: &mut WriteHalf<BoxedStream>,
        first: Vec<u8>,
        outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> std::io::Result<()> {
        writer.write_all(&first).await?;
        PipelineMetrics::incr(&self.metrics.queries_sent);

        while let Ok(frame) = outbound.try_recv() {
            writer.write_all(&frame).await?;
            PipelineMetrics::incr(&self.metrics.queries_sent);
        }

        writer.flush().await
    }
}
