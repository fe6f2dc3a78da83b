#![allow(dead_code)]
//! Loopback DNS-over-stream upstream for tests.
//!
//! What it does with a query depends on the first label of the name:
//! `delay-<ms>` answers after that many milliseconds, `silent` never
//! answers, `drop` closes the connection, `twice` answers two times and
//! `garbage` answers with an unparseable message. Anything else is
//! answered right away with an A record.

use dotline_infrastructure::dns::codec::{encode_frame, encode_message, has_padding, read_frame};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

pub const ANSWER_IP: [u8; 4] = [192, 0, 2, 1];

#[derive(Debug, Clone)]
pub struct ReceivedQuery {
    pub id: u16,
    pub name: String,
    pub wire_len: usize,
    pub padded: bool,
    pub peer: SocketAddr,
}

#[derive(Default)]
pub struct MockState {
    pub connections: AtomicUsize,
    pub closed_connections: AtomicUsize,
    received: Mutex<Vec<ReceivedQuery>>,
}

enum Behavior {
    Answer,
    Delay(u64),
    Silent,
    Drop,
    Twice,
    Garbage,
}

impl Behavior {
    fn for_name(name: &str) -> Self {
        let label = name.split('.').next().unwrap_or_default();
        match label {
            "silent" => Self::Silent,
            "drop" => Self::Drop,
            "twice" => Self::Twice,
            "garbage" => Self::Garbage,
            _ => match label.strip_prefix("delay-").and_then(|ms| ms.parse().ok()) {
                Some(ms) => Self::Delay(ms),
                None => Self::Answer,
            },
        }
    }
}

pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        Self::spawn(None).await
    }

    pub async fn start_tls(acceptor: TlsAcceptor) -> Self {
        Self::spawn(Some(acceptor)).await
    }

    async fn spawn(acceptor: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((stream, peer)) = accepted else { continue };
                        server_state.connections.fetch_add(1, Ordering::SeqCst);

                        let state = Arc::clone(&server_state);
                        let acceptor = acceptor.clone();
                        tokio::spawn(async move {
                            match acceptor {
                                Some(acceptor) => {
                                    if let Ok(tls) = acceptor.accept(stream).await {
                                        serve(tls, peer, Arc::clone(&state)).await;
                                    }
                                }
                                None => serve(stream, peer, Arc::clone(&state)).await,
                            }
                            state.closed_connections.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                }
            }
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn closed_connections(&self) -> usize {
        self.state.closed_connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<ReceivedQuery> {
        self.state.received.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

type SharedWriter<S> = Arc<tokio::sync::Mutex<WriteHalf<S>>>;

async fn serve<S>(stream: S, peer: SocketAddr, state: Arc<MockState>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let writer: SharedWriter<S> = Arc::new(tokio::sync::Mutex::new(writer));

    loop {
        let Ok(bytes) = read_frame(&mut reader).await else {
            return;
        };
        let Ok(query) = Message::from_vec(&bytes) else {
            return;
        };

        let name = query
            .queries()
            .first()
            .map(|q| q.name().to_ascii())
            .unwrap_or_default();
        state.received.lock().unwrap().push(ReceivedQuery {
            id: query.id(),
            name: name.clone(),
            wire_len: bytes.len(),
            padded: has_padding(&query),
            peer,
        });

        match Behavior::for_name(&name) {
            Behavior::Answer => send(&writer, &answer_bytes(&query)).await,
            Behavior::Delay(ms) => {
                let writer = Arc::clone(&writer);
                let response = answer_bytes(&query);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    send(&writer, &response).await;
                });
            }
            Behavior::Silent => {}
            Behavior::Drop => {
                let _ = writer.lock().await.shutdown().await;
                return;
            }
            Behavior::Twice => {
                let response = answer_bytes(&query);
                send(&writer, &response).await;
                send(&writer, &response).await;
            }
            Behavior::Garbage => {
                let [hi, lo] = query.id().to_be_bytes();
                send(&writer, &[hi, lo, 0x81, 0x80, 0, 5, 0, 0, 0, 0, 0, 0]).await;
            }
        }
    }
}

async fn send<S>(writer: &SharedWriter<S>, message: &[u8])
where
    S: AsyncWrite + Send + Unpin,
{
    let frame = encode_frame(message).unwrap();
    let mut writer = writer.lock().await;
    let _ = writer.write_all(&frame).await;
    let _ = writer.flush().await;
}

fn answer_bytes(query: &Message) -> Vec<u8> {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true);

    for q in query.queries() {
        response.add_query(q.clone());
        if q.query_type() == RecordType::A {
            let [a, b, c, d] = ANSWER_IP;
            response.add_answer(Record::from_rdata(
                q.name().clone(),
                60,
                RData::A(A::new(a, b, c, d)),
            ));
        }
    }

    encode_message(&response).unwrap()
}

/// A recursive A query for `name` with a fixed ID.
pub fn query(name: &str, id: u16) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_str(name).unwrap(), RecordType::A));
    message
}
