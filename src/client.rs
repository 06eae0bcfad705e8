use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::auth::Session;
use crate::engine::EngineError;
use crate::error::ErrorKind;
use crate::limits::MAX_LINE_LEN;
use crate::model::{Booking, NewBooking, Snapshot};
use crate::notify::Subscription;
use crate::protocol::{encode, parse_reply, Frame, ProtocolError, Reply, Request};
use crate::store::BookingStore;

#[derive(Debug)]
pub enum ClientError {
    Io(std::io::Error),
    Codec(String),
    /// The server closed the connection.
    Disconnected,
    /// The server answered with an error reply.
    Server {
        kind: ErrorKind,
        message: String,
        conflict: Option<Ulid>,
    },
    Unexpected(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {e}"),
            ClientError::Codec(e) => write!(f, "codec error: {e}"),
            ClientError::Disconnected => write!(f, "server closed the connection"),
            ClientError::Server { kind, message, .. } => write!(f, "{kind} error: {message}"),
            ClientError::Unexpected(r) => write!(f, "unexpected reply: {r}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e)
    }
}

impl From<LinesCodecError> for ClientError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::Io(e) => ClientError::Io(e),
            other => ClientError::Codec(other.to_string()),
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(e) => ClientError::Io(e),
            other => ClientError::Codec(other.to_string()),
        }
    }
}

impl From<ClientError> for EngineError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Server {
                kind: ErrorKind::Validation,
                conflict: Some(id),
                ..
            } => EngineError::Conflict(id),
            ClientError::Server {
                kind: ErrorKind::Validation,
                message,
                ..
            } => EngineError::Invalid(message),
            ClientError::Server {
                kind: ErrorKind::Auth,
                message,
                ..
            } => EngineError::Unauthorized(message),
            other => EngineError::Unavailable(other.to_string()),
        }
    }
}

struct Channel {
    sink: SplitSink<Framed<TcpStream, LinesCodec>, String>,
    replies: mpsc::Receiver<Frame<Reply>>,
    next_seq: u64,
}

/// Sender side of the live list the server is currently pushing to us.
type Feed = Arc<Mutex<Option<watch::Sender<Option<Snapshot>>>>>;

/// Network handle on a booking server.
///
/// Requests are serialized over one connection and matched to replies by
/// sequence number, so a request dropped mid-flight leaves nothing behind for
/// the next one. Pushed lines are routed to the live subscription by a
/// background reader.
pub struct Client {
    channel: Mutex<Channel>,
    feed: Feed,
    reader: JoinHandle<()>,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let socket = TcpStream::connect(addr).await?;
        let framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
        let (sink, mut stream) = framed.split();
        let (reply_tx, replies) = mpsc::channel(16);
        let feed: Feed = Arc::new(Mutex::new(None));

        let reader_feed = feed.clone();
        let reader = tokio::spawn(async move {
            while let Some(line) = stream.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("client read failed: {e}");
                        break;
                    }
                };
                let Frame { seq, body } = match parse_reply(&line) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("unparseable reply: {e}");
                        continue;
                    }
                };
                match (seq, body) {
                    (None, Reply::Snapshot { bookings }) => {
                        if let Some(tx) = reader_feed.lock().await.as_ref() {
                            tx.send_replace(Some(Arc::new(bookings)));
                        }
                    }
                    (None, Reply::SessionEnded { message }) => {
                        debug!("live list ended: {message}");
                        reader_feed.lock().await.take();
                    }
                    (seq, body) => {
                        if reply_tx.send(Frame::new(seq, body)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            reader_feed.lock().await.take();
        });

        Ok(Self {
            channel: Mutex::new(Channel {
                sink,
                replies,
                next_seq: 0,
            }),
            feed,
            reader,
        })
    }

    /// Send one request and wait for its reply. Error replies become `Err`.
    ///
    /// Safe to cancel: replies to abandoned requests are skipped by sequence
    /// number.
    pub async fn request(&self, req: &Request) -> Result<Reply, ClientError> {
        let mut channel = self.channel.lock().await;
        channel.next_seq += 1;
        let seq = channel.next_seq;
        channel.sink.send(encode(&Frame::new(Some(seq), req))?).await?;
        loop {
            let frame = channel.replies.recv().await.ok_or(ClientError::Disconnected)?;
            // Lines the server could not attribute to a request carry no seq.
            if frame.seq.is_some_and(|s| s != seq) {
                debug!("skipping stale reply {:?}", frame.seq);
                continue;
            }
            return match frame.body {
                Reply::Error {
                    kind,
                    message,
                    conflict,
                } => Err(ClientError::Server {
                    kind,
                    message,
                    conflict,
                }),
                reply => Ok(reply),
            };
        }
    }

    pub async fn login(&self, password: &str) -> Result<Session, ClientError> {
        let req = Request::Login {
            password: password.to_string(),
        };
        match self.request(&req).await? {
            Reply::Session { token, expires_at } => Ok(Session { token, expires_at }),
            other => Err(unexpected(other)),
        }
    }

    /// Re-attach this connection to an existing session.
    pub async fn resume(&self, token: Ulid) -> Result<Session, ClientError> {
        match self.request(&Request::Resume { token }).await? {
            Reply::Session { token, expires_at } => Ok(Session { token, expires_at }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        expect_ok(self.request(&Request::Logout).await?)
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.request(&Request::Ping).await? {
            Reply::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_bookings(&self) -> Result<Vec<Booking>, ClientError> {
        match self.request(&Request::List).await? {
            Reply::Bookings { bookings } => Ok(bookings),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the server to push snapshots. The returned subscription yields the
    /// first snapshot sent after this call, then every later one, and ends when
    /// the server reports the session gone or the connection drops.
    ///
    /// A second call replaces the first; the earlier subscription ends.
    pub async fn subscribe(&self) -> Result<Subscription, ClientError> {
        let (tx, rx) = watch::channel(None);
        self.feed.lock().await.replace(tx);
        if let Err(e) = self.request(&Request::Subscribe).await.and_then(expect_ok) {
            self.feed.lock().await.take();
            return Err(e);
        }
        Ok(Subscription::new(rx))
    }

    pub async fn unsubscribe(&self) -> Result<(), ClientError> {
        self.feed.lock().await.take();
        expect_ok(self.request(&Request::Unsubscribe).await?)
    }

    pub async fn add_booking(&self, booking: NewBooking) -> Result<Booking, ClientError> {
        match self.request(&Request::Add { booking }).await? {
            Reply::Added { booking } => Ok(booking),
            other => Err(unexpected(other)),
        }
    }

    pub async fn remove_booking(&self, id: Ulid) -> Result<bool, ClientError> {
        match self.request(&Request::Remove { id }).await? {
            Reply::Removed { removed } => Ok(removed),
            other => Err(unexpected(other)),
        }
    }

    /// Server-side overlap check. Returns the first colliding booking id.
    pub async fn check(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<Ulid>,
    ) -> Result<Option<Ulid>, ClientError> {
        let req = Request::Check {
            start,
            end,
            exclude_id,
        };
        match self.request(&req).await? {
            Reply::Overlap { conflict, .. } => Ok(conflict),
            other => Err(unexpected(other)),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn expect_ok(reply: Reply) -> Result<(), ClientError> {
    match reply {
        Reply::Ok => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(reply: Reply) -> ClientError {
    ClientError::Unexpected(format!("{reply:?}"))
}

#[async_trait]
impl BookingStore for Client {
    async fn list(&self) -> Result<Subscription, EngineError> {
        Ok(self.subscribe().await?)
    }

    async fn snapshot(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.list_bookings().await?)
    }

    async fn add(&self, booking: NewBooking) -> Result<Booking, EngineError> {
        Ok(self.add_booking(booking).await?)
    }

    async fn remove(&self, id: Ulid) -> Result<bool, EngineError> {
        Ok(self.remove_booking(id).await?)
    }
}
