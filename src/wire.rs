use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::auth::{AuthError, SessionManager};
use crate::engine::{Engine, EngineError};
use crate::error::ErrorKind;
use crate::limits::MAX_LINE_LEN;
use crate::model::{DayRange, Snapshot};
use crate::notify::Subscription;
use crate::observability::{self, op_label};
use crate::protocol::{encode, parse_request, Frame, ProtocolError, Reply, Request};

type Lines = Framed<TcpStream, LinesCodec>;

/// Per-connection state: the member session bound to this socket and an
/// optional live subscription.
struct Connection {
    engine: Arc<Engine>,
    sessions: Arc<SessionManager>,
    session: Option<Ulid>,
    subscription: Option<Subscription>,
    /// Set when a subscription was closed because its session went away.
    ended: Option<String>,
}

/// Serve one client until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    sessions: Arc<SessionManager>,
) -> Result<(), ProtocolError> {
    let mut lines: Lines = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let mut conn = Connection {
        engine,
        sessions,
        session: None,
        subscription: None,
        ended: None,
    };

    loop {
        tokio::select! {
            incoming = lines.next() => {
                let line = match incoming {
                    None => break,
                    Some(Ok(line)) => line,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("dropping oversized request line");
                        let reply = Reply::error(ErrorKind::Protocol, ProtocolError::LineTooLong.to_string());
                        send(&mut lines, &Frame::push(reply)).await?;
                        continue;
                    }
                    Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = conn.handle_line(&line).await;
                send(&mut lines, &reply).await?;
                conn.flush_ended(&mut lines).await?;
            }
            pushed = next_snapshot(&mut conn.subscription) => {
                match pushed {
                    Some(snapshot) => conn.push(&mut lines, snapshot).await?,
                    None => conn.subscription = None,
                }
            }
        }
    }

    if let Some(token) = conn.session {
        debug!("connection for session {token} closed");
    }
    Ok(())
}

async fn send(lines: &mut Lines, frame: &Frame<Reply>) -> Result<(), ProtocolError> {
    lines.send(encode(frame)?).await?;
    Ok(())
}

/// Waits forever while there is no subscription so the select arm stays idle.
async fn next_snapshot(subscription: &mut Option<Subscription>) -> Option<Snapshot> {
    match subscription {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

impl Connection {
    /// Answer one request line. The reply echoes the request's `seq`; a line
    /// that does not parse gets a reply without one.
    async fn handle_line(&mut self, line: &str) -> Frame<Reply> {
        let Frame { seq, body: req } = match parse_request(line) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("unparseable request: {e}");
                metrics::counter!(observability::REQUESTS_TOTAL, "op" => "invalid", "status" => "error")
                    .increment(1);
                return Frame::push(Reply::error(ErrorKind::Protocol, e.to_string()));
            }
        };

        let op = op_label(&req);
        let started = Instant::now();
        let reply = self.handle(req).await;
        let status = if reply.is_error() { "error" } else { "ok" };
        metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
        metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        Frame::new(seq, reply)
    }

    async fn handle(&mut self, req: Request) -> Reply {
        match req {
            Request::Ping => Reply::Pong,
            Request::Login { password } => match self.sessions.login(&password).await {
                Ok(session) => {
                    self.session = Some(session.token);
                    Reply::Session {
                        token: session.token,
                        expires_at: session.expires_at,
                    }
                }
                Err(e) => Reply::from(&e),
            },
            Request::Resume { token } => match self.sessions.resume(token) {
                Ok(session) => {
                    self.session = Some(session.token);
                    Reply::Session {
                        token: session.token,
                        expires_at: session.expires_at,
                    }
                }
                Err(e) => Reply::from(&e),
            },
            authed => match self.require_session() {
                Ok(token) => self.handle_authed(token, authed).await,
                Err(e) => Reply::from(&e),
            },
        }
    }

    async fn handle_authed(&mut self, token: Ulid, req: Request) -> Reply {
        match req {
            Request::Logout => {
                self.sessions.logout(token);
                self.drop_session("logged out".to_string());
                Reply::Ok
            }
            Request::List => Reply::Bookings {
                bookings: self.engine.list_bookings().await,
            },
            Request::Subscribe => {
                self.subscription = Some(self.engine.subscribe());
                Reply::Ok
            }
            Request::Unsubscribe => {
                if let Some(mut sub) = self.subscription.take() {
                    sub.close();
                }
                Reply::Ok
            }
            Request::Add { booking } => match self.engine.add_booking(booking).await {
                Ok(booking) => Reply::Added { booking },
                Err(e) => {
                    if let EngineError::Conflict(id) = &e {
                        info!("add rejected, overlaps {id}");
                        metrics::counter!(observability::OVERLAP_REJECTIONS_TOTAL).increment(1);
                    }
                    Reply::from(&e)
                }
            },
            Request::Remove { id } => match self.engine.remove_booking(id).await {
                Ok(removed) => Reply::Removed { removed },
                Err(e) => Reply::from(&e),
            },
            Request::Check {
                start,
                end,
                exclude_id,
            } => {
                let conflict = self
                    .engine
                    .check_overlap(DayRange::ordered(start, end), exclude_id)
                    .await;
                Reply::Overlap {
                    overlaps: conflict.is_some(),
                    conflict,
                }
            }
            Request::Ping | Request::Login { .. } | Request::Resume { .. } => {
                Reply::error(ErrorKind::Protocol, "unexpected request")
            }
        }
    }

    /// The session bound to this socket, if it is still live.
    fn require_session(&mut self) -> Result<Ulid, AuthError> {
        let token = self.session.ok_or(AuthError::SessionMissing)?;
        match self.sessions.resume(token) {
            Ok(session) => Ok(session.token),
            Err(e) => {
                self.drop_session(e.to_string());
                Err(e)
            }
        }
    }

    fn drop_session(&mut self, reason: String) {
        self.session = None;
        if let Some(mut sub) = self.subscription.take() {
            sub.close();
            self.ended = Some(reason);
        }
    }

    /// Tell a subscriber once that its live list ended with the session.
    async fn flush_ended(&mut self, lines: &mut Lines) -> Result<(), ProtocolError> {
        match self.ended.take() {
            Some(message) => send(lines, &Frame::push(Reply::SessionEnded { message })).await,
            None => Ok(()),
        }
    }

    /// Forward a snapshot, unless the session lapsed since subscribing.
    async fn push(&mut self, lines: &mut Lines, snapshot: Snapshot) -> Result<(), ProtocolError> {
        if let Err(e) = self.require_session() {
            debug!("subscription dropped: {e}");
            return self.flush_ended(lines).await;
        }
        let reply = Reply::Snapshot {
            bookings: snapshot.as_ref().clone(),
        };
        send(lines, &Frame::push(reply)).await
    }
}
