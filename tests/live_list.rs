use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::net::TcpListener;
use ulid::Ulid;

use cottagebook::auth::{SessionManager, SharedSecret};
use cottagebook::calendar::{BookingCalendar, BookingDetails};
use cottagebook::client::{Client, ClientError};
use cottagebook::engine::Engine;
use cottagebook::error::ErrorKind;
use cottagebook::model::{NewBooking, Snapshot};
use cottagebook::notify::Subscription;
use cottagebook::wire;

const PASSWORD: &str = "lighthouse";

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<Engine>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("cottagebook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let engine = Arc::new(Engine::new(dir.join("bookings.wal")).unwrap());
    let sessions = Arc::new(SessionManager::new(
        Arc::new(SharedSecret::new(PASSWORD.to_string())),
        chrono::Duration::hours(1),
    ));

    let engine2 = engine.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine2.clone();
            let sessions = sessions.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine, sessions).await;
            });
        }
    });

    (addr, engine)
}

async fn connect(addr: SocketAddr) -> Client {
    let client = Client::connect(addr).await.unwrap();
    client.login(PASSWORD).await.unwrap();
    client
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stay(title: &str, member: &str, start: NaiveDate, end: NaiveDate) -> NewBooking {
    NewBooking {
        title: title.into(),
        start,
        end,
        member: member.into(),
        notes: None,
    }
}

/// Wait for a pushed snapshot with timeout.
async fn recv_snapshot(sub: &mut Subscription, timeout: Duration) -> Option<Snapshot> {
    tokio::time::timeout(timeout, sub.next()).await.ok().flatten()
}

/// Read one raw JSON line with timeout.
async fn read_json(
    lines: &mut tokio_util::codec::Framed<tokio::net::TcpStream, tokio_util::codec::LinesCodec>,
) -> serde_json::Value {
    use futures::StreamExt;
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next())
        .await
        .expect("reply within timeout")
        .unwrap()
        .unwrap();
    serde_json::from_str(&line).unwrap()
}

fn server_kind(err: &ClientError) -> Option<ErrorKind> {
    match err {
        ClientError::Server { kind, .. } => Some(*kind),
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn ping_without_login() {
    let (addr, _engine) = start_test_server().await;
    let client = Client::connect(addr).await.unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn wrong_password_rejected() {
    let (addr, _engine) = start_test_server().await;
    let client = Client::connect(addr).await.unwrap();
    let err = client.login("harbour").await.unwrap_err();
    assert_eq!(server_kind(&err), Some(ErrorKind::Auth));
}

#[tokio::test]
async fn booking_ops_require_session() {
    let (addr, engine) = start_test_server().await;
    let client = Client::connect(addr).await.unwrap();

    let err = client.list_bookings().await.unwrap_err();
    assert_eq!(server_kind(&err), Some(ErrorKind::Auth));

    let err = client
        .add_booking(stay("Sneaky", "Mallory", day(2024, 7, 1), day(2024, 7, 2)))
        .await
        .unwrap_err();
    assert_eq!(server_kind(&err), Some(ErrorKind::Auth));
    assert_eq!(engine.booking_count().await, 0);
}

#[tokio::test]
async fn add_list_and_overlap_rejection() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let alice = client
        .add_booking(stay("Summer week", "Alice", day(2024, 7, 1), day(2024, 7, 5)))
        .await
        .unwrap();
    assert_eq!(alice.start.to_rfc3339(), "2024-07-01T00:00:00+00:00");

    let err = client
        .add_booking(stay("Long weekend", "Bob", day(2024, 7, 5), day(2024, 7, 6)))
        .await
        .unwrap_err();
    match err {
        ClientError::Server { kind, conflict, .. } => {
            assert_eq!(kind, ErrorKind::Validation);
            assert_eq!(conflict, Some(alice.id));
        }
        other => panic!("expected server error, got {other:?}"),
    }

    client
        .add_booking(stay("Long weekend", "Bob", day(2024, 7, 6), day(2024, 7, 8)))
        .await
        .unwrap();

    let list = client.list_bookings().await.unwrap();
    let members: Vec<_> = list.iter().map(|b| b.member.as_str()).collect();
    assert_eq!(members, ["Alice", "Bob"]);
}

#[tokio::test]
async fn check_reports_conflict_and_honors_exclude() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    let b = client
        .add_booking(stay("Retreat", "Cleo", day(2024, 8, 10), day(2024, 8, 12)))
        .await
        .unwrap();

    assert_eq!(client.check(day(2024, 8, 12), day(2024, 8, 14), None).await.unwrap(), Some(b.id));
    assert_eq!(client.check(day(2024, 8, 13), day(2024, 8, 14), None).await.unwrap(), None);
    assert_eq!(client.check(day(2024, 8, 11), day(2024, 8, 11), Some(b.id)).await.unwrap(), None);
}

#[tokio::test]
async fn subscriber_receives_snapshot_from_other_connection() {
    let (addr, _engine) = start_test_server().await;

    // Connection 1: subscriber
    let watcher = connect(addr).await;
    let mut sub = watcher.subscribe().await.unwrap();
    let initial = recv_snapshot(&mut sub, Duration::from_secs(5))
        .await
        .expect("expected initial snapshot");
    assert!(initial.is_empty());

    // Connection 2: mutator
    let writer = connect(addr).await;
    let added = writer
        .add_booking(stay("Ski trip", "Dev", day(2025, 1, 10), day(2025, 1, 14)))
        .await
        .unwrap();

    let snap = recv_snapshot(&mut sub, Duration::from_secs(5))
        .await
        .expect("expected snapshot after add");
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].id, added.id);

    assert!(writer.remove_booking(added.id).await.unwrap());
    let snap = recv_snapshot(&mut sub, Duration::from_secs(5))
        .await
        .expect("expected snapshot after remove");
    assert!(snap.is_empty());
}

#[tokio::test]
async fn rejected_add_pushes_nothing() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    client
        .add_booking(stay("Anchor", "Eli", day(2024, 9, 1), day(2024, 9, 3)))
        .await
        .unwrap();

    let mut sub = client.subscribe().await.unwrap();
    assert_eq!(recv_snapshot(&mut sub, Duration::from_secs(5)).await.unwrap().len(), 1);

    let _ = client
        .add_booking(stay("Clash", "Fay", day(2024, 9, 2), day(2024, 9, 2)))
        .await
        .unwrap_err();
    assert!(recv_snapshot(&mut sub, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn unsubscribe_stops_pushes() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    let mut sub = client.subscribe().await.unwrap();
    recv_snapshot(&mut sub, Duration::from_secs(5)).await.unwrap();

    client.unsubscribe().await.unwrap();
    client
        .add_booking(stay("Quiet", "Gus", day(2024, 10, 1), day(2024, 10, 1)))
        .await
        .unwrap();
    assert!(recv_snapshot(&mut sub, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn remove_unknown_id_is_not_an_error() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    assert!(!client.remove_booking(Ulid::new()).await.unwrap());
}

#[tokio::test]
async fn resume_on_new_connection_and_logout() {
    let (addr, _engine) = start_test_server().await;
    let first = Client::connect(addr).await.unwrap();
    let session = first.login(PASSWORD).await.unwrap();

    let second = Client::connect(addr).await.unwrap();
    assert_eq!(second.resume(session.token).await.unwrap(), session);
    second.list_bookings().await.unwrap();

    second.logout().await.unwrap();
    let err = second.list_bookings().await.unwrap_err();
    assert_eq!(server_kind(&err), Some(ErrorKind::Auth));

    // The token is gone server-wide, not just on the connection that logged out.
    let err = first.list_bookings().await.unwrap_err();
    assert_eq!(server_kind(&err), Some(ErrorKind::Auth));
}

#[tokio::test]
async fn malformed_line_keeps_connection_open() {
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{Framed, LinesCodec};

    let (addr, _engine) = start_test_server().await;
    let socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let mut lines = Framed::new(socket, LinesCodec::new());

    lines.send("{not json").await.unwrap();
    let reply: serde_json::Value = serde_json::from_str(&lines.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["kind"], "protocol");
    assert!(reply.get("seq").is_none());

    lines.send(r#"{"op":"ping","seq":9}"#).await.unwrap();
    let reply: serde_json::Value = serde_json::from_str(&lines.next().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["type"], "pong");
    assert_eq!(reply["seq"], 9);
}

#[tokio::test]
async fn logout_while_subscribed_pushes_session_ended() {
    use futures::SinkExt;
    use tokio_util::codec::{Framed, LinesCodec};

    let (addr, _engine) = start_test_server().await;
    let socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let mut lines = Framed::new(socket, LinesCodec::new());

    lines.send(format!(r#"{{"op":"login","password":"{PASSWORD}","seq":1}}"#)).await.unwrap();
    let reply = read_json(&mut lines).await;
    assert_eq!((reply["type"].as_str(), reply["seq"].as_u64()), (Some("session"), Some(1)));

    lines.send(r#"{"op":"subscribe","seq":2}"#.to_string()).await.unwrap();
    let reply = read_json(&mut lines).await;
    assert_eq!((reply["type"].as_str(), reply["seq"].as_u64()), (Some("ok"), Some(2)));
    let pushed = read_json(&mut lines).await;
    assert_eq!(pushed["type"], "snapshot");
    assert!(pushed.get("seq").is_none());

    lines.send(r#"{"op":"logout","seq":3}"#.to_string()).await.unwrap();
    let reply = read_json(&mut lines).await;
    assert_eq!((reply["type"].as_str(), reply["seq"].as_u64()), (Some("ok"), Some(3)));
    let pushed = read_json(&mut lines).await;
    assert_eq!(pushed["type"], "session_ended");
    assert!(pushed.get("seq").is_none());

    lines.send(r#"{"op":"ping","seq":4}"#.to_string()).await.unwrap();
    let reply = read_json(&mut lines).await;
    assert_eq!((reply["type"].as_str(), reply["seq"].as_u64()), (Some("pong"), Some(4)));
}

#[tokio::test]
async fn subscription_ends_with_session_and_client_recovers() {
    let (addr, _engine) = start_test_server().await;

    let watcher = Client::connect(addr).await.unwrap();
    let session = watcher.login(PASSWORD).await.unwrap();
    let mut sub = watcher.subscribe().await.unwrap();
    assert!(recv_snapshot(&mut sub, Duration::from_secs(5)).await.unwrap().is_empty());

    // Someone else ends the watcher's session from another connection.
    let other = Client::connect(addr).await.unwrap();
    other.resume(session.token).await.unwrap();
    other.logout().await.unwrap();

    // The next change finds the session gone; the live list ends instead of
    // leaving an error reply queued for the next request.
    let writer = connect(addr).await;
    writer
        .add_booking(stay("Harvest", "Jo", day(2024, 9, 20), day(2024, 9, 22)))
        .await
        .unwrap();
    let ended = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("subscription should end, not stall");
    assert!(ended.is_none());

    watcher.login(PASSWORD).await.unwrap();
    watcher.ping().await.unwrap();
    let list = watcher.list_bookings().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].member, "Jo");

    let mut sub = watcher.subscribe().await.unwrap();
    assert_eq!(recv_snapshot(&mut sub, Duration::from_secs(5)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn abandoned_request_does_not_shift_replies() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    let b = client
        .add_booking(stay("Autumn", "Kit", day(2024, 10, 4), day(2024, 10, 6)))
        .await
        .unwrap();

    // Give up on requests before their replies arrive.
    let _ = tokio::time::timeout(Duration::ZERO, client.check(day(2024, 10, 5), day(2024, 10, 5), None)).await;
    let _ = tokio::time::timeout(Duration::ZERO, client.ping()).await;

    let list = client.list_bookings().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, b.id);
    assert_eq!(client.check(day(2024, 10, 6), day(2024, 10, 8), None).await.unwrap(), Some(b.id));
    client.ping().await.unwrap();
}

#[tokio::test]
async fn calendar_over_the_network() {
    let (addr, engine) = start_test_server().await;
    let client = Arc::new(connect(addr).await);
    let mut calendar = BookingCalendar::new(client.clone());
    let mut sub = calendar.subscribe().await.unwrap();
    assert!(calendar.is_loading());
    assert!(calendar.refresh(&mut sub).await);
    assert!(!calendar.is_loading());

    calendar.pick_day(day(2024, 12, 27));
    calendar.pick_day(day(2024, 12, 23));
    let booking = calendar
        .submit(BookingDetails {
            title: "Christmas".into(),
            member: "Hana".into(),
            notes: Some("bring the sled".into()),
        })
        .await
        .unwrap();
    assert_eq!(booking.days().start, day(2024, 12, 23));
    assert!(calendar.refresh(&mut sub).await);
    assert_eq!(calendar.events().len(), 1);
    assert_eq!(engine.booking_count().await, 1);

    // Another member grabs the next week through a separate connection.
    let other = connect(addr).await;
    other
        .add_booking(stay("New year", "Ivo", day(2024, 12, 30), day(2025, 1, 2)))
        .await
        .unwrap();
    assert!(calendar.refresh(&mut sub).await);
    assert_eq!(calendar.events().len(), 2);

    calendar.pick_day(day(2025, 1, 1));
    calendar.pick_day(day(2025, 1, 3));
    let err = calendar
        .submit(BookingDetails {
            title: "Late".into(),
            member: "Hana".into(),
            notes: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(calendar.form_open());
}
