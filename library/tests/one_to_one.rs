use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rendezvous_peers::one_to_one::{Callbacks, NetworkManager};
use rendezvous_peers::{
    ConnectionEvent, ConnectionId, Error, EventSender, IceCandidate, NegotiationState,
    PeerConnection, RoomId, SdpType, SessionConfig, SessionDescription,
};
use rendezvous_protocol::{ErrorKind, SignalMessage};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time;
use tokio_stream::wrappers::UnboundedReceiverStream;

const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection object that opens its channel as soon as an answer is applied on either side
/// and records everything sent over it.
struct ScriptedConnection {
    events: EventSender,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PeerConnection for ScriptedConnection {
    async fn create_offer(&mut self) -> anyhow::Result<SessionDescription> {
        Ok(SessionDescription::offer("v=0 scripted-offer"))
    }

    async fn create_answer(&mut self) -> anyhow::Result<SessionDescription> {
        Ok(SessionDescription::answer("v=0 scripted-answer"))
    }

    async fn set_local_description(&mut self, description: SessionDescription) -> anyhow::Result<()> {
        self.events.send(ConnectionEvent::IceCandidate(IceCandidate::new(
            "candidate:1 1 UDP 2122252543 192.168.0.7 40000 typ host",
        )))?;
        if description.kind == SdpType::Answer {
            self.events.send(ConnectionEvent::ChannelOpen)?;
        }
        Ok(())
    }

    async fn set_remote_description(&mut self, description: SessionDescription) -> anyhow::Result<()> {
        if description.kind == SdpType::Answer {
            self.events.send(ConnectionEvent::ChannelOpen)?;
        }
        Ok(())
    }

    async fn add_ice_candidate(&mut self, _candidate: IceCandidate) -> anyhow::Result<()> {
        Ok(())
    }

    async fn create_data_channel(&mut self, _label: &str) -> anyhow::Result<()> {
        self.events.send(ConnectionEvent::NegotiationNeeded)?;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(String::from_utf8(data.to_vec())?);
        Ok(())
    }

    async fn close(&mut self) {}
}

struct Harness {
    manager: NetworkManager,
    server: UnboundedSender<SignalMessage>,
    from_session: UnboundedReceiver<SignalMessage>,
    ready: UnboundedReceiver<()>,
    messages: UnboundedReceiver<String>,
    failures: UnboundedReceiver<Error>,
    departures: UnboundedReceiver<ConnectionId>,
    connection_events: Arc<Mutex<Option<EventSender>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

fn start(room: &str) -> Harness {
    let (server, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_session) = mpsc::unbounded_channel();
    let (ready_tx, ready) = mpsc::unbounded_channel();
    let (messages_tx, messages) = mpsc::unbounded_channel();
    let (failures_tx, failures) = mpsc::unbounded_channel();
    let (departures_tx, departures) = mpsc::unbounded_channel();

    let manager = NetworkManager::with_config(
        "ws://127.0.0.1:9001/one-to-one",
        RoomId::from(room),
        SessionConfig {
            negotiation_timeout: NEGOTIATION_TIMEOUT,
            ..SessionConfig::default()
        },
    );

    let connection_events = Arc::new(Mutex::new(None));
    let sent = Arc::new(Mutex::new(Vec::new()));
    let factory = {
        let connection_events = Arc::clone(&connection_events);
        let sent = Arc::clone(&sent);
        move |_remote: &ConnectionId, events: EventSender| -> anyhow::Result<ScriptedConnection> {
            *connection_events.lock().unwrap() = Some(events.clone());
            Ok(ScriptedConnection {
                events,
                sent: Arc::clone(&sent),
            })
        }
    };
    let callbacks = Callbacks::new(
        move || ready_tx.send(()).unwrap(),
        move |message, _received_at| messages_tx.send(message).unwrap(),
    )
    .on_failure(move |err| failures_tx.send(err).unwrap())
    .on_peer_left(move |peer| departures_tx.send(peer).unwrap());

    manager
        .start_with_transport(
            UnboundedReceiverStream::new(incoming),
            outgoing,
            factory,
            callbacks,
        )
        .unwrap();

    Harness {
        manager,
        server,
        from_session,
        ready,
        messages,
        failures,
        departures,
        connection_events,
        sent,
    }
}

async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for session")
        .expect("session hung up")
}

fn a() -> ConnectionId {
    ConnectionId::from("a")
}

fn b() -> ConnectionId {
    ConnectionId::from("b")
}

async fn joined(harness: &mut Harness, room: &str) {
    assert_eq!(
        next(&mut harness.from_session).await,
        SignalMessage::Join {
            room: RoomId::from(room)
        }
    );
    harness.server.send(SignalMessage::Welcome { id: b() }).unwrap();
}

#[tokio::test]
async fn test_session_joins_its_room_first() {
    let mut harness = start("room42");

    joined(&mut harness, "room42").await;
    assert_eq!(harness.manager.room_id(), &RoomId::from("room42"));
    assert!(!harness.manager.is_ready());
}

#[tokio::test]
async fn test_waiting_peer_answers_offer_and_becomes_ready() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;

    harness.server.send(SignalMessage::PeerJoined { peer: a() }).unwrap();
    harness
        .server
        .send(SignalMessage::Offer {
            target: b(),
            caller: a(),
            sdp: SessionDescription::offer("v=0 S1"),
        })
        .unwrap();

    assert_eq!(
        next(&mut harness.from_session).await,
        SignalMessage::Answer {
            target: a(),
            caller: b(),
            sdp: SessionDescription::answer("v=0 scripted-answer"),
        }
    );
    assert!(matches!(
        next(&mut harness.from_session).await,
        SignalMessage::Candidate { target, .. } if target == a()
    ));

    next(&mut harness.ready).await;
    assert!(harness.manager.is_ready());

    harness.manager.send_message("hello").unwrap();
    harness
        .connection_events
        .lock()
        .unwrap()
        .as_ref()
        .unwrap()
        .send(ConnectionEvent::Message(b"hi there".to_vec()))
        .unwrap();
    assert_eq!(next(&mut harness.messages).await, "hi there");

    time::timeout(Duration::from_secs(60), async {
        while harness.sent.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("message was never sent over the channel");
    assert_eq!(*harness.sent.lock().unwrap(), vec!["hello".to_owned()]);
}

#[tokio::test]
async fn test_second_peer_opens_channel_and_offers() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;

    harness.server.send(SignalMessage::PeerPresent { peer: a() }).unwrap();

    assert_eq!(
        next(&mut harness.from_session).await,
        SignalMessage::Offer {
            target: a(),
            caller: b(),
            sdp: SessionDescription::offer("v=0 scripted-offer"),
        }
    );
    assert!(matches!(
        next(&mut harness.from_session).await,
        SignalMessage::Candidate { .. }
    ));

    harness
        .server
        .send(SignalMessage::Answer {
            target: b(),
            caller: a(),
            sdp: SessionDescription::answer("v=0 S2"),
        })
        .unwrap();
    next(&mut harness.ready).await;
    assert!(harness.manager.is_ready());
}

#[tokio::test]
async fn test_early_candidates_do_not_fail_the_session() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;

    harness.server.send(SignalMessage::PeerJoined { peer: a() }).unwrap();
    harness
        .server
        .send(SignalMessage::Candidate {
            target: b(),
            candidate: IceCandidate::new("candidate:9 1 UDP 1 10.1.1.1 9 typ host"),
        })
        .unwrap();
    harness
        .server
        .send(SignalMessage::Offer {
            target: b(),
            caller: a(),
            sdp: SessionDescription::offer("v=0 S1"),
        })
        .unwrap();

    assert!(matches!(
        next(&mut harness.from_session).await,
        SignalMessage::Answer { .. }
    ));
    next(&mut harness.ready).await;
    assert!(harness.failures.try_recv().is_err());
}

#[tokio::test]
async fn test_message_before_ready_is_refused() {
    let harness = start("room42");

    assert!(matches!(
        harness.manager.send_message("too early"),
        Err(Error::ChannelNotReady)
    ));
}

#[tokio::test]
async fn test_starting_twice_is_refused() {
    let harness = start("room42");
    let (_server, incoming) = mpsc::unbounded_channel();
    let (outgoing, _from_session) = mpsc::unbounded_channel();

    let result = harness.manager.start_with_transport(
        UnboundedReceiverStream::new(incoming),
        outgoing,
        |_remote: &ConnectionId, events: EventSender| -> anyhow::Result<ScriptedConnection> {
            Ok(ScriptedConnection {
                events,
                sent: Arc::default(),
            })
        },
        Callbacks::new(|| {}, |_, _| {}),
    );
    assert!(matches!(result, Err(Error::AlreadyStarted)));
}

#[tokio::test]
async fn test_server_error_is_surfaced() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;

    harness
        .server
        .send(SignalMessage::Error {
            kind: ErrorKind::RoomFull,
            message: "room room42 already has two peers".to_owned(),
        })
        .unwrap();

    assert!(matches!(
        next(&mut harness.failures).await,
        Error::Rejected {
            kind: ErrorKind::RoomFull,
            ..
        }
    ));
}

#[tokio::test]
async fn test_peer_leaving_resets_session() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;
    harness.server.send(SignalMessage::PeerPresent { peer: a() }).unwrap();
    next(&mut harness.from_session).await;
    harness
        .server
        .send(SignalMessage::Answer {
            target: b(),
            caller: a(),
            sdp: SessionDescription::answer("v=0 S2"),
        })
        .unwrap();
    next(&mut harness.ready).await;

    harness.server.send(SignalMessage::PeerLeft { peer: a() }).unwrap();

    assert_eq!(next(&mut harness.departures).await, a());
    assert!(!harness.manager.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_offer_times_out_and_can_be_retried() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;
    harness.server.send(SignalMessage::PeerPresent { peer: a() }).unwrap();
    assert!(matches!(
        next(&mut harness.from_session).await,
        SignalMessage::Offer { .. }
    ));

    assert!(matches!(
        next(&mut harness.failures).await,
        Error::NegotiationTimedOut(NegotiationState::HaveLocalOffer)
    ));

    harness.manager.renegotiate().unwrap();
    loop {
        if let SignalMessage::Offer { target, .. } = next(&mut harness.from_session).await {
            assert_eq!(target, a());
            break;
        }
    }
}

#[tokio::test]
async fn test_close_ends_session() {
    let mut harness = start("room42");
    joined(&mut harness, "room42").await;

    harness.manager.close();

    assert_eq!(
        time::timeout(Duration::from_secs(60), harness.from_session.recv())
            .await
            .unwrap(),
        None
    );
    assert!(matches!(harness.manager.renegotiate(), Err(Error::Closed)));
}
