//! End-to-end scenarios for the relay client.
//!
//! These drive a [`RelayClient`] over an in-memory transport, so every socket
//! callback is scripted by the test and processed on `tick()` exactly as
//! frames from a real socket would be.

use std::sync::{Arc, Mutex};

use tiktok_relay::{
    ConfigurationError, ConnectionError, ConnectionErrorKind, ConnectionState, GiftStreakEvent,
    RelayClient, RelayConfig, RelayError, Result, SocketEvents, SocketHandle, StateChange,
    StreakKey, Transport,
};

#[derive(Default)]
struct Script {
    urls: Vec<String>,
    handshakes: Vec<String>,
    sessions: Vec<SocketEvents>,
    close_requests: usize,
}

/// Transport whose sockets are driven by the test.
#[derive(Clone, Default)]
struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

struct ScriptedSocket {
    script: Arc<Mutex<Script>>,
}

impl SocketHandle for ScriptedSocket {
    fn close(&mut self) {
        self.script.lock().unwrap().close_requests += 1;
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &self,
        url: &str,
        handshake: String,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketHandle>> {
        let mut script = self.script.lock().unwrap();
        script.urls.push(url.to_string());
        script.handshakes.push(handshake);
        script.sessions.push(events);
        Ok(Box::new(ScriptedSocket {
            script: self.script.clone(),
        }))
    }
}

impl ScriptedTransport {
    fn opens(&self) -> usize {
        self.script.lock().unwrap().sessions.len()
    }

    fn close_requests(&self) -> usize {
        self.script.lock().unwrap().close_requests
    }

    /// Socket callbacks of the n-th opened session.
    fn session(&self, n: usize) -> SocketEvents {
        self.script.lock().unwrap().sessions[n].clone()
    }

    fn latest(&self) -> SocketEvents {
        let script = self.script.lock().unwrap();
        script.sessions.last().cloned().expect("no session opened")
    }
}

fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + 'static) {
    let store = Arc::new(Mutex::new(Vec::new()));
    let sink = store.clone();
    (store, move |item: &T| sink.lock().unwrap().push(item.clone()))
}

fn client_with(config: RelayConfig) -> (RelayClient, ScriptedTransport) {
    let transport = ScriptedTransport::default();
    let client = RelayClient::with_transport(config, Arc::new(transport.clone()))
        .expect("valid config");
    (client, transport)
}

fn connected_client(config: RelayConfig) -> (RelayClient, ScriptedTransport) {
    let (mut client, transport) = client_with(config);
    client.connect().expect("connect");
    transport.latest().opened();
    client.tick();
    assert_eq!(client.state(), ConnectionState::Connected);
    (client, transport)
}

fn config() -> RelayConfig {
    RelayConfig::new("real-key", "streamer")
}

mod connection_tests {
    use super::*;

    #[test]
    fn test_connect_is_idempotent_while_connecting_and_connected() {
        let (mut client, transport) = client_with(config());
        let (changes, sink) = recorder::<StateChange>();
        client.bus_mut().state_change.subscribe(sink);

        client.connect().unwrap();
        client.connect().unwrap();
        assert_eq!(transport.opens(), 1);
        assert_eq!(client.state(), ConnectionState::Connecting);

        transport.latest().opened();
        client.tick();
        client.connect().unwrap();

        assert_eq!(transport.opens(), 1);
        assert_eq!(changes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_connect_with_placeholder_credentials_never_opens_socket() {
        let cases = [
            (RelayConfig::new("", "streamer"), ConfigurationError::MissingApiKey),
            (
                RelayConfig::new("xxxxxxxxxxx", "streamer"),
                ConfigurationError::MissingApiKey,
            ),
            (
                RelayConfig::new("real-key", "default"),
                ConfigurationError::DefaultUsername("default".to_string()),
            ),
            (RelayConfig::new("real-key", "  "), ConfigurationError::EmptyUsername),
        ];

        for (config, expected) in cases {
            let (mut client, transport) = client_with(config);
            let (errors, sink) = recorder::<ConfigurationError>();
            client.bus_mut().configuration_error.subscribe(sink);

            match client.connect() {
                Err(RelayError::Configuration(err)) => assert_eq!(err, expected),
                other => panic!("expected configuration error, got {other:?}"),
            }
            assert_eq!(transport.opens(), 0);
            assert_eq!(client.state(), ConnectionState::Disconnected);
            assert_eq!(*errors.lock().unwrap(), vec![expected]);
        }
    }

    #[test]
    fn test_handshake_is_the_credentials_frame() {
        let (_client, transport) = connected_client(config());
        let script = transport.script.lock().unwrap();
        assert_eq!(
            script.urls,
            vec!["wss://tiktok-live-server-2.onrender.com/ws/streamer".to_string()]
        );
        let frame: serde_json::Value = serde_json::from_str(&script.handshakes[0]).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"apiKey": "real-key", "username": "streamer"})
        );
    }

    #[test]
    fn test_disconnect_while_disconnected_is_silent() {
        let (mut client, transport) = client_with(config());
        let (errors, sink) = recorder::<ConnectionError>();
        client.bus_mut().connection_error.subscribe(sink);
        let (changes, sink) = recorder::<StateChange>();
        client.bus_mut().state_change.subscribe(sink);

        client.disconnect();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(errors.lock().unwrap().is_empty());
        assert!(changes.lock().unwrap().is_empty());
        assert_eq!(transport.close_requests(), 0);
    }

    #[test]
    fn test_graceful_disconnect() {
        let (mut client, transport) = connected_client(config());
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnecting);
        assert_eq!(transport.close_requests(), 1);

        transport.latest().closed(None);
        client.tick();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnect_opens_a_fresh_session_after_close() {
        let (mut client, transport) = connected_client(config());
        client.reconnect().unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnecting);
        assert_eq!(transport.opens(), 1);

        transport.session(0).closed(None);
        client.tick();
        assert_eq!(transport.opens(), 2);
        assert_eq!(client.state(), ConnectionState::Connecting);

        transport.session(1).opened();
        client.tick();
        assert!(client.is_connected());
    }

    #[test]
    fn test_connect_while_disconnecting_reconnects_after_close() {
        let (mut client, transport) = connected_client(config());
        client.disconnect();
        client.connect().unwrap();
        assert_eq!(transport.opens(), 1);

        transport.session(0).closed(None);
        client.tick();
        assert_eq!(transport.opens(), 2);
    }

    #[test]
    fn test_socket_error_and_close_reason_are_reported() {
        let (mut client, transport) = connected_client(config());
        let (errors, sink) = recorder::<ConnectionError>();
        client.bus_mut().connection_error.subscribe(sink);

        let session = transport.latest();
        session.error("connection reset");
        session.closed(Some("server restarting".into()));
        client.tick();

        assert_eq!(
            *errors.lock().unwrap(),
            vec![
                ConnectionError::new(ConnectionErrorKind::Socket, "connection reset"),
                ConnectionError::new(ConnectionErrorKind::Closed, "server restarting"),
            ]
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);

        client.connect().unwrap();
        assert_eq!(transport.opens(), 2);
    }

    #[test]
    fn test_empty_close_reason_is_not_an_error() {
        let (mut client, transport) = connected_client(config());
        let (errors, sink) = recorder::<ConnectionError>();
        client.bus_mut().connection_error.subscribe(sink);

        transport.latest().closed(Some(String::new()));
        client.tick();

        assert!(errors.lock().unwrap().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_frames_from_previous_session_are_dropped() {
        let (mut client, transport) = connected_client(config());
        let (chats, sink) = recorder::<tiktok_relay::ChatMessage>();
        client.bus_mut().chat.subscribe(sink);

        client.reconnect().unwrap();
        transport.session(0).closed(None);
        client.tick();

        transport
            .session(0)
            .message(r#"{"type":"chat","userId":"1","comment":"late"}"#);
        transport
            .session(1)
            .message(r#"{"type":"chat","userId":"1","comment":"fresh"}"#);
        client.tick();

        let comments: Vec<_> = chats.lock().unwrap().iter().map(|c| c.comment.clone()).collect();
        assert_eq!(comments, vec!["fresh".to_string()]);
    }
}

mod pipeline_tests {
    use super::*;

    #[test]
    fn test_frames_are_processed_in_arrival_order() {
        let (mut client, transport) = connected_client(config());
        let (chats, sink) = recorder::<tiktok_relay::ChatMessage>();
        client.bus_mut().chat.subscribe(sink);

        let session = transport.latest();
        for i in 0..50 {
            session.message(format!(r#"{{"type":"chat","userId":"1","comment":"{i}"}}"#));
        }
        assert_eq!(client.pending(), 50);
        assert_eq!(client.tick(), 50);

        let comments: Vec<_> = chats.lock().unwrap().iter().map(|c| c.comment.clone()).collect();
        let expected: Vec<_> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(comments, expected);
    }

    #[test]
    fn test_bad_frames_do_not_stop_the_batch() {
        let (mut client, transport) = connected_client(config());
        let (likes, sink) = recorder::<tiktok_relay::LikeMessage>();
        client.bus_mut().like.subscribe(sink);

        let session = transport.latest();
        session.message("{not json");
        session.message(r#"{"type":"like","userId":"1","totalLikeCount":"many"}"#);
        session.message(r#"{"type":"unheard-of","x":1}"#);
        session.message(r#"{"type":"like","userId":"1","likeCount":3,"totalLikeCount":3}"#);
        client.tick();

        assert_eq!(likes.lock().unwrap().len(), 1);
        assert!(client.is_connected());
    }

    #[test]
    fn test_every_event_type_reaches_its_listeners() {
        let (mut client, transport) = connected_client(config());
        let counts = Arc::new(Mutex::new([0usize; 7]));

        macro_rules! count {
            ($registry:ident, $idx:expr) => {{
                let c = counts.clone();
                client
                    .bus_mut()
                    .$registry
                    .subscribe(move |_| c.lock().unwrap()[$idx] += 1);
            }};
        }
        count!(gift, 0);
        count!(room_user, 1);
        count!(like, 2);
        count!(chat, 3);
        count!(share, 4);
        count!(follow, 5);
        count!(subscribe, 6);

        let session = transport.latest();
        for payload in [
            r#"{"type":"gift","userId":"1","giftId":1,"repeatEnd":true}"#,
            r#"{"type":"roomUser","viewerCount":42}"#,
            r#"{"type":"like","userId":"1","likeCount":1,"totalLikeCount":1}"#,
            r#"{"type":"chat","userId":"1","comment":"hi"}"#,
            r#"{"type":"share","userId":"1"}"#,
            r#"{"type":"follow","userId":"1"}"#,
            r#"{"type":"subscribe","userId":"1","subMonth":2}"#,
        ] {
            session.message(payload);
        }
        client.tick();

        assert_eq!(*counts.lock().unwrap(), [1; 7]);
    }

    #[test]
    fn test_unsubscribed_listener_stops_receiving() {
        let (mut client, transport) = connected_client(config());
        let (chats, sink) = recorder::<tiktok_relay::ChatMessage>();
        let id = client.bus_mut().chat.subscribe(sink);

        let session = transport.latest();
        session.message(r#"{"type":"chat","userId":"1","comment":"one"}"#);
        client.tick();
        assert!(client.bus_mut().chat.unsubscribe(id));
        session.message(r#"{"type":"chat","userId":"1","comment":"two"}"#);
        client.tick();

        assert_eq!(chats.lock().unwrap().len(), 1);
    }
}

mod tracker_tests {
    use super::*;

    fn gift(user: &str, gift_id: i64, combo: i64, repeat_end: bool) -> String {
        format!(
            r#"{{"type":"gift","userId":"{user}","giftId":{gift_id},"combo":{combo},"repeatEnd":{repeat_end},"giftName":"Rose","diamondCount":1}}"#
        )
    }

    #[test]
    fn test_history_keeps_newest_streaks() {
        let (mut client, transport) =
            connected_client(config().with_max_log_items(2));
        let session = transport.latest();
        session.message(gift("a", 1, 1, false));
        session.message(gift("b", 1, 1, false));
        session.message(gift("c", 1, 1, false));
        client.tick();

        let streaks = client.gift_streaks();
        let users: Vec<_> = streaks.history().map(|e| e.key.user_id.as_str()).collect();
        assert_eq!(users, vec!["b", "c"]);
        assert!(streaks.open_entry(&StreakKey::new("a", 1)).is_none());
        assert!(streaks.is_open(&StreakKey::new("c", 1)));
    }

    #[test]
    fn test_combo_burst_coalesces_into_one_entry() {
        let (mut client, transport) = connected_client(config());
        let (updates, sink) = recorder::<GiftStreakEvent>();
        client.bus_mut().gift_streak.subscribe(sink);

        let session = transport.latest();
        session.message(gift("k", 7, 1, false));
        session.message(gift("k", 7, 3, false));
        session.message(gift("k", 7, 3, true));
        client.tick();

        let streaks = client.gift_streaks();
        assert_eq!(streaks.len(), 1);
        let entry = streaks.history().next().unwrap();
        assert_eq!(entry.cumulative_combo, 3);
        assert!(!entry.open);
        assert!(!streaks.is_open(&StreakKey::new("k", 7)));

        let seen: Vec<_> = updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| (u.entry().cumulative_combo, u.entry().open))
            .collect();
        assert_eq!(seen, vec![(1, true), (3, true), (3, false)]);

        // A new burst for the same key starts a new entry.
        session.message(gift("k", 7, 1, false));
        client.tick();
        assert_eq!(client.gift_streaks().len(), 2);
    }

    #[test]
    fn test_like_milestones_follow_relay_totals() {
        let (mut client, transport) = connected_client(config().with_like_threshold(100));
        let (milestones, sink) = recorder::<tiktok_relay::LikeMilestone>();
        client.bus_mut().like_milestone.subscribe(sink);

        let session = transport.latest();
        session.message(r#"{"type":"like","userId":"u","likeCount":50,"totalLikeCount":50}"#);
        session.message(r#"{"type":"like","userId":"u","likeCount":200,"totalLikeCount":250}"#);
        session.message(r#"{"type":"like","userId":"u","likeCount":200,"totalLikeCount":250}"#);
        client.tick();

        let achieved: Vec<_> = milestones
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.achieved_count)
            .collect();
        assert_eq!(achieved, vec![100, 200]);
    }
}
