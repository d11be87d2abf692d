//! The per-connection state machine: setup negotiation, subscribe/announce
//! lifecycles, object dispatch, publish multiplexing, and teardown.

mod control;
mod publisher;
mod subscriber;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use control::Control;
use publisher::{PubTrack, PublishData, PublishKey};

use crate::coding::{Reader, Stream, Version, Versions};
use crate::message::{
	AnnounceError, ControlMessage, FullTrackName, GroupOrder, Role, ServerSetup, SetupParameter, SubscribeError,
	SubscribeId, TrackAlias, VERSION_CURRENT,
};
use crate::message::ClientSetup;
use crate::model::{ObjectConsumer, TrackConsumer, TrackProducer};
use crate::{transport, SessionError};

/// Session-wide knobs; the defaults match the draft recommendations.
#[derive(Clone, Debug)]
pub struct SessionConfig {
	/// Whether this endpoint publishes, subscribes, or both.
	pub role: Role,

	/// The versions offered (client) or accepted (server), in preferred order.
	pub versions: Versions,

	/// How long setup may take before the session is abandoned.
	pub setup_timeout: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			role: Role::PubAndSub,
			versions: [VERSION_CURRENT].into(),
			setup_timeout: Duration::from_secs(5),
		}
	}
}

/// Peer-originated control events for the application to act on.
///
/// Requests answered by the session itself (SUBSCRIBE_OK and friends) are
/// consumed internally and never show up here.
pub struct ControlMessages {
	rx: mpsc::UnboundedReceiver<ControlMessage>,
}

impl ControlMessages {
	/// The next control event, or [None] once the session is closed.
	pub async fn next(&mut self) -> Option<ControlMessage> {
		self.rx.recv().await
	}
}

/// Resolve the effective group order: the subscriber's preference wins
/// unless it defers.
pub fn resolve_group_order(publisher: GroupOrder, subscriber: GroupOrder) -> GroupOrder {
	match subscriber {
		GroupOrder::Default => publisher,
		other => other,
	}
}

struct PendingSubscribe {
	ok: oneshot::Sender<Result<TrackConsumer, SubscribeError>>,
	objects: mpsc::UnboundedReceiver<ObjectConsumer>,
}

struct SubscribeState {
	track: FullTrackName,
	track_alias: TrackAlias,
	producer: TrackProducer,

	/// Present until SUBSCRIBE_OK or SUBSCRIBE_ERROR arrives.
	pending: Option<PendingSubscribe>,
}

#[derive(Default)]
struct State {
	// Subscriber side
	subscribes: HashMap<SubscribeId, SubscribeState>,
	next_subscribe_id: SubscribeId,

	// Publisher side
	pub_tracks: HashMap<SubscribeId, PubTrack>,
	pub_aliases: HashSet<TrackAlias>,
	pending_announces: HashMap<String, oneshot::Sender<Result<(), AnnounceError>>>,

	/// Set once GOAWAY arrives; new requests are rejected.
	draining: bool,

	/// Set exactly once on teardown.
	closed: Option<SessionError>,
}

/// A MoQ transport session on top of a WebTransport-style connection.
///
/// Created via [Session::connect] (client) or [Session::accept] (server).
/// Handles are cheap clones of the same session.
pub struct Session<S: transport::Session> {
	webtransport: S,
	control: Control,
	version: Version,
	state: Arc<Mutex<State>>,
	publish: Arc<tokio::sync::Mutex<HashMap<PublishKey, PublishData<S::SendStream>>>>,
}

impl<S: transport::Session> Clone for Session<S> {
	fn clone(&self) -> Self {
		Self {
			webtransport: self.webtransport.clone(),
			control: self.control.clone(),
			version: self.version,
			state: self.state.clone(),
			publish: self.publish.clone(),
		}
	}
}

impl<S: transport::Session> Session<S> {
	/// Perform the setup negotiation as a client.
	///
	/// Opens the control stream, sends CLIENT_SETUP, and awaits SERVER_SETUP
	/// under the configured timeout. The connection is closed on failure.
	pub async fn connect(webtransport: S, config: SessionConfig) -> Result<(Self, ControlMessages), SessionError> {
		match Self::connect_setup(&webtransport, config).await {
			Ok((stream, version)) => Ok(Self::start(webtransport, stream, version)),
			Err(err) => {
				webtransport.close(err.to_code(), &err.to_string());
				Err(err)
			}
		}
	}

	async fn connect_setup(webtransport: &S, config: SessionConfig) -> Result<(Stream<S>, Version), SessionError> {
		let mut stream = Stream::open(webtransport, VERSION_CURRENT).await?;

		let client = ClientSetup {
			versions: config.versions.clone(),
			params: vec![SetupParameter::Role(config.role)],
		};
		tracing::debug!(setup = ?client, "sending client setup");

		let server = timeout(config.setup_timeout, async {
			stream.writer.encode(&ControlMessage::ClientSetup(client)).await?;

			match stream.reader.decode().await? {
				ControlMessage::ServerSetup(server) => Ok(server),
				_ => Err(SessionError::UnexpectedMessage),
			}
		})
		.await
		.map_err(|_| SessionError::SetupTimeout)??;

		tracing::debug!(setup = ?server, "received server setup");

		if !config.versions.contains(&server.version) {
			return Err(SessionError::Version(config.versions, [server.version].into()));
		}

		tracing::info!(version = ?server.version, "connected");
		let version = server.version;
		Ok((stream.with_version(version), version))
	}

	/// Perform the setup negotiation as a server.
	///
	/// Accepts the control stream, awaits CLIENT_SETUP, selects a version from
	/// the intersection, and replies with SERVER_SETUP. The connection is
	/// closed on failure.
	pub async fn accept(webtransport: S, config: SessionConfig) -> Result<(Self, ControlMessages), SessionError> {
		match Self::accept_setup(&webtransport, config).await {
			Ok((stream, version)) => Ok(Self::start(webtransport, stream, version)),
			Err(err) => {
				webtransport.close(err.to_code(), &err.to_string());
				Err(err)
			}
		}
	}

	async fn accept_setup(webtransport: &S, config: SessionConfig) -> Result<(Stream<S>, Version), SessionError> {
		let mut stream = Stream::accept(webtransport, VERSION_CURRENT).await?;

		let client = timeout(config.setup_timeout, async {
			match stream.reader.decode().await? {
				ControlMessage::ClientSetup(client) => Ok(client),
				_ => Err(SessionError::UnexpectedMessage),
			}
		})
		.await
		.map_err(|_| SessionError::SetupTimeout)??;

		tracing::debug!(setup = ?client, "received client setup");

		// Our newest supported version the client also offers.
		let version = config
			.versions
			.iter()
			.find(|v| client.versions.contains(v))
			.copied()
			.ok_or_else(|| SessionError::Version(client.versions.clone(), config.versions.clone()))?;

		let server = ServerSetup {
			version,
			params: vec![SetupParameter::Role(config.role)],
		};
		tracing::debug!(setup = ?server, "sending server setup");

		let mut stream = stream.with_version(version);
		stream.writer.encode(&ControlMessage::ServerSetup(server)).await?;

		tracing::info!(version = ?version, "connected");
		Ok((stream, version))
	}

	fn start(webtransport: S, stream: Stream<S>, version: Version) -> (Self, ControlMessages) {
		let (tx, rx) = mpsc::unbounded_channel();
		let (msg_tx, msg_rx) = mpsc::unbounded_channel();

		let this = Self {
			webtransport,
			control: Control::new(tx, version),
			version,
			state: Default::default(),
			publish: Default::default(),
		};

		tokio::spawn(this.clone().run(stream, rx, msg_tx));

		(this, ControlMessages { rx: msg_rx })
	}

	async fn run(
		self,
		stream: Stream<S>,
		control_rx: mpsc::UnboundedReceiver<Vec<u8>>,
		messages: mpsc::UnboundedSender<ControlMessage>,
	) {
		let Stream { reader, writer } = stream;

		let res = tokio::select! {
			res = self.clone().run_control(reader, messages) => res,
			res = Control::run(writer, control_rx) => res,
			res = self.clone().run_uni_streams() => res,
			res = self.clone().run_datagrams() => res,
			err = self.webtransport.closed() => Err(SessionError::Transport(Arc::new(err))),
		};

		match &res {
			Ok(()) => tracing::info!("session closed"),
			Err(SessionError::Transport(_)) => tracing::info!("session terminated"),
			Err(err) => tracing::warn!(%err, "session error"),
		}

		self.shutdown(res.err().unwrap_or(SessionError::Closed));
	}

	/// The control stream read loop; messages arrive in wire order.
	async fn run_control(
		self,
		mut reader: Reader<S::RecvStream>,
		messages: mpsc::UnboundedSender<ControlMessage>,
	) -> Result<(), SessionError> {
		loop {
			let msg = match reader.decode_maybe::<ControlMessage>().await? {
				Some(msg) => msg,
				None => return Ok(()),
			};

			tracing::debug!(message = ?msg, "received control message");
			self.recv_message(msg, &messages)?;
		}
	}

	fn recv_message(
		&self,
		msg: ControlMessage,
		messages: &mpsc::UnboundedSender<ControlMessage>,
	) -> Result<(), SessionError> {
		match msg {
			// Setup happened before the loop started; a second one is fatal.
			ControlMessage::ClientSetup(_) | ControlMessage::ServerSetup(_) => Err(SessionError::UnexpectedMessage),

			ControlMessage::SubscribeOk(msg) => self.recv_subscribe_ok(msg),
			ControlMessage::SubscribeError(msg) => self.recv_subscribe_error(msg),
			ControlMessage::AnnounceOk(msg) => self.recv_announce_ok(msg),
			ControlMessage::AnnounceError(msg) => self.recv_announce_error(msg),

			ControlMessage::Subscribe(msg) => {
				self.recv_subscribe(&msg)?;
				let _ = messages.send(ControlMessage::Subscribe(msg));
				Ok(())
			}
			ControlMessage::SubscribeUpdate(msg) => {
				self.recv_subscribe_update(&msg);
				let _ = messages.send(ControlMessage::SubscribeUpdate(msg));
				Ok(())
			}
			ControlMessage::SubscribeDone(msg) => {
				self.recv_subscribe_done(&msg);
				let _ = messages.send(ControlMessage::SubscribeDone(msg));
				Ok(())
			}
			ControlMessage::Goaway(msg) => {
				self.state.lock().unwrap().draining = true;
				let _ = messages.send(ControlMessage::Goaway(msg));
				Ok(())
			}

			// The rest is application policy; surface it untouched.
			msg @ (ControlMessage::Announce(_)
			| ControlMessage::Unannounce(_)
			| ControlMessage::AnnounceCancel(_)
			| ControlMessage::Unsubscribe(_)
			| ControlMessage::TrackStatusRequest(_)
			| ControlMessage::TrackStatus(_)) => {
				let _ = messages.send(msg);
				Ok(())
			}
		}
	}

	/// Begin graceful migration to a new session URI.
	pub fn goaway(&self, new_session_uri: String) -> Result<(), SessionError> {
		self.control
			.send(ControlMessage::Goaway(crate::message::Goaway { new_session_uri }))
	}

	/// Accept a peer-announced namespace.
	pub fn announce_ok(&self, msg: crate::message::AnnounceOk) -> Result<(), SessionError> {
		self.control.send(ControlMessage::AnnounceOk(msg))
	}

	/// Reject a peer-announced namespace.
	pub fn announce_error(&self, msg: AnnounceError) -> Result<(), SessionError> {
		self.control.send(ControlMessage::AnnounceError(msg))
	}

	/// Revoke a previously accepted namespace.
	pub fn announce_cancel(&self, msg: crate::message::AnnounceCancel) -> Result<(), SessionError> {
		self.control.send(ControlMessage::AnnounceCancel(msg))
	}

	/// Ask the peer about the state of a track.
	pub fn track_status_request(&self, msg: crate::message::TrackStatusRequest) -> Result<(), SessionError> {
		self.control.send(ControlMessage::TrackStatusRequest(msg))
	}

	/// Answer a peer's track status request.
	pub fn track_status(&self, msg: crate::message::TrackStatus) -> Result<(), SessionError> {
		self.control.send(ControlMessage::TrackStatus(msg))
	}

	/// Narrow an active subscription.
	pub fn subscribe_update(&self, msg: crate::message::SubscribeUpdate) -> Result<(), SessionError> {
		self.control.send(ControlMessage::SubscribeUpdate(msg))
	}

	/// Close the session, failing every pending request.
	///
	/// Idempotent.
	pub fn close(&self) {
		self.shutdown(SessionError::Closed);
	}

	/// Wait until the session ends, returning the reason.
	pub async fn closed(&self) -> SessionError {
		let err = self.webtransport.closed().await;

		let state = self.state.lock().unwrap();
		state
			.closed
			.clone()
			.unwrap_or(SessionError::Transport(Arc::new(err)))
	}

	fn shutdown(&self, err: SessionError) {
		{
			let mut state = self.state.lock().unwrap();
			if state.closed.is_some() {
				return;
			}
			state.closed = Some(err.clone());

			// Dropping the pending senders fails their futures; dropping the
			// producers terminates the delivery queues.
			state.subscribes.clear();
			state.pending_announces.clear();
			state.pub_tracks.clear();
			state.pub_aliases.clear();
		}

		// Open publish streams abort as their writers drop.
		let publish = self.publish.clone();
		tokio::spawn(async move {
			publish.lock().await.clear();
		});

		self.webtransport.close(err.to_code(), &err.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::{
		AbsoluteLocation, AnnounceOk, ForwardPreference, ObjectHeader, ObjectStatus, Subscribe, SubscribeDone,
		SubscribeDoneCode, SubscribeErrorCode, SubscribeOk,
	};
	use crate::test_utils::MemSession;

	use bytes::Bytes;

	type TestSession = Session<MemSession>;

	async fn connected() -> (TestSession, ControlMessages, TestSession, ControlMessages) {
		let (a, b) = MemSession::pair();

		let client = Session::connect(a, SessionConfig::default());
		let server = Session::accept(
			b,
			SessionConfig {
				role: Role::Publisher,
				..Default::default()
			},
		);

		let (client, server) = tokio::join!(client, server);
		let (client, client_messages) = client.unwrap();
		let (server, server_messages) = server.unwrap();

		(client, client_messages, server, server_messages)
	}

	/// Subscribe from the client and accept it on the server.
	async fn subscribed(
		client: &TestSession,
		server: &TestSession,
		server_messages: &mut ControlMessages,
		latest: Option<AbsoluteLocation>,
	) -> (TrackConsumer, Subscribe) {
		let client = client.clone();
		let handle = tokio::spawn(async move {
			client
				.subscribe(Subscribe::new(FullTrackName::new("conference", "video")))
				.await
		});

		let request = match server_messages.next().await.unwrap() {
			ControlMessage::Subscribe(request) => request,
			other => panic!("expected subscribe, got {:?}", other),
		};

		server
			.subscribe_ok(SubscribeOk {
				subscribe_id: request.subscribe_id,
				expires: Duration::ZERO,
				group_order: GroupOrder::OldestFirst,
				latest,
				params: Default::default(),
			})
			.unwrap();

		let track = handle.await.unwrap().unwrap();
		(track, request)
	}

	#[tokio::test]
	async fn test_setup_handshake() {
		let (client, _client_messages, server, _server_messages) = connected().await;
		client.close();
		drop(server);
	}

	#[tokio::test]
	async fn test_version_mismatch() {
		let (a, b) = MemSession::pair();

		let client = Session::connect(
			a,
			SessionConfig {
				versions: [Version(0xff0000aa)].into(),
				..Default::default()
			},
		);
		let server = Session::accept(b, SessionConfig::default());

		let (client, server) = tokio::join!(client, server);
		assert!(matches!(server.err(), Some(SessionError::Version(..))));
		assert!(client.is_err());
	}

	#[tokio::test]
	async fn test_subscribe_accepted() {
		let (client, _client_messages, server, mut server_messages) = connected().await;

		let latest = Some(AbsoluteLocation::new(42, 3));
		let (track, request) = subscribed(&client, &server, &mut server_messages, latest).await;

		assert_eq!(request.track, FullTrackName::new("conference", "video"));
		assert_eq!(track.subscribe_id, request.subscribe_id);
		assert_eq!(track.group_order(), GroupOrder::OldestFirst);
		assert_eq!(track.latest(), latest);
	}

	#[tokio::test]
	async fn test_subscribe_rejected_with_retry_alias() {
		let (client, _client_messages, server, mut server_messages) = connected().await;

		let subscribing = tokio::spawn({
			let client = client.clone();
			async move { client.subscribe(Subscribe::new(FullTrackName::new("ns", "track"))).await }
		});

		let request = match server_messages.next().await.unwrap() {
			ControlMessage::Subscribe(request) => request,
			other => panic!("expected subscribe, got {:?}", other),
		};

		server
			.subscribe_error(SubscribeError {
				subscribe_id: request.subscribe_id,
				error_code: SubscribeErrorCode::RetryTrackAlias,
				reason: "alias".to_string(),
				retry_alias: Some(12),
			})
			.unwrap();

		let err = subscribing.await.unwrap().unwrap_err();
		assert_eq!(err.error_code, SubscribeErrorCode::RetryTrackAlias);
		assert_eq!(err.retry_alias, Some(12));
	}

	#[tokio::test]
	async fn test_publish_group_stream() {
		let (client, _client_messages, server, mut server_messages) = connected().await;
		let (mut track, request) = subscribed(&client, &server, &mut server_messages, None).await;

		let header = ObjectHeader {
			subscribe_id: request.subscribe_id,
			track_alias: request.track_alias,
			group: 9,
			id: 0,
			priority: 4,
			forward: ForwardPreference::Group,
			status: ObjectStatus::Normal,
			length: None,
		};

		// Both objects share the group's stream; the marker also closes it.
		server
			.publish(header.clone(), 0, Bytes::from_static(b"hi"), true)
			.await
			.unwrap();
		server
			.publish_status(ObjectHeader {
				id: 1,
				status: ObjectStatus::EndOfGroup,
				..header.clone()
			})
			.await
			.unwrap();

		let mut first = track.next_object().await.unwrap();
		assert_eq!(first.header.group, 9);
		assert_eq!(first.header.id, 0);
		assert_eq!(first.header.forward, ForwardPreference::Group);
		assert_eq!(first.payload().await.unwrap(), Bytes::from_static(b"hi"));

		let second = track.next_object().await.unwrap();
		assert_eq!(second.header.id, 1);
		assert_eq!(second.header.status, ObjectStatus::EndOfGroup);
	}

	#[tokio::test]
	async fn test_publish_object_in_pieces() {
		let (client, _client_messages, server, mut server_messages) = connected().await;
		let (mut track, request) = subscribed(&client, &server, &mut server_messages, None).await;

		let header = ObjectHeader {
			subscribe_id: request.subscribe_id,
			track_alias: request.track_alias,
			group: 0,
			id: 0,
			priority: 1,
			forward: ForwardPreference::Object,
			status: ObjectStatus::Normal,
			length: None,
		};

		server
			.publish(header.clone(), 0, Bytes::from_static(b"hello "), false)
			.await
			.unwrap();
		server
			.publish(header, 6, Bytes::from_static(b"world"), true)
			.await
			.unwrap();

		let mut object = track.next_object().await.unwrap();
		assert_eq!(object.payload().await.unwrap(), Bytes::from_static(b"hello world"));
	}

	#[tokio::test]
	async fn test_publish_datagram() {
		let (client, _client_messages, server, mut server_messages) = connected().await;
		let (mut track, request) = subscribed(&client, &server, &mut server_messages, None).await;

		let header = ObjectHeader {
			subscribe_id: request.subscribe_id,
			track_alias: request.track_alias,
			group: 3,
			id: 7,
			priority: 0,
			forward: ForwardPreference::Datagram,
			status: ObjectStatus::Normal,
			length: None,
		};

		server
			.publish(header, 0, Bytes::from_static(b"dgram"), true)
			.await
			.unwrap();

		let mut object = track.next_object().await.unwrap();
		assert_eq!(object.header.forward, ForwardPreference::Datagram);
		assert_eq!(object.header.group, 3);
		assert_eq!(object.payload().await.unwrap(), Bytes::from_static(b"dgram"));
	}

	#[tokio::test]
	async fn test_truncated_multi_object_fails_stream() {
		use crate::transport::{SendStream as _, Session as _};

		let (a, b) = MemSession::pair();
		let raw_server = b.clone();

		let (client, server) = tokio::join!(
			Session::connect(a, SessionConfig::default()),
			Session::accept(b, SessionConfig::default()),
		);
		let (client, _client_messages) = client.unwrap();
		let (server, mut server_messages) = server.unwrap();

		let (mut track, request) = subscribed(&client, &server, &mut server_messages, None).await;

		// A group stream whose object claims 5 payload bytes but ends after 2.
		#[rustfmt::skip]
		let wire = [
			0x51, // STREAM_HEADER_GROUP
			request.subscribe_id as u8,
			request.track_alias as u8,
			0x01, // group
			0x00, // priority
			0x00, // object id
			0x05, // length
			0x68, 0x69, // "hi", then FIN
		];

		let mut stream = raw_server.open_uni().await.unwrap();
		stream.write_buf(&mut &wire[..]).await.unwrap();
		stream.finish().unwrap();

		let mut object = track.next_object().await.unwrap();
		assert_eq!(object.header.length, Some(5));

		let err = object.payload().await.unwrap_err();
		assert!(matches!(err, SessionError::WrongSize));
	}

	#[tokio::test]
	async fn test_subscribe_done_ends_track() {
		let (client, mut client_messages, server, mut server_messages) = connected().await;
		let (mut track, request) = subscribed(&client, &server, &mut server_messages, None).await;

		server
			.subscribe_done(SubscribeDone {
				subscribe_id: request.subscribe_id,
				status_code: SubscribeDoneCode::TrackEnded,
				reason: "over".to_string(),
				last: None,
			})
			.unwrap();

		assert!(track.next_object().await.is_none());

		match client_messages.next().await.unwrap() {
			ControlMessage::SubscribeDone(done) => {
				assert_eq!(done.status_code, SubscribeDoneCode::TrackEnded)
			}
			other => panic!("expected subscribe done, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_unsubscribe_ends_track() {
		let (client, _client_messages, server, mut server_messages) = connected().await;
		let (mut track, request) = subscribed(&client, &server, &mut server_messages, None).await;

		client.unsubscribe(request.subscribe_id).unwrap();

		match server_messages.next().await.unwrap() {
			ControlMessage::Unsubscribe(msg) => assert_eq!(msg.subscribe_id, request.subscribe_id),
			other => panic!("expected unsubscribe, got {:?}", other),
		}

		assert!(track.next_object().await.is_none());
	}

	#[tokio::test]
	async fn test_announce_accepted() {
		let (client, _client_messages, server, mut server_messages) = connected().await;

		let announcing = tokio::spawn({
			let client = client.clone();
			async move { client.announce("conference/room1".to_string(), Default::default()).await }
		});

		let announce = match server_messages.next().await.unwrap() {
			ControlMessage::Announce(msg) => msg,
			other => panic!("expected announce, got {:?}", other),
		};

		server
			.announce_ok(AnnounceOk {
				namespace: announce.namespace,
			})
			.unwrap();

		announcing.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_announce_rejected() {
		let (client, _client_messages, server, mut server_messages) = connected().await;

		let announcing = tokio::spawn({
			let client = client.clone();
			async move { client.announce("forbidden".to_string(), Default::default()).await }
		});

		let announce = match server_messages.next().await.unwrap() {
			ControlMessage::Announce(msg) => msg,
			other => panic!("expected announce, got {:?}", other),
		};

		server
			.announce_error(AnnounceError {
				namespace: announce.namespace,
				error_code: 403,
				reason: "nope".to_string(),
			})
			.unwrap();

		let err = announcing.await.unwrap().unwrap_err();
		assert_eq!(err.error_code, 403);
	}

	#[tokio::test]
	async fn test_goaway_rejects_new_subscribes() {
		let (client, mut client_messages, server, _server_messages) = connected().await;

		server.goaway("https://relay2.example.com".to_string()).unwrap();

		match client_messages.next().await.unwrap() {
			ControlMessage::Goaway(msg) => {
				assert_eq!(msg.new_session_uri, "https://relay2.example.com")
			}
			other => panic!("expected goaway, got {:?}", other),
		}

		let err = client
			.subscribe(Subscribe::new(FullTrackName::new("ns", "track")))
			.await
			.unwrap_err();
		assert_eq!(err.reason, "going away");
	}

	#[tokio::test]
	async fn test_close_fails_pending_subscribe() {
		let (client, _client_messages, _server, _server_messages) = connected().await;

		let subscribing = tokio::spawn({
			let client = client.clone();
			async move { client.subscribe(Subscribe::new(FullTrackName::new("ns", "track"))).await }
		});

		// Let the subscribe register before tearing down.
		tokio::task::yield_now().await;
		client.close();

		let err = subscribing.await.unwrap().unwrap_err();
		assert_eq!(err.reason, "session closed");
	}

	#[test]
	fn test_resolve_group_order() {
		assert_eq!(
			resolve_group_order(GroupOrder::NewestFirst, GroupOrder::Default),
			GroupOrder::NewestFirst
		);
		assert_eq!(
			resolve_group_order(GroupOrder::NewestFirst, GroupOrder::OldestFirst),
			GroupOrder::OldestFirst
		);
	}

	#[tokio::test]
	async fn test_send_order_prefers_lower_priority_values() {
		let header = |priority, group, id| ObjectHeader {
			subscribe_id: 0,
			track_alias: 0,
			group,
			id,
			priority,
			forward: ForwardPreference::Group,
			status: ObjectStatus::Normal,
			length: None,
		};

		let (a, _b) = MemSession::pair();
		let (session, _messages) = Session::start(
			a,
			// A dummy stream pair; the session is never driven.
			idle_stream(),
			VERSION_CURRENT,
		);

		assert!(session.send_order(&header(1, 0, 0)) < session.send_order(&header(2, 0, 0)));
		assert!(session.send_order(&header(1, 0, 0)) < session.send_order(&header(1, 1, 0)));
		assert!(session.send_order(&header(1, 1, 0)) < session.send_order(&header(1, 1, 1)));
	}

	fn idle_stream() -> Stream<MemSession> {
		let (send, _recv) = crate::test_utils::stream_pair();
		let (_send, recv) = crate::test_utils::stream_pair();
		Stream {
			writer: crate::coding::Writer::new(send, VERSION_CURRENT),
			reader: Reader::new(recv, VERSION_CURRENT),
		}
	}
}
