//! The publisher half: peer subscription bookkeeping, the announce
//! lifecycle, and object publishing multiplexed across streams.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;

use crate::coding::{Encode, Writer};
use crate::message::{
	Announce, AnnounceError, ControlMessage, ForwardPreference, FrameType, GroupHeader, GroupObject, GroupOrder,
	ObjectHeader, ObjectStatus, Parameters, Subscribe, SubscribeDone, SubscribeError, SubscribeOk, SubscribeUpdate,
	TrackAlias, TrackHeader, TrackObject, Unannounce,
};
use crate::{transport, SessionError};

use super::Session;

// Group and object numbers are truncated to this many bits in the send order.
const ORDER_ID_MASK: u64 = 0x1f_ffff;

fn local_error(namespace: &str, reason: &str) -> AnnounceError {
	AnnounceError {
		namespace: namespace.to_string(),
		error_code: 500,
		reason: reason.to_string(),
	}
}

/// What we remember about a peer subscription we accepted.
#[derive(Clone, Copy)]
pub(super) struct PubTrack {
	pub priority: u8,
	pub group_order: GroupOrder,
	pub alias: TrackAlias,
}

/// Identifies the open stream an object belongs on.
///
/// Equality collapses by forwarding preference: every object of a Track
/// subscription shares one key, a Group key adds the group number, and
/// Object/Datagram keys are unique per object.
#[derive(Clone, Copy, Debug)]
pub(super) struct PublishKey {
	subscribe_id: u64,
	group: u64,
	object: u64,
	forward: ForwardPreference,
}

impl PublishKey {
	fn new(header: &ObjectHeader) -> Self {
		Self {
			subscribe_id: header.subscribe_id,
			group: header.group,
			object: header.id,
			forward: header.forward,
		}
	}
}

impl PartialEq for PublishKey {
	fn eq(&self, other: &Self) -> bool {
		if self.subscribe_id != other.subscribe_id || self.forward != other.forward {
			return false;
		}

		match self.forward {
			ForwardPreference::Track => true,
			ForwardPreference::Group => self.group == other.group,
			ForwardPreference::Object | ForwardPreference::Datagram => {
				self.group == other.group && self.object == other.object
			}
		}
	}
}

impl Eq for PublishKey {}

impl std::hash::Hash for PublishKey {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		// Must only cover the fields equality looks at.
		self.subscribe_id.hash(state);
		std::mem::discriminant(&self.forward).hash(state);

		match self.forward {
			ForwardPreference::Track => {}
			ForwardPreference::Group => self.group.hash(state),
			ForwardPreference::Object | ForwardPreference::Datagram => {
				self.group.hash(state);
				self.object.hash(state);
			}
		}
	}
}

/// Book-keeping for one open publish stream.
pub(super) struct PublishData<W: transport::SendStream> {
	stream: Writer<W>,
	group: u64,
	object: u64,

	/// Remaining payload bytes of the current object, when bounded.
	remain: Option<u64>,

	/// Byte offset within the current object.
	offset: u64,
}

impl<S: transport::Session> Session<S> {
	pub(super) fn recv_subscribe(&self, msg: &Subscribe) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();

		if state.pub_tracks.contains_key(&msg.subscribe_id) || !state.pub_aliases.insert(msg.track_alias) {
			return Err(SessionError::Duplicate);
		}

		state.pub_tracks.insert(
			msg.subscribe_id,
			PubTrack {
				priority: msg.priority,
				group_order: msg.group_order,
				alias: msg.track_alias,
			},
		);

		Ok(())
	}

	pub(super) fn recv_subscribe_update(&self, msg: &SubscribeUpdate) {
		if let Some(track) = self.state.lock().unwrap().pub_tracks.get_mut(&msg.subscribe_id) {
			track.priority = msg.priority;
		}
	}

	/// Accept a peer subscription, recording the granted group order.
	pub fn subscribe_ok(&self, msg: SubscribeOk) -> Result<(), SessionError> {
		{
			let mut state = self.state.lock().unwrap();
			let track = state
				.pub_tracks
				.get_mut(&msg.subscribe_id)
				.ok_or(SessionError::NotFound)?;
			track.group_order = msg.group_order;
		}

		self.control.send(ControlMessage::SubscribeOk(msg))
	}

	/// Reject a peer subscription.
	pub fn subscribe_error(&self, msg: SubscribeError) -> Result<(), SessionError> {
		self.drop_pub_track(msg.subscribe_id);
		self.control.send(ControlMessage::SubscribeError(msg))
	}

	/// Finish a peer subscription.
	pub fn subscribe_done(&self, msg: SubscribeDone) -> Result<(), SessionError> {
		self.drop_pub_track(msg.subscribe_id);
		self.control.send(ControlMessage::SubscribeDone(msg))
	}

	fn drop_pub_track(&self, subscribe_id: u64) {
		let mut state = self.state.lock().unwrap();
		if let Some(track) = state.pub_tracks.remove(&subscribe_id) {
			state.pub_aliases.remove(&track.alias);
		}
	}

	/// Offer a namespace to the peer, resolving on ANNOUNCE_OK or
	/// ANNOUNCE_ERROR.
	pub async fn announce(&self, namespace: String, params: Parameters) -> Result<(), AnnounceError> {
		let (tx, rx) = oneshot::channel();

		{
			let mut state = self.state.lock().unwrap();
			if state.closed.is_some() || state.draining {
				return Err(local_error(&namespace, "session closed"));
			}
			if state.pending_announces.contains_key(&namespace) {
				return Err(local_error(&namespace, "announce already pending"));
			}
			state.pending_announces.insert(namespace.clone(), tx);
		}

		tracing::info!(namespace = %namespace, "announcing");

		let msg = Announce {
			namespace: namespace.clone(),
			params,
		};
		if self.control.send(ControlMessage::Announce(msg)).is_err() {
			self.state.lock().unwrap().pending_announces.remove(&namespace);
			return Err(local_error(&namespace, "session closed"));
		}

		match rx.await {
			Ok(res) => res,
			Err(_) => Err(local_error(&namespace, "session closed")),
		}
	}

	/// Withdraw a namespace.
	pub fn unannounce(&self, namespace: String) -> Result<(), SessionError> {
		self.state.lock().unwrap().pending_announces.remove(&namespace);
		self.control.send(ControlMessage::Unannounce(Unannounce { namespace }))
	}

	pub(super) fn recv_announce_ok(&self, msg: crate::message::AnnounceOk) -> Result<(), SessionError> {
		match self.state.lock().unwrap().pending_announces.remove(&msg.namespace) {
			Some(tx) => {
				let _ = tx.send(Ok(()));
			}
			None => tracing::warn!(namespace = %msg.namespace, "announce ok for unknown namespace"),
		}

		Ok(())
	}

	pub(super) fn recv_announce_error(&self, msg: AnnounceError) -> Result<(), SessionError> {
		match self.state.lock().unwrap().pending_announces.remove(&msg.namespace) {
			Some(tx) => {
				let _ = tx.send(Err(msg));
			}
			None => tracing::warn!(namespace = %msg.namespace, "announce error for unknown namespace"),
		}

		Ok(())
	}

	/// Publish one object, or a piece of it.
	///
	/// `payload_offset` is the byte position of this piece within the object
	/// and `eom` marks the final piece; a whole object is `(0, payload, true)`.
	/// Objects share streams according to the forwarding preference.
	pub async fn publish(
		&self,
		header: ObjectHeader,
		payload_offset: u64,
		payload: Bytes,
		eom: bool,
	) -> Result<(), SessionError> {
		if header.status != ObjectStatus::Normal {
			return Err(SessionError::InvalidObject);
		}

		self.publish_inner(header, payload_offset, payload, eom).await
	}

	/// Publish a status marker; it has no payload.
	pub async fn publish_status(&self, header: ObjectHeader) -> Result<(), SessionError> {
		if header.status == ObjectStatus::Normal {
			return Err(SessionError::InvalidObject);
		}

		self.publish_inner(header, 0, Bytes::new(), true).await
	}

	async fn publish_inner(
		&self,
		header: ObjectHeader,
		payload_offset: u64,
		payload: Bytes,
		eom: bool,
	) -> Result<(), SessionError> {
		tracing::trace!(?header, offset = payload_offset, len = payload.len(), eom, "publishing");

		// Datagrams are fire-and-forget; one per call, no book-keeping.
		if header.forward == ForwardPreference::Datagram {
			let mut buf = BytesMut::new();
			FrameType::ObjectDatagram.encode(&mut buf, self.version);
			header.encode(&mut buf, self.version);
			buf.extend_from_slice(&payload);

			return self
				.webtransport
				.send_datagram(buf.freeze())
				.map_err(|err| SessionError::Transport(Arc::new(err)));
		}

		let mut map = self.publish.lock().await;
		let key = PublishKey::new(&header);
		let mut buf = BytesMut::new();

		if !map.contains_key(&key) {
			// The stream open for this object failed earlier; the rest of it
			// cannot start mid-payload on a fresh stream.
			if payload_offset != 0 {
				tracing::warn!(?header, "cannot start publishing mid-object");
				return Err(SessionError::WrongSize);
			}

			let stream = self
				.webtransport
				.open_uni()
				.await
				.map_err(|err| SessionError::Transport(Arc::new(err)))?;

			let mut writer = Writer::new(stream, self.version);
			writer.set_priority(self.send_order(&header) as i64);

			match header.forward {
				ForwardPreference::Track => {
					FrameType::StreamHeaderTrack.encode(&mut buf, self.version);
					TrackHeader {
						subscribe_id: header.subscribe_id,
						track_alias: header.track_alias,
						priority: header.priority,
					}
					.encode(&mut buf, self.version);
				}
				ForwardPreference::Group => {
					FrameType::StreamHeaderGroup.encode(&mut buf, self.version);
					GroupHeader {
						subscribe_id: header.subscribe_id,
						track_alias: header.track_alias,
						group: header.group,
						priority: header.priority,
					}
					.encode(&mut buf, self.version);
				}
				// Single-object streams write their header with the object.
				_ => {}
			}

			map.insert(
				key,
				PublishData {
					stream: writer,
					group: header.group,
					object: header.id,
					remain: None,
					offset: 0,
				},
			);
		}

		let data = map.get_mut(&key).ok_or(SessionError::NotFound)?;
		let payload_len = payload.len() as u64;

		if payload_offset == 0 {
			// A new object on this stream; group and object must move forward.
			match header.forward {
				ForwardPreference::Track => {
					if header.group < data.group {
						tracing::warn!(?header, "group must not decrease on a track stream");
						return Err(SessionError::InvalidObject);
					}
					if header.group == data.group && !object_advances(&header, data) {
						tracing::warn!(?header, "object id must increase within a group");
						return Err(SessionError::InvalidObject);
					}
				}
				ForwardPreference::Group => {
					if !object_advances(&header, data) {
						tracing::warn!(?header, "object id must increase within a group");
						return Err(SessionError::InvalidObject);
					}
				}
				_ => {}
			}

			data.group = header.group;
			data.object = header.id;

			let multi = matches!(header.forward, ForwardPreference::Track | ForwardPreference::Group);
			let length = match (header.length, multi) {
				(Some(length), _) => Some(length),
				(None, true) if eom => Some(payload_len),
				(None, true) => {
					tracing::warn!(?header, "multi-object streams require a length");
					return Err(SessionError::InvalidObject);
				}
				(None, false) => None,
			};
			data.remain = length;

			match header.forward {
				ForwardPreference::Track => TrackObject {
					group: header.group,
					id: header.id,
					length: length.unwrap_or(0),
					status: header.status,
				}
				.encode(&mut buf, self.version),
				ForwardPreference::Group => GroupObject {
					id: header.id,
					length: length.unwrap_or(0),
					status: header.status,
				}
				.encode(&mut buf, self.version),
				ForwardPreference::Object => {
					FrameType::ObjectStream.encode(&mut buf, self.version);
					header.encode(&mut buf, self.version);
				}
				_ => {}
			}
		}

		if let Some(remain) = data.remain {
			if payload_len > remain {
				tracing::warn!(?header, remain, "payload exceeds the advertised length");
				return Err(SessionError::WrongSize);
			}
		}

		buf.extend_from_slice(&payload);
		let mut buf = buf.freeze();
		if let Err(err) = data.stream.write_all(&mut buf).await {
			map.remove(&key);
			return Err(err);
		}

		// Single-object streams end with their object; an end-of-group or
		// end-of-track marker ends its stream too.
		let fin = (eom && header.forward == ForwardPreference::Object)
			|| matches!(
				header.status,
				ObjectStatus::EndOfGroup | ObjectStatus::EndOfTrackAndGroup
			);

		if !fin {
			if eom {
				data.offset = 0;
				data.remain = None;
			} else {
				data.offset += payload_len;
				if let Some(remain) = data.remain.as_mut() {
					*remain -= payload_len;
				}
			}
			return Ok(());
		}

		if let Some(mut data) = map.remove(&key) {
			data.stream.finish()?;
		}

		Ok(())
	}

	/// The transport send order for an object; smaller sends first.
	///
	/// Packs subscriber priority, object priority, the group number
	/// (inverted for newest-first delivery), and the object id into one
	/// comparable integer.
	pub fn send_order(&self, header: &ObjectHeader) -> u64 {
		let track = self
			.state
			.lock()
			.unwrap()
			.pub_tracks
			.get(&header.subscribe_id)
			.copied()
			.unwrap_or(PubTrack {
				priority: u8::MAX,
				group_order: GroupOrder::OldestFirst,
				alias: 0,
			});

		let group = header.group & ORDER_ID_MASK;
		let group = match track.group_order {
			GroupOrder::NewestFirst => ORDER_ID_MASK - group,
			_ => group,
		};
		let object = header.id & ORDER_ID_MASK;

		((track.priority as u64) << 50) | ((header.priority as u64) << 42) | (group << 21) | object
	}
}

fn object_advances<W: transport::SendStream>(header: &ObjectHeader, data: &PublishData<W>) -> bool {
	header.id > data.object || (header.id == data.object && data.offset == 0)
}
