//! The subscriber half: the subscribe lifecycle plus ingest of data streams
//! and datagrams into per-subscription queues.

use std::sync::Arc;

use bytes::{Buf, Bytes};
use tokio::sync::oneshot;

use crate::coding::{Decode, Reader};
use crate::message::{
	ControlMessage, ForwardPreference, FrameType, GroupHeader, GroupObject, ObjectHeader, ObjectStatus, Subscribe,
	SubscribeDone, SubscribeError, SubscribeErrorCode, SubscribeId, SubscribeOk, TrackHeader, TrackObject,
	Unsubscribe,
};
use crate::model::{produce_object, produce_track, ObjectConsumer, ObjectProducer, TrackConsumer};
use crate::{transport, SessionError};

use super::{PendingSubscribe, Session, SubscribeState};

// Cap on a single payload chunk handed to the application.
const MAX_CHUNK: usize = 32 * 1024;

// Local failures mirror what the peer would send, so callers see one type.
fn local_error(subscribe_id: SubscribeId, reason: &str) -> SubscribeError {
	SubscribeError {
		subscribe_id,
		error_code: SubscribeErrorCode::Unknown(500),
		reason: reason.to_string(),
		retry_alias: None,
	}
}

impl<S: transport::Session> Session<S> {
	/// Request a track from the peer.
	///
	/// The subscribe ID and track alias are allocated by the session.
	/// Resolves once the peer accepts or rejects; local failures surface as
	/// a synthesized [SubscribeError].
	pub async fn subscribe(&self, mut msg: Subscribe) -> Result<TrackConsumer, SubscribeError> {
		let (producer, objects) = produce_track();
		let (ok_tx, ok_rx) = oneshot::channel();

		{
			let mut state = self.state.lock().unwrap();
			if state.closed.is_some() {
				return Err(local_error(0, "session closed"));
			}
			if state.draining {
				return Err(local_error(0, "going away"));
			}

			msg.subscribe_id = state.next_subscribe_id;
			state.next_subscribe_id += 1;
			msg.track_alias = msg.subscribe_id;

			state.subscribes.insert(
				msg.subscribe_id,
				SubscribeState {
					track: msg.track.clone(),
					track_alias: msg.track_alias,
					producer,
					pending: Some(PendingSubscribe {
						ok: ok_tx,
						objects,
					}),
				},
			);
		}

		let id = msg.subscribe_id;
		tracing::info!(id, track = %msg.track, "subscribing");

		if self.control.send(ControlMessage::Subscribe(msg)).is_err() {
			self.state.lock().unwrap().subscribes.remove(&id);
			return Err(local_error(id, "session closed"));
		}

		match ok_rx.await {
			Ok(res) => res,
			Err(_) => Err(local_error(id, "session closed")),
		}
	}

	/// Stop a subscription; its object queue ends immediately.
	pub fn unsubscribe(&self, subscribe_id: SubscribeId) -> Result<(), SessionError> {
		if self.state.lock().unwrap().subscribes.remove(&subscribe_id).is_none() {
			return Err(SessionError::NotFound);
		}

		tracing::info!(id = subscribe_id, "unsubscribing");
		self.control
			.send(ControlMessage::Unsubscribe(Unsubscribe { subscribe_id }))
	}

	pub(super) fn recv_subscribe_ok(&self, msg: SubscribeOk) -> Result<(), SessionError> {
		let expires = msg.expires;
		let subscribe_id = msg.subscribe_id;

		{
			let mut state = self.state.lock().unwrap();
			let Some(sub) = state.subscribes.get_mut(&subscribe_id) else {
				tracing::warn!(id = subscribe_id, "subscribe ok for unknown subscription");
				return Ok(());
			};

			let Some(pending) = sub.pending.take() else {
				tracing::warn!(id = subscribe_id, "duplicate subscribe ok");
				return Ok(());
			};

			let consumer = TrackConsumer::new(
				sub.track.clone(),
				subscribe_id,
				sub.track_alias,
				msg.group_order,
				msg.latest,
				pending.objects,
			);
			let _ = pending.ok.send(Ok(consumer));
		}

		// A bounded grant expires locally unless renewed in time.
		if !expires.is_zero() {
			let this = self.clone();
			tokio::spawn(async move {
				tokio::time::sleep(expires).await;
				this.expire(subscribe_id);
			});
		}

		Ok(())
	}

	fn expire(&self, subscribe_id: SubscribeId) {
		if self.state.lock().unwrap().subscribes.remove(&subscribe_id).is_some() {
			tracing::debug!(id = subscribe_id, "subscription expired");
			let _ = self
				.control
				.send(ControlMessage::Unsubscribe(Unsubscribe { subscribe_id }));
		}
	}

	pub(super) fn recv_subscribe_error(&self, msg: SubscribeError) -> Result<(), SessionError> {
		let mut state = self.state.lock().unwrap();
		let Some(sub) = state.subscribes.remove(&msg.subscribe_id) else {
			tracing::warn!(id = msg.subscribe_id, "subscribe error for unknown subscription");
			return Ok(());
		};

		if let Some(pending) = sub.pending {
			let _ = pending.ok.send(Err(msg));
		}

		Ok(())
	}

	pub(super) fn recv_subscribe_done(&self, msg: &SubscribeDone) {
		// Dropping the producer ends the object queue.
		if self.state.lock().unwrap().subscribes.remove(&msg.subscribe_id).is_none() {
			tracing::warn!(id = msg.subscribe_id, "subscribe done for unknown subscription");
		}
	}

	/// Accept incoming unidirectional data streams for the session's lifetime.
	pub(super) async fn run_uni_streams(self) -> Result<(), SessionError> {
		loop {
			let stream = self
				.webtransport
				.accept_uni()
				.await
				.map_err(|err| SessionError::Transport(Arc::new(err)))?;

			let reader = Reader::new(stream, self.version);
			let this = self.clone();

			tokio::spawn(async move {
				if let Err(err) = this.run_uni_stream(reader).await {
					tracing::debug!(%err, "data stream failed");
				}
			});
		}
	}

	async fn run_uni_stream(self, mut reader: Reader<S::RecvStream>) -> Result<(), SessionError> {
		let res = self.recv_data_stream(&mut reader).await;
		if let Err(err) = &res {
			reader.stop(err);
		}
		res
	}

	async fn recv_data_stream(&self, reader: &mut Reader<S::RecvStream>) -> Result<(), SessionError> {
		match reader.decode_peek().await? {
			FrameType::ObjectStream => self.recv_object_stream(reader).await,
			FrameType::StreamHeaderTrack => self.recv_track_stream(reader).await,
			FrameType::StreamHeaderGroup => self.recv_group_stream(reader).await,
			_ => Err(SessionError::UnexpectedStream),
		}
	}

	async fn recv_object_stream(&self, reader: &mut Reader<S::RecvStream>) -> Result<(), SessionError> {
		let _ = reader.decode::<FrameType>().await?;
		let header: ObjectHeader = reader.decode().await?;
		tracing::trace!(?header, "received object stream");

		let (producer, consumer) = produce_object(header.clone());
		self.deliver(header.subscribe_id, consumer)?;

		if header.status != ObjectStatus::Normal {
			// Status markers carry no payload.
			return Ok(());
		}

		// The payload runs until FIN.
		loop {
			match reader.read(MAX_CHUNK).await {
				Ok(Some(chunk)) => producer.write(chunk).await,
				Ok(None) => return Ok(()),
				Err(err) => {
					producer.abort(err.clone()).await;
					return Err(err);
				}
			}
		}
	}

	async fn recv_track_stream(&self, reader: &mut Reader<S::RecvStream>) -> Result<(), SessionError> {
		let _ = reader.decode::<FrameType>().await?;
		let header: TrackHeader = reader.decode().await?;
		tracing::trace!(?header, "received track stream");

		while let Some(object) = reader.decode_maybe::<TrackObject>().await? {
			let full = ObjectHeader {
				subscribe_id: header.subscribe_id,
				track_alias: header.track_alias,
				group: object.group,
				id: object.id,
				priority: header.priority,
				forward: ForwardPreference::Track,
				status: object.status,
				length: Some(object.length),
			};

			let (producer, consumer) = produce_object(full);
			self.deliver(header.subscribe_id, consumer)?;
			self.recv_payload(reader, &producer, object.length).await?;
		}

		Ok(())
	}

	async fn recv_group_stream(&self, reader: &mut Reader<S::RecvStream>) -> Result<(), SessionError> {
		let _ = reader.decode::<FrameType>().await?;
		let header: GroupHeader = reader.decode().await?;
		tracing::trace!(?header, "received group stream");

		while let Some(object) = reader.decode_maybe::<GroupObject>().await? {
			let full = ObjectHeader {
				subscribe_id: header.subscribe_id,
				track_alias: header.track_alias,
				group: header.group,
				id: object.id,
				priority: header.priority,
				forward: ForwardPreference::Group,
				status: object.status,
				length: Some(object.length),
			};

			let (producer, consumer) = produce_object(full);
			self.deliver(header.subscribe_id, consumer)?;
			self.recv_payload(reader, &producer, object.length).await?;
		}

		Ok(())
	}

	/// Stream exactly `length` payload bytes into the object queue.
	async fn recv_payload(
		&self,
		reader: &mut Reader<S::RecvStream>,
		producer: &ObjectProducer,
		length: u64,
	) -> Result<(), SessionError> {
		let mut remain = length;

		while remain > 0 {
			let max = remain.min(MAX_CHUNK as u64) as usize;
			match reader.read(max).await {
				Ok(Some(chunk)) => {
					remain -= chunk.len() as u64;
					producer.write(chunk).await;
				}
				// FIN before the advertised length is a framing violation.
				Ok(None) => {
					producer.abort(SessionError::WrongSize).await;
					return Err(SessionError::WrongSize);
				}
				Err(err) => {
					producer.abort(err.clone()).await;
					return Err(err);
				}
			}
		}

		Ok(())
	}

	/// Accept incoming datagrams for the session's lifetime.
	pub(super) async fn run_datagrams(self) -> Result<(), SessionError> {
		loop {
			let mut payload = self
				.webtransport
				.recv_datagram()
				.await
				.map_err(|err| SessionError::Transport(Arc::new(err)))?;

			if let Err(err) = self.recv_object_datagram(&mut payload).await {
				tracing::warn!(%err, "dropping datagram");
			}
		}
	}

	async fn recv_object_datagram(&self, payload: &mut Bytes) -> Result<(), SessionError> {
		let kind = FrameType::decode(payload, self.version)?;
		if kind != FrameType::ObjectDatagram {
			return Err(SessionError::UnexpectedStream);
		}

		let mut header = ObjectHeader::decode(payload, self.version)?;
		header.forward = ForwardPreference::Datagram;
		tracing::trace!(?header, "received object datagram");

		let rest = payload.copy_to_bytes(payload.remaining());

		let (producer, consumer) = produce_object(header.clone());
		self.deliver(header.subscribe_id, consumer)?;

		if header.status == ObjectStatus::Normal && !rest.is_empty() {
			producer.write(rest).await;
		}

		Ok(())
	}

	fn deliver(&self, subscribe_id: SubscribeId, object: ObjectConsumer) -> Result<(), SessionError> {
		let state = self.state.lock().unwrap();
		let Some(sub) = state.subscribes.get(&subscribe_id) else {
			return Err(SessionError::NotFound);
		};

		sub.producer.deliver(object);
		Ok(())
	}
}
