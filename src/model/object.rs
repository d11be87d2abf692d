use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::message::{ObjectHeader, ObjectStatus};
use crate::SessionError;

// Payload chunks buffered per object before backpressure applies to the
// data stream feeding it.
const CHUNK_QUEUE: usize = 32;

/// A single object delivered by a subscription.
///
/// The payload arrives as a bounded stream of chunks ending with an explicit
/// end marker; a failed data stream surfaces here as an error.
pub struct ObjectConsumer {
	pub header: ObjectHeader,
	rx: mpsc::Receiver<Result<Bytes, SessionError>>,
}

impl ObjectConsumer {
	/// Read the next payload chunk, or [None] at the end of the payload.
	pub async fn read_chunk(&mut self) -> Result<Option<Bytes>, SessionError> {
		match self.rx.recv().await {
			Some(Ok(chunk)) => Ok(Some(chunk)),
			Some(Err(err)) => Err(err),
			None => Ok(None),
		}
	}

	/// Read the entire payload into one buffer.
	///
	/// Status markers have no payload, so this returns empty for them.
	pub async fn payload(&mut self) -> Result<Bytes, SessionError> {
		if self.header.status != ObjectStatus::Normal {
			return Ok(Bytes::new());
		}

		let mut buf = BytesMut::new();
		while let Some(chunk) = self.read_chunk().await? {
			buf.extend_from_slice(&chunk);
		}

		Ok(buf.freeze())
	}
}

/// The session's write half of an object, created per delivered header.
pub(crate) struct ObjectProducer {
	tx: mpsc::Sender<Result<Bytes, SessionError>>,
}

impl ObjectProducer {
	/// Append a payload chunk, waiting for queue space.
	///
	/// A vanished consumer is not an error; the stream keeps draining.
	pub async fn write(&self, chunk: Bytes) {
		let _ = self.tx.send(Ok(chunk)).await;
	}

	/// Terminate the payload with an error instead of the end marker.
	pub async fn abort(&self, err: SessionError) {
		let _ = self.tx.send(Err(err)).await;
	}
}

/// Create the producer/consumer pair for one object.
pub(crate) fn produce_object(header: ObjectHeader) -> (ObjectProducer, ObjectConsumer) {
	let (tx, rx) = mpsc::channel(CHUNK_QUEUE);
	(ObjectProducer { tx }, ObjectConsumer { header, rx })
}
