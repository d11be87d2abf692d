use std::{cmp, fmt::Debug, io, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};

use crate::{
	coding::{Decode, DecodeError, Version},
	transport, SessionError,
};

/// A reader for decoding messages from a stream.
///
/// Bytes are buffered incrementally: a decode attempt that comes up short is
/// retried once more data arrives, so messages can be fed in arbitrary
/// chunks and the reader resynchronizes on message boundaries by itself.
pub struct Reader<S: transport::RecvStream> {
	stream: S,
	buffer: BytesMut,
	version: Version,
}

impl<S: transport::RecvStream> Reader<S> {
	pub fn new(stream: S, version: Version) -> Self {
		Self {
			stream,
			buffer: Default::default(),
			version,
		}
	}

	/// Decode the next message from the stream.
	pub async fn decode<T: Decode + Debug>(&mut self) -> Result<T, SessionError> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match T::decode(&mut cursor, self.version) {
				Ok(msg) => {
					self.buffer.advance(cursor.position() as usize);
					return Ok(msg);
				}
				Err(DecodeError::Short) => {
					// Try to read more data
					if self
						.stream
						.read_buf(&mut self.buffer)
						.await
						.map_err(|e| SessionError::Transport(Arc::new(e)))?
						.is_none()
					{
						// Stream closed while we still need more data
						return Err(SessionError::Decode(DecodeError::Short));
					}
				}
				Err(e) => return Err(SessionError::Decode(e)),
			}
		}
	}

	/// Decode the next message unless the stream is closed.
	pub async fn decode_maybe<T: Decode + Debug>(&mut self) -> Result<Option<T>, SessionError> {
		match self.closed().await {
			Ok(()) => Ok(None),
			Err(SessionError::Decode(DecodeError::ExpectedEnd)) => Ok(Some(self.decode().await?)),
			Err(e) => Err(e),
		}
	}

	/// Decode the next message from the stream without consuming it.
	pub async fn decode_peek<T: Decode + Debug>(&mut self) -> Result<T, SessionError> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match T::decode(&mut cursor, self.version) {
				Ok(msg) => return Ok(msg),
				Err(DecodeError::Short) => {
					// Try to read more data
					if self
						.stream
						.read_buf(&mut self.buffer)
						.await
						.map_err(|e| SessionError::Transport(Arc::new(e)))?
						.is_none()
					{
						// Stream closed while we still need more data
						return Err(SessionError::Decode(DecodeError::Short));
					}
				}
				Err(e) => return Err(SessionError::Decode(e)),
			}
		}
	}

	/// Returns a non-zero chunk of data, or None if the stream is closed
	pub async fn read(&mut self, max: usize) -> Result<Option<Bytes>, SessionError> {
		if !self.buffer.is_empty() {
			let size = cmp::min(max, self.buffer.len());
			let data = self.buffer.split_to(size).freeze();
			return Ok(Some(data));
		}

		self.stream
			.read_chunk(max)
			.await
			.map_err(|e| SessionError::Transport(Arc::new(e)))
	}

	/// Wait until the stream is closed, erroring if there are any additional bytes.
	pub async fn closed(&mut self) -> Result<(), SessionError> {
		if self.buffer.is_empty()
			&& self
				.stream
				.read_buf(&mut self.buffer)
				.await
				.map_err(|e| SessionError::Transport(Arc::new(e)))?
				.is_none()
		{
			return Ok(());
		}

		Err(SessionError::Decode(DecodeError::ExpectedEnd))
	}

	/// Abort the stream with the given error.
	pub fn stop(&mut self, err: &SessionError) {
		self.stream.stop(err.to_code());
	}

	/// Cast the reader to a different version, used during version negotiation.
	pub fn with_version(self, version: Version) -> Self {
		Self { version, ..self }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::{ControlMessage, SubscribeOk, VERSION_CURRENT};
	use crate::test_utils::stream_pair;
	use crate::transport::SendStream;

	#[tokio::test]
	async fn test_decode_across_chunks() {
		let (mut send, recv) = stream_pair();
		let mut reader = Reader::new(recv, VERSION_CURRENT);

		// SUBSCRIBE_OK{sub=7, expires=250ms, order=OldestFirst, latest=(42,3)}
		// fed one byte at a time, preceded by its frame type tag.
		let wire = [0x04u8, 0x07, 0x40, 0xfa, 0x01, 0x01, 0x2a, 0x03, 0x00];
		let feeder = tokio::spawn(async move {
			for byte in wire {
				send.write_buf(&mut &[byte][..]).await.unwrap();
				tokio::task::yield_now().await;
			}
			send.finish().unwrap();
		});

		let msg: ControlMessage = reader.decode().await.unwrap();
		match msg {
			ControlMessage::SubscribeOk(SubscribeOk { subscribe_id, .. }) => {
				assert_eq!(subscribe_id, 7)
			}
			other => panic!("unexpected message: {:?}", other),
		}

		assert!(reader.decode_maybe::<ControlMessage>().await.unwrap().is_none());
		feeder.await.unwrap();
	}

	#[tokio::test]
	async fn test_truncated_message_fails_at_fin() {
		let (mut send, recv) = stream_pair();
		let mut reader = Reader::new(recv, VERSION_CURRENT);

		// A SUBSCRIBE_OK tag followed by only part of the message.
		send.write_buf(&mut &[0x04u8, 0x07, 0x40][..]).await.unwrap();
		send.finish().unwrap();

		let err = reader.decode::<ControlMessage>().await.unwrap_err();
		assert!(matches!(err, SessionError::Decode(DecodeError::Short)));
	}
}
