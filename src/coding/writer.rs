use std::{fmt::Debug, sync::Arc};

use bytes::BytesMut;

use crate::{
	coding::{Encode, Version},
	transport, SessionError,
};

/// A writer that encodes messages to a stream.
///
/// The stream is aborted on drop unless it was cleanly finished first.
pub struct Writer<S: transport::SendStream> {
	stream: Option<S>,
	buffer: BytesMut,
	version: Version,
}

impl<S: transport::SendStream> Writer<S> {
	pub fn new(stream: S, version: Version) -> Self {
		Self {
			stream: Some(stream),
			buffer: Default::default(),
			version,
		}
	}

	/// Encode the given message to the stream.
	pub async fn encode<T: Encode + Debug>(&mut self, msg: &T) -> Result<(), SessionError> {
		self.buffer.clear();
		msg.encode(&mut self.buffer, self.version);

		while !self.buffer.is_empty() {
			self.stream
				.as_mut()
				.ok_or(SessionError::Closed)?
				.write_buf(&mut self.buffer)
				.await
				.map_err(|e| SessionError::Transport(Arc::new(e)))?;
		}

		Ok(())
	}

	/// Write the entire [bytes::Buf] to the stream.
	///
	/// NOTE: This can avoid performing a copy when using [bytes::Bytes].
	pub async fn write_all<B: bytes::Buf + Send>(&mut self, buf: &mut B) -> Result<(), SessionError> {
		while buf.has_remaining() {
			self.stream
				.as_mut()
				.ok_or(SessionError::Closed)?
				.write_buf(buf)
				.await
				.map_err(|e| SessionError::Transport(Arc::new(e)))?;
		}
		Ok(())
	}

	/// Mark the stream as finished.
	///
	/// The stream is released, so dropping the writer no longer aborts it.
	pub fn finish(&mut self) -> Result<(), SessionError> {
		let mut stream = self.stream.take().ok_or(SessionError::Closed)?;
		stream
			.finish()
			.map_err(|e| SessionError::Transport(Arc::new(e)))
	}

	/// Abort the stream with the given error.
	pub fn abort(&mut self, err: &SessionError) {
		if let Some(stream) = self.stream.as_mut() {
			stream.reset(err.to_code());
		}
	}

	/// Hint the relative send order to the transport scheduler.
	pub fn set_priority(&mut self, order: i64) {
		if let Some(stream) = self.stream.as_mut() {
			stream.set_priority(order);
		}
	}

	/// Cast the writer to a different version, used during version negotiation.
	pub fn with_version(mut self, version: Version) -> Self {
		Self {
			// Taken out so Drop doesn't reset the stream we hand over.
			stream: self.stream.take(),
			buffer: std::mem::take(&mut self.buffer),
			version,
		}
	}
}

impl<S: transport::SendStream> Drop for Writer<S> {
	fn drop(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			// Abort the stream rather than leaving it dangling.
			stream.reset(SessionError::Cancel.to_code());
		}
	}
}
