use std::sync::Arc;

use crate::coding::{Reader, Version, Writer};
use crate::{transport, SessionError};

/// A [Writer] and [Reader] pair for a single bidirectional stream.
pub struct Stream<S: transport::Session> {
	pub writer: Writer<S::SendStream>,
	pub reader: Reader<S::RecvStream>,
}

impl<S: transport::Session> Stream<S> {
	/// Open a new stream with the given version.
	pub async fn open(session: &S, version: Version) -> Result<Self, SessionError> {
		let (send, recv) = session
			.open_bi()
			.await
			.map_err(|err| SessionError::Transport(Arc::new(err)))?;

		let writer = Writer::new(send, version);
		let reader = Reader::new(recv, version);

		Ok(Stream { writer, reader })
	}

	/// Accept a new stream with the given version.
	pub async fn accept(session: &S, version: Version) -> Result<Self, SessionError> {
		let (send, recv) = session
			.accept_bi()
			.await
			.map_err(|err| SessionError::Transport(Arc::new(err)))?;

		let writer = Writer::new(send, version);
		let reader = Reader::new(recv, version);

		Ok(Stream { writer, reader })
	}

	/// Cast the stream to a different version, used during version negotiation.
	pub fn with_version(self, version: Version) -> Self {
		Stream {
			writer: self.writer.with_version(version),
			reader: self.reader.with_version(version),
		}
	}
}
