use std::io;

use tokio::sync::mpsc;

use crate::coding::{Encode, Version, Writer};
use crate::message::ControlMessage;
use crate::{transport, SessionError};

/// Fans control messages from any task into the single writer loop.
#[derive(Clone)]
pub(super) struct Control {
	tx: mpsc::UnboundedSender<Vec<u8>>,
	version: Version,
}

impl Control {
	pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>, version: Version) -> Self {
		Self { tx, version }
	}

	pub fn send(&self, msg: ControlMessage) -> Result<(), SessionError> {
		tracing::debug!(message = ?msg, "sending control message");

		let mut buf = Vec::new();
		msg.encode(&mut buf, self.version);
		tracing::trace!(size = buf.len(), hex = %hex::encode(&buf), "encoded control message");

		self.tx.send(buf).map_err(|_| SessionError::Closed)
	}

	/// Drain queued messages onto the control stream, in order.
	pub async fn run<W: transport::SendStream>(
		mut writer: Writer<W>,
		mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
	) -> Result<(), SessionError> {
		while let Some(msg) = rx.recv().await {
			let mut buf = io::Cursor::new(msg);
			writer.write_all(&mut buf).await?;
		}

		Ok(())
	}
}
