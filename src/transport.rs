//! The WebTransport-shaped interface the session consumes.
//!
//! The crate never touches QUIC or TLS directly; it drives any connection
//! that can open/accept streams and exchange datagrams. Implement these
//! traits for your WebTransport binding of choice.

use std::future::Future;

use bytes::{Buf, BufMut, Bytes};

/// An established WebTransport-style connection.
///
/// Handles are cheap clones of the same connection.
pub trait Session: Clone + Send + Sync + 'static {
	type SendStream: SendStream;
	type RecvStream: RecvStream;
	type Error: std::error::Error + Send + Sync + 'static;

	/// Open a new bidirectional stream.
	fn open_bi(&self) -> impl Future<Output = Result<(Self::SendStream, Self::RecvStream), Self::Error>> + Send;

	/// Accept a bidirectional stream opened by the peer.
	fn accept_bi(&self) -> impl Future<Output = Result<(Self::SendStream, Self::RecvStream), Self::Error>> + Send;

	/// Open a new unidirectional stream.
	fn open_uni(&self) -> impl Future<Output = Result<Self::SendStream, Self::Error>> + Send;

	/// Accept a unidirectional stream opened by the peer.
	fn accept_uni(&self) -> impl Future<Output = Result<Self::RecvStream, Self::Error>> + Send;

	/// Send an unreliable datagram.
	fn send_datagram(&self, payload: Bytes) -> Result<(), Self::Error>;

	/// Receive the next datagram from the peer.
	fn recv_datagram(&self) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;

	/// Close the connection with an error code and reason.
	fn close(&self, code: u32, reason: &str);

	/// Block until the connection is closed, returning the error.
	fn closed(&self) -> impl Future<Output = Self::Error> + Send;
}

/// The write half of a stream.
pub trait SendStream: Send + 'static {
	type Error: std::error::Error + Send + Sync + 'static;

	/// Write some data from the buffer, advancing it by the amount written.
	///
	/// Completion respects transport backpressure.
	fn write_buf<B: Buf + Send>(&mut self, buf: &mut B) -> impl Future<Output = Result<usize, Self::Error>> + Send;

	/// Cleanly terminate the stream (FIN).
	fn finish(&mut self) -> Result<(), Self::Error>;

	/// Abruptly terminate the stream with an error code.
	fn reset(&mut self, code: u32);

	/// Hint the relative send order to the transport scheduler; lower is sent first.
	fn set_priority(&mut self, order: i64);
}

/// The read half of a stream.
pub trait RecvStream: Send + 'static {
	type Error: std::error::Error + Send + Sync + 'static;

	/// Read some data into the buffer, returning the amount read.
	///
	/// Returns [None] at the end of the stream (FIN).
	fn read_buf<B: BufMut + Send>(
		&mut self,
		buf: &mut B,
	) -> impl Future<Output = Result<Option<usize>, Self::Error>> + Send;

	/// Read the next chunk of data, up to `max` bytes, without copying when possible.
	///
	/// Returns [None] at the end of the stream (FIN).
	fn read_chunk(&mut self, max: usize) -> impl Future<Output = Result<Option<Bytes>, Self::Error>> + Send;

	/// Tell the peer to stop sending with an error code.
	fn stop(&mut self, code: u32);
}
