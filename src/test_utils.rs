//! An in-memory transport pair for exercising sessions without a network.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

use crate::transport;

#[derive(Debug, Clone, Error)]
pub enum MemError {
	#[error("connection closed: code={0}")]
	Closed(u32),

	#[error("stream reset: code={0}")]
	Reset(u32),
}

enum Frame {
	Data(Bytes),
	Fin,
	Reset(u32),
}

/// Create a connected unidirectional pipe.
pub fn stream_pair() -> (MemSendStream, MemRecvStream) {
	let (tx, rx) = mpsc::unbounded_channel();
	(
		MemSendStream { tx: Some(tx) },
		MemRecvStream {
			rx,
			buffer: Bytes::new(),
			fin: false,
		},
	)
}

pub struct MemSendStream {
	tx: Option<mpsc::UnboundedSender<Frame>>,
}

impl transport::SendStream for MemSendStream {
	type Error = MemError;

	async fn write_buf<B: Buf + Send>(&mut self, buf: &mut B) -> Result<usize, MemError> {
		let n = buf.remaining();
		if n == 0 {
			return Ok(0);
		}

		let data = buf.copy_to_bytes(n);
		let tx = self.tx.as_ref().ok_or(MemError::Closed(0))?;
		tx.send(Frame::Data(data)).map_err(|_| MemError::Closed(0))?;
		Ok(n)
	}

	fn finish(&mut self) -> Result<(), MemError> {
		let tx = self.tx.take().ok_or(MemError::Closed(0))?;
		tx.send(Frame::Fin).map_err(|_| MemError::Closed(0))
	}

	fn reset(&mut self, code: u32) {
		if let Some(tx) = self.tx.take() {
			let _ = tx.send(Frame::Reset(code));
		}
	}

	fn set_priority(&mut self, _order: i64) {}
}

pub struct MemRecvStream {
	rx: mpsc::UnboundedReceiver<Frame>,
	buffer: Bytes,
	fin: bool,
}

impl MemRecvStream {
	async fn next_chunk(&mut self) -> Result<Option<Bytes>, MemError> {
		if !self.buffer.is_empty() {
			return Ok(Some(std::mem::take(&mut self.buffer)));
		}

		if self.fin {
			return Ok(None);
		}

		loop {
			match self.rx.recv().await {
				Some(Frame::Data(data)) if data.is_empty() => continue,
				Some(Frame::Data(data)) => return Ok(Some(data)),
				Some(Frame::Fin) | None => {
					self.fin = true;
					return Ok(None);
				}
				Some(Frame::Reset(code)) => return Err(MemError::Reset(code)),
			}
		}
	}
}

impl transport::RecvStream for MemRecvStream {
	type Error = MemError;

	async fn read_buf<B: BufMut + Send>(&mut self, buf: &mut B) -> Result<Option<usize>, MemError> {
		let chunk = match self.next_chunk().await? {
			Some(chunk) => chunk,
			None => return Ok(None),
		};

		let n = chunk.len().min(buf.remaining_mut());
		buf.put_slice(&chunk[..n]);
		if n < chunk.len() {
			self.buffer = chunk.slice(n..);
		}

		Ok(Some(n))
	}

	async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, MemError> {
		let chunk = match self.next_chunk().await? {
			Some(chunk) => chunk,
			None => return Ok(None),
		};

		if chunk.len() > max {
			self.buffer = chunk.slice(max..);
			return Ok(Some(chunk.slice(..max)));
		}

		Ok(Some(chunk))
	}

	fn stop(&mut self, _code: u32) {
		self.rx.close();
	}
}

struct MemInner {
	uni_tx: mpsc::UnboundedSender<MemRecvStream>,
	uni_rx: Mutex<mpsc::UnboundedReceiver<MemRecvStream>>,

	bi_tx: mpsc::UnboundedSender<(MemSendStream, MemRecvStream)>,
	bi_rx: Mutex<mpsc::UnboundedReceiver<(MemSendStream, MemRecvStream)>>,

	dgram_tx: mpsc::UnboundedSender<Bytes>,
	dgram_rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,

	// Shared between both endpoints; whoever closes first wins.
	closed_tx: Arc<watch::Sender<Option<MemError>>>,
	closed_rx: watch::Receiver<Option<MemError>>,
}

/// One endpoint of an in-memory connection.
#[derive(Clone)]
pub struct MemSession {
	inner: Arc<MemInner>,
}

impl MemSession {
	/// Create a connected pair of endpoints.
	pub fn pair() -> (MemSession, MemSession) {
		let (a_uni_tx, b_uni_rx) = mpsc::unbounded_channel();
		let (b_uni_tx, a_uni_rx) = mpsc::unbounded_channel();
		let (a_bi_tx, b_bi_rx) = mpsc::unbounded_channel();
		let (b_bi_tx, a_bi_rx) = mpsc::unbounded_channel();
		let (a_dgram_tx, b_dgram_rx) = mpsc::unbounded_channel();
		let (b_dgram_tx, a_dgram_rx) = mpsc::unbounded_channel();

		let (closed_tx, closed_rx) = watch::channel(None);
		let closed_tx = Arc::new(closed_tx);

		let a = MemSession {
			inner: Arc::new(MemInner {
				uni_tx: a_uni_tx,
				uni_rx: Mutex::new(a_uni_rx),
				bi_tx: a_bi_tx,
				bi_rx: Mutex::new(a_bi_rx),
				dgram_tx: a_dgram_tx,
				dgram_rx: Mutex::new(a_dgram_rx),
				closed_tx: closed_tx.clone(),
				closed_rx: closed_rx.clone(),
			}),
		};

		let b = MemSession {
			inner: Arc::new(MemInner {
				uni_tx: b_uni_tx,
				uni_rx: Mutex::new(b_uni_rx),
				bi_tx: b_bi_tx,
				bi_rx: Mutex::new(b_bi_rx),
				dgram_tx: b_dgram_tx,
				dgram_rx: Mutex::new(b_dgram_rx),
				closed_tx,
				closed_rx,
			}),
		};

		(a, b)
	}

	fn check_closed(&self) -> Result<(), MemError> {
		match self.inner.closed_rx.borrow().clone() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	async fn wait_closed(&self) -> MemError {
		let mut rx = self.inner.closed_rx.clone();
		loop {
			if let Some(err) = rx.borrow_and_update().clone() {
				return err;
			}

			if rx.changed().await.is_err() {
				return MemError::Closed(0);
			}
		}
	}
}

impl transport::Session for MemSession {
	type SendStream = MemSendStream;
	type RecvStream = MemRecvStream;
	type Error = MemError;

	async fn open_bi(&self) -> Result<(MemSendStream, MemRecvStream), MemError> {
		self.check_closed()?;

		let (local_send, remote_recv) = stream_pair();
		let (remote_send, local_recv) = stream_pair();

		self.inner
			.bi_tx
			.send((remote_send, remote_recv))
			.map_err(|_| MemError::Closed(0))?;

		Ok((local_send, local_recv))
	}

	async fn accept_bi(&self) -> Result<(MemSendStream, MemRecvStream), MemError> {
		let mut rx = self.inner.bi_rx.lock().await;
		tokio::select! {
			stream = rx.recv() => stream.ok_or(MemError::Closed(0)),
			err = self.wait_closed() => Err(err),
		}
	}

	async fn open_uni(&self) -> Result<MemSendStream, MemError> {
		self.check_closed()?;

		let (send, recv) = stream_pair();
		self.inner.uni_tx.send(recv).map_err(|_| MemError::Closed(0))?;

		Ok(send)
	}

	async fn accept_uni(&self) -> Result<MemRecvStream, MemError> {
		let mut rx = self.inner.uni_rx.lock().await;
		tokio::select! {
			stream = rx.recv() => stream.ok_or(MemError::Closed(0)),
			err = self.wait_closed() => Err(err),
		}
	}

	fn send_datagram(&self, payload: Bytes) -> Result<(), MemError> {
		self.check_closed()?;
		self.inner.dgram_tx.send(payload).map_err(|_| MemError::Closed(0))
	}

	async fn recv_datagram(&self) -> Result<Bytes, MemError> {
		let mut rx = self.inner.dgram_rx.lock().await;
		tokio::select! {
			payload = rx.recv() => payload.ok_or(MemError::Closed(0)),
			err = self.wait_closed() => Err(err),
		}
	}

	fn close(&self, code: u32, _reason: &str) {
		self.inner.closed_tx.send_if_modified(|state| {
			if state.is_none() {
				*state = Some(MemError::Closed(code));
				true
			} else {
				false
			}
		});
	}

	async fn closed(&self) -> MemError {
		self.wait_closed().await
	}
}
