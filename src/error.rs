use std::sync::Arc;

use thiserror::Error;

use crate::coding::{DecodeError, Versions};

/// A fatal session error.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
	/// The underlying transport failed or was closed by the peer.
	#[error("transport error: {0}")]
	Transport(Arc<dyn std::error::Error + Send + Sync>),

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	/// A message that is not allowed in the current state.
	#[error("unexpected message")]
	UnexpectedMessage,

	/// A data stream that does not start with a known data frame type.
	#[error("unexpected stream")]
	UnexpectedStream,

	#[error("no common version: offered={0:?} supported={1:?}")]
	Version(Versions, Versions),

	/// A subscribe ID or track alias already in use.
	#[error("duplicate id")]
	Duplicate,

	#[error("unknown id")]
	NotFound,

	/// A payload that does not match the advertised length.
	#[error("wrong payload size")]
	WrongSize,

	/// An object header that violates the publish bookkeeping rules.
	#[error("invalid object")]
	InvalidObject,

	#[error("setup timed out")]
	SetupTimeout,

	#[error("session closed")]
	Closed,

	/// The peer sent GOAWAY; no new requests are accepted.
	#[error("going away")]
	GoingAway,

	#[error("subscription expired")]
	Expired,

	#[error("cancelled")]
	Cancel,
}

impl SessionError {
	/// The session-close error code sent over the wire.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Closed => 0x0,
			Self::Transport(_) | Self::Cancel | Self::SetupTimeout | Self::Expired => 0x1,
			Self::Decode(_)
			| Self::UnexpectedMessage
			| Self::UnexpectedStream
			| Self::Version(..)
			| Self::NotFound
			| Self::WrongSize
			| Self::InvalidObject => 0x3,
			Self::Duplicate => 0x4,
			Self::GoingAway => 0x10,
		}
	}
}
