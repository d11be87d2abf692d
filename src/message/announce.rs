use std::fmt;

use crate::coding::{Decode, DecodeError, Encode, Version};
use crate::message::{FrameType, Message, Parameters};

/// Sent by the publisher to offer a namespace to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announce {
	pub namespace: String,
	pub params: Parameters,
}

impl Message for Announce {
	const ID: u64 = FrameType::Announce as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let namespace = String::decode(r, version)?;
		let params = Parameters::decode(r, version)?;

		Ok(Self { namespace, params })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.namespace.encode(w, version);
		self.params.encode(w, version);
	}
}

/// Sent by the subscriber to accept an announced namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceOk {
	pub namespace: String,
}

impl Message for AnnounceOk {
	const ID: u64 = FrameType::AnnounceOk as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let namespace = String::decode(r, version)?;
		Ok(Self { namespace })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.namespace.encode(w, version);
	}
}

/// Sent by the subscriber to reject an announced namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceError {
	pub namespace: String,
	pub error_code: u64,
	pub reason: String,
}

impl Message for AnnounceError {
	const ID: u64 = FrameType::AnnounceError as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let namespace = String::decode(r, version)?;
		let error_code = u64::decode(r, version)?;
		let reason = String::decode(r, version)?;

		Ok(Self {
			namespace,
			error_code,
			reason,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.namespace.encode(w, version);
		self.error_code.encode(w, version);
		self.reason.encode(w, version);
	}
}

impl fmt::Display for AnnounceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "announce error {}: {}", self.error_code, self.reason)
	}
}

impl std::error::Error for AnnounceError {}

/// Sent by the publisher to withdraw a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unannounce {
	pub namespace: String,
}

impl Message for Unannounce {
	const ID: u64 = FrameType::Unannounce as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let namespace = String::decode(r, version)?;
		Ok(Self { namespace })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.namespace.encode(w, version);
	}
}

/// Sent by the subscriber to revoke a previously accepted namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceCancel {
	pub namespace: String,
	pub error_code: u64,
	pub reason: String,
}

impl Message for AnnounceCancel {
	const ID: u64 = FrameType::AnnounceCancel as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let namespace = String::decode(r, version)?;
		let error_code = u64::decode(r, version)?;
		let reason = String::decode(r, version)?;

		Ok(Self {
			namespace,
			error_code,
			reason,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.namespace.encode(w, version);
		self.error_code.encode(w, version);
		self.reason.encode(w, version);
	}
}
