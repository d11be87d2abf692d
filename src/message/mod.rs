//! Every control message and object header on the wire.
//!
//! Each control message is a struct implementing [Message]; the closed
//! [ControlMessage] union tags them with their [FrameType] for transport.
//! Layouts follow the MoQ transport draft this crate targets (draft-06).

mod announce;
mod goaway;
mod object;
mod param;
mod setup;
mod subscribe;
mod track_status;

pub use announce::*;
pub use goaway::*;
pub use object::*;
pub use param::*;
pub use setup::*;
pub use subscribe::*;
pub use track_status::*;

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode, Version};

/// A 62-bit identifier for a subscription, allocated by the subscriber.
pub type SubscribeId = u64;

/// A 62-bit shorthand for a full track name, chosen by the subscriber.
pub type TrackAlias = u64;

/// The tag identifying each top-level message.
///
/// Values are protocol constants; an unknown tag on ingest is a protocol
/// error, not a crash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum FrameType {
	ObjectStream = 0x0,
	ObjectDatagram = 0x1,
	SubscribeUpdate = 0x2,
	Subscribe = 0x3,
	SubscribeOk = 0x4,
	SubscribeError = 0x5,
	Announce = 0x6,
	AnnounceOk = 0x7,
	AnnounceError = 0x8,
	Unannounce = 0x9,
	Unsubscribe = 0xa,
	SubscribeDone = 0xb,
	AnnounceCancel = 0xc,
	TrackStatusRequest = 0xd,
	TrackStatus = 0xe,
	Goaway = 0x10,
	ClientSetup = 0x40,
	ServerSetup = 0x41,
	StreamHeaderTrack = 0x50,
	StreamHeaderGroup = 0x51,
}

impl Decode for FrameType {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let v = u64::decode(r, version)?;
		Self::try_from(v).map_err(|_| DecodeError::UnknownFrame(v))
	}
}

impl Encode for FrameType {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		u64::from(*self).encode(w, version);
	}
}

/// A single control message, minus its frame type tag.
pub trait Message: Sized + fmt::Debug {
	const ID: u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError>;
	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version);
}

/// A track name, scoped by its namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FullTrackName {
	pub namespace: String,
	pub name: String,
}

impl FullTrackName {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}
}

impl Decode for FullTrackName {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let namespace = String::decode(r, version)?;
		let name = String::decode(r, version)?;
		Ok(Self { namespace, name })
	}
}

impl Encode for FullTrackName {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.namespace.encode(w, version);
		self.name.encode(w, version);
	}
}

impl fmt::Display for FullTrackName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// A position within a track, ordered by group then object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsoluteLocation {
	pub group: u64,
	pub object: u64,
}

impl AbsoluteLocation {
	pub fn new(group: u64, object: u64) -> Self {
		Self { group, object }
	}
}

impl Decode for AbsoluteLocation {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let group = u64::decode(r, version)?;
		let object = u64::decode(r, version)?;
		Ok(Self { group, object })
	}
}

impl Encode for AbsoluteLocation {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.group.encode(w, version);
		self.object.encode(w, version);
	}
}

/// Every control message that can appear on the control stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
	ClientSetup(ClientSetup),
	ServerSetup(ServerSetup),
	Subscribe(Subscribe),
	SubscribeUpdate(SubscribeUpdate),
	SubscribeOk(SubscribeOk),
	SubscribeError(SubscribeError),
	Unsubscribe(Unsubscribe),
	SubscribeDone(SubscribeDone),
	Announce(Announce),
	AnnounceOk(AnnounceOk),
	AnnounceError(AnnounceError),
	Unannounce(Unannounce),
	AnnounceCancel(AnnounceCancel),
	TrackStatusRequest(TrackStatusRequest),
	TrackStatus(TrackStatus),
	Goaway(Goaway),
}

impl Decode for ControlMessage {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let kind = u64::decode(r, version)?;

		match kind {
			ClientSetup::ID => Ok(Self::ClientSetup(ClientSetup::decode_msg(r, version)?)),
			ServerSetup::ID => Ok(Self::ServerSetup(ServerSetup::decode_msg(r, version)?)),
			Subscribe::ID => Ok(Self::Subscribe(Subscribe::decode_msg(r, version)?)),
			SubscribeUpdate::ID => Ok(Self::SubscribeUpdate(SubscribeUpdate::decode_msg(r, version)?)),
			SubscribeOk::ID => Ok(Self::SubscribeOk(SubscribeOk::decode_msg(r, version)?)),
			SubscribeError::ID => Ok(Self::SubscribeError(SubscribeError::decode_msg(r, version)?)),
			Unsubscribe::ID => Ok(Self::Unsubscribe(Unsubscribe::decode_msg(r, version)?)),
			SubscribeDone::ID => Ok(Self::SubscribeDone(SubscribeDone::decode_msg(r, version)?)),
			Announce::ID => Ok(Self::Announce(Announce::decode_msg(r, version)?)),
			AnnounceOk::ID => Ok(Self::AnnounceOk(AnnounceOk::decode_msg(r, version)?)),
			AnnounceError::ID => Ok(Self::AnnounceError(AnnounceError::decode_msg(r, version)?)),
			Unannounce::ID => Ok(Self::Unannounce(Unannounce::decode_msg(r, version)?)),
			AnnounceCancel::ID => Ok(Self::AnnounceCancel(AnnounceCancel::decode_msg(r, version)?)),
			TrackStatusRequest::ID => Ok(Self::TrackStatusRequest(TrackStatusRequest::decode_msg(r, version)?)),
			TrackStatus::ID => Ok(Self::TrackStatus(TrackStatus::decode_msg(r, version)?)),
			Goaway::ID => Ok(Self::Goaway(Goaway::decode_msg(r, version)?)),
			_ => Err(DecodeError::UnknownFrame(kind)),
		}
	}
}

impl Encode for ControlMessage {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		match self {
			Self::ClientSetup(m) => Self::encode_one(m, w, version),
			Self::ServerSetup(m) => Self::encode_one(m, w, version),
			Self::Subscribe(m) => Self::encode_one(m, w, version),
			Self::SubscribeUpdate(m) => Self::encode_one(m, w, version),
			Self::SubscribeOk(m) => Self::encode_one(m, w, version),
			Self::SubscribeError(m) => Self::encode_one(m, w, version),
			Self::Unsubscribe(m) => Self::encode_one(m, w, version),
			Self::SubscribeDone(m) => Self::encode_one(m, w, version),
			Self::Announce(m) => Self::encode_one(m, w, version),
			Self::AnnounceOk(m) => Self::encode_one(m, w, version),
			Self::AnnounceError(m) => Self::encode_one(m, w, version),
			Self::Unannounce(m) => Self::encode_one(m, w, version),
			Self::AnnounceCancel(m) => Self::encode_one(m, w, version),
			Self::TrackStatusRequest(m) => Self::encode_one(m, w, version),
			Self::TrackStatus(m) => Self::encode_one(m, w, version),
			Self::Goaway(m) => Self::encode_one(m, w, version),
		}
	}
}

impl ControlMessage {
	fn encode_one<T: Message, W: bytes::BufMut>(msg: &T, w: &mut W, version: Version) {
		T::ID.encode(w, version);
		msg.encode_msg(w, version);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unknown_frame_type() {
		let mut buf: &[u8] = &[0x42, 0x00];
		let err = ControlMessage::decode(&mut buf, VERSION_CURRENT).unwrap_err();
		assert!(matches!(err, DecodeError::UnknownFrame(0x42)));
	}

	#[test]
	fn test_data_frame_on_control_stream() {
		// OBJECT_STREAM is a data frame; it has no place on the control stream.
		let mut buf: &[u8] = &[0x00, 0x01, 0x01, 0x05, 0x00, 0x80, 0x00];
		let err = ControlMessage::decode(&mut buf, VERSION_CURRENT).unwrap_err();
		assert!(matches!(err, DecodeError::UnknownFrame(0x0)));
	}
}
