use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode, Version};
use crate::message::{SubscribeId, TrackAlias};

/// The delivery state of an object.
///
/// Anything other than [ObjectStatus::Normal] is a marker with no payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum ObjectStatus {
	#[default]
	Normal = 0x0,
	ObjectNotExist = 0x1,
	GroupNotExist = 0x2,
	EndOfGroup = 0x3,
	EndOfTrackAndGroup = 0x4,
}

impl Decode for ObjectStatus {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r, version)?).map_err(|_| DecodeError::InvalidValue)
	}
}

impl Encode for ObjectStatus {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		u64::from(*self).encode(w, version);
	}
}

/// The publisher's choice of how objects map onto streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForwardPreference {
	/// Every object of the track on one stream.
	Track,
	/// One stream per group.
	Group,
	/// One stream per object.
	Object,
	/// One unreliable datagram per object.
	Datagram,
}

/// Everything known about a single object.
///
/// On the wire this is the header of an OBJECT_STREAM or OBJECT_DATAGRAM;
/// objects on multi-object streams are reassembled into this form from the
/// stream header plus the per-object entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectHeader {
	pub subscribe_id: SubscribeId,
	pub track_alias: TrackAlias,
	pub group: u64,
	pub id: u64,

	/// Lower is more urgent.
	pub priority: u8,

	pub forward: ForwardPreference,
	pub status: ObjectStatus,

	/// The payload length, when bounded by the framing rather than the stream.
	pub length: Option<u64>,
}

impl Decode for ObjectHeader {
	/// Decode a single-object header, after the frame type tag.
	///
	/// [Self::forward] defaults to [ForwardPreference::Object]; the datagram
	/// ingest path overrides it.
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let track_alias = u64::decode(r, version)?;
		let group = u64::decode(r, version)?;
		let id = u64::decode(r, version)?;
		let priority = u8::decode(r, version)?;
		let status = ObjectStatus::decode(r, version)?;

		Ok(Self {
			subscribe_id,
			track_alias,
			group,
			id,
			priority,
			forward: ForwardPreference::Object,
			status,
			// The payload runs to the end of the stream or datagram.
			length: None,
		})
	}
}

impl Encode for ObjectHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		self.track_alias.encode(w, version);
		self.group.encode(w, version);
		self.id.encode(w, version);
		self.priority.encode(w, version);
		self.status.encode(w, version);
	}
}

fn decode_priority<R: bytes::Buf>(r: &mut R, version: Version) -> Result<u8, DecodeError> {
	u8::try_from(u64::decode(r, version)?).map_err(|_| DecodeError::InvalidValue)
}

/// The header of a STREAM_HEADER_TRACK stream.
///
/// Unlike single-object headers, the priority here is a varint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackHeader {
	pub subscribe_id: SubscribeId,
	pub track_alias: TrackAlias,
	pub priority: u8,
}

impl Decode for TrackHeader {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let track_alias = u64::decode(r, version)?;
		let priority = decode_priority(r, version)?;

		Ok(Self {
			subscribe_id,
			track_alias,
			priority,
		})
	}
}

impl Encode for TrackHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		self.track_alias.encode(w, version);
		(self.priority as u64).encode(w, version);
	}
}

/// The header of a STREAM_HEADER_GROUP stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupHeader {
	pub subscribe_id: SubscribeId,
	pub track_alias: TrackAlias,
	pub group: u64,
	pub priority: u8,
}

impl Decode for GroupHeader {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let track_alias = u64::decode(r, version)?;
		let group = u64::decode(r, version)?;
		let priority = decode_priority(r, version)?;

		Ok(Self {
			subscribe_id,
			track_alias,
			group,
			priority,
		})
	}
}

impl Encode for GroupHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		self.track_alias.encode(w, version);
		self.group.encode(w, version);
		(self.priority as u64).encode(w, version);
	}
}

fn decode_length_status<R: bytes::Buf>(r: &mut R, version: Version) -> Result<(u64, ObjectStatus), DecodeError> {
	let length = u64::decode(r, version)?;

	// A zero length is the sentinel that a status varint follows.
	let status = match length {
		0 => ObjectStatus::decode(r, version)?,
		_ => ObjectStatus::Normal,
	};

	Ok((length, status))
}

fn encode_length_status<W: bytes::BufMut>(length: u64, status: ObjectStatus, w: &mut W, version: Version) {
	length.encode(w, version);
	if length == 0 {
		status.encode(w, version);
	}
}

/// One object on a STREAM_HEADER_TRACK stream, followed by `length` payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackObject {
	pub group: u64,
	pub id: u64,
	pub length: u64,
	pub status: ObjectStatus,
}

impl Decode for TrackObject {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let group = u64::decode(r, version)?;
		let id = u64::decode(r, version)?;
		let (length, status) = decode_length_status(r, version)?;

		Ok(Self {
			group,
			id,
			length,
			status,
		})
	}
}

impl Encode for TrackObject {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.group.encode(w, version);
		self.id.encode(w, version);
		encode_length_status(self.length, self.status, w, version);
	}
}

/// One object on a STREAM_HEADER_GROUP stream, followed by `length` payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupObject {
	pub id: u64,
	pub length: u64,
	pub status: ObjectStatus,
}

impl Decode for GroupObject {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let id = u64::decode(r, version)?;
		let (length, status) = decode_length_status(r, version)?;

		Ok(Self { id, length, status })
	}
}

impl Encode for GroupObject {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.id.encode(w, version);
		encode_length_status(self.length, self.status, w, version);
	}
}
