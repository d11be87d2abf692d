use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode, Version};
use crate::message::{AbsoluteLocation, FrameType, FullTrackName, Message};

/// The lifecycle state of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum TrackStatusCode {
	InProgress = 0x0,
	DoesNotExist = 0x1,
	NotYetBegun = 0x2,
	Finished = 0x3,
	Unknown = 0x4,
}

impl Decode for TrackStatusCode {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r, version)?).map_err(|_| DecodeError::InvalidMessage)
	}
}

impl Encode for TrackStatusCode {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		u64::from(*self).encode(w, version);
	}
}

/// Sent to ask the peer about the state of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackStatusRequest {
	pub track: FullTrackName,
}

impl Message for TrackStatusRequest {
	const ID: u64 = FrameType::TrackStatusRequest as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let track = FullTrackName::decode(r, version)?;
		Ok(Self { track })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.track.encode(w, version);
	}
}

/// The answer to a [TrackStatusRequest].
///
/// A latest pair is always on the wire; it is only meaningful for
/// [TrackStatusCode::InProgress] and encoded as zeros otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackStatus {
	pub track: FullTrackName,
	pub status_code: TrackStatusCode,
	pub latest: Option<AbsoluteLocation>,
}

impl Message for TrackStatus {
	const ID: u64 = FrameType::TrackStatus as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let track = FullTrackName::decode(r, version)?;
		let status_code = TrackStatusCode::decode(r, version)?;

		let latest = AbsoluteLocation::decode(r, version)?;
		let latest = match status_code {
			TrackStatusCode::InProgress => Some(latest),
			_ => None,
		};

		Ok(Self {
			track,
			status_code,
			latest,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.track.encode(w, version);
		self.status_code.encode(w, version);
		self.latest.unwrap_or_default().encode(w, version);
	}
}
