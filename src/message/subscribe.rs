use std::fmt;
use std::time::Duration;

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode, Version};
use crate::message::{AbsoluteLocation, FrameType, FullTrackName, Message, Parameters, SubscribeId, TrackAlias};

/// The order groups should be delivered in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum GroupOrder {
	/// Defer to the other endpoint's preference.
	#[default]
	Default = 0x0,
	OldestFirst = 0x1,
	NewestFirst = 0x2,
}

impl Decode for GroupOrder {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		Self::try_from(u8::decode(r, version)?).map_err(|_| DecodeError::InvalidMessage)
	}
}

impl Encode for GroupOrder {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		u8::from(*self).encode(w, version);
	}
}

/// The requested range of a subscription.
///
/// Wire values: LatestGroup=1, LatestObject=2, AbsoluteStart=3, AbsoluteRange=4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
	LatestGroup,
	LatestObject,
	AbsoluteStart { start: AbsoluteLocation },
	AbsoluteRange { start: AbsoluteLocation, end: AbsoluteLocation },
}

impl Decode for Filter {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		match u64::decode(r, version)? {
			0x1 => Ok(Self::LatestGroup),
			0x2 => Ok(Self::LatestObject),
			0x3 => Ok(Self::AbsoluteStart {
				start: AbsoluteLocation::decode(r, version)?,
			}),
			0x4 => Ok(Self::AbsoluteRange {
				start: AbsoluteLocation::decode(r, version)?,
				end: AbsoluteLocation::decode(r, version)?,
			}),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Encode for Filter {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		match self {
			Self::LatestGroup => 0x1u64.encode(w, version),
			Self::LatestObject => 0x2u64.encode(w, version),
			Self::AbsoluteStart { start } => {
				0x3u64.encode(w, version);
				start.encode(w, version);
			}
			Self::AbsoluteRange { start, end } => {
				0x4u64.encode(w, version);
				start.encode(w, version);
				end.encode(w, version);
			}
		}
	}
}

/// Sent by the subscriber to request a range of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
	pub subscribe_id: SubscribeId,
	pub track_alias: TrackAlias,
	pub track: FullTrackName,
	pub priority: u8,
	pub group_order: GroupOrder,
	pub filter: Filter,
	pub params: Parameters,
}

impl Subscribe {
	/// A subscribe for everything after the latest group.
	///
	/// The session fills in the IDs.
	pub fn new(track: FullTrackName) -> Self {
		Self {
			subscribe_id: 0,
			track_alias: 0,
			track,
			priority: 128,
			group_order: GroupOrder::Default,
			filter: Filter::LatestGroup,
			params: Default::default(),
		}
	}
}

impl Message for Subscribe {
	const ID: u64 = FrameType::Subscribe as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let track_alias = u64::decode(r, version)?;
		let track = FullTrackName::decode(r, version)?;
		let priority = u8::decode(r, version)?;
		let group_order = GroupOrder::decode(r, version)?;
		let filter = Filter::decode(r, version)?;
		let params = Parameters::decode(r, version)?;

		Ok(Self {
			subscribe_id,
			track_alias,
			track,
			priority,
			group_order,
			filter,
			params,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		self.track_alias.encode(w, version);
		self.track.encode(w, version);
		self.priority.encode(w, version);
		self.group_order.encode(w, version);
		self.filter.encode(w, version);
		self.params.encode(w, version);
	}
}

/// Sent by the subscriber to narrow an active subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeUpdate {
	pub subscribe_id: SubscribeId,
	pub start: AbsoluteLocation,
	pub end: AbsoluteLocation,
	pub priority: u8,
	pub params: Parameters,
}

impl Message for SubscribeUpdate {
	const ID: u64 = FrameType::SubscribeUpdate as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let start = AbsoluteLocation::decode(r, version)?;
		let end = AbsoluteLocation::decode(r, version)?;
		let priority = u8::decode(r, version)?;
		let params = Parameters::decode(r, version)?;

		Ok(Self {
			subscribe_id,
			start,
			end,
			priority,
			params,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		self.start.encode(w, version);
		self.end.encode(w, version);
		self.priority.encode(w, version);
		self.params.encode(w, version);
	}
}

/// Sent by the publisher to accept a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeOk {
	pub subscribe_id: SubscribeId,

	/// How long the subscription remains valid; zero means forever.
	pub expires: Duration,

	/// The publisher's delivery order; never [GroupOrder::Default].
	pub group_order: GroupOrder,

	/// The latest location, when the track already has content.
	pub latest: Option<AbsoluteLocation>,

	pub params: Parameters,
}

impl Message for SubscribeOk {
	const ID: u64 = FrameType::SubscribeOk as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let expires = Duration::from_millis(u64::decode(r, version)?);

		let group_order = GroupOrder::decode(r, version)?;
		if group_order == GroupOrder::Default {
			return Err(DecodeError::InvalidMessage);
		}

		let latest = match bool::decode(r, version)? {
			true => Some(AbsoluteLocation::decode(r, version)?),
			false => None,
		};
		let params = Parameters::decode(r, version)?;

		Ok(Self {
			subscribe_id,
			expires,
			group_order,
			latest,
			params,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		(self.expires.as_millis() as u64).encode(w, version);
		self.group_order.encode(w, version);
		match &self.latest {
			Some(latest) => {
				true.encode(w, version);
				latest.encode(w, version);
			}
			None => false.encode(w, version),
		}
		self.params.encode(w, version);
	}
}

/// Why a subscription was rejected.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, PartialEq, Eq)]
#[repr(u64)]
pub enum SubscribeErrorCode {
	InternalError = 0x0,
	InvalidRange = 0x1,
	RetryTrackAlias = 0x2,
	TrackNotExist = 0x3,
	Unauthorized = 0x4,
	Timeout = 0x5,
	#[num_enum(catch_all)]
	Unknown(u64),
}

/// Sent by the publisher to reject a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeError {
	pub subscribe_id: SubscribeId,
	pub error_code: SubscribeErrorCode,
	pub reason: String,

	/// An alias to retry with; meaningful only for [SubscribeErrorCode::RetryTrackAlias].
	pub retry_alias: Option<TrackAlias>,
}

impl Message for SubscribeError {
	const ID: u64 = FrameType::SubscribeError as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let error_code = SubscribeErrorCode::from(u64::decode(r, version)?);
		let reason = String::decode(r, version)?;

		// The alias is always on the wire to keep the frame fixed-shape.
		let retry_alias = u64::decode(r, version)?;
		let retry_alias = match error_code {
			SubscribeErrorCode::RetryTrackAlias => Some(retry_alias),
			_ => None,
		};

		Ok(Self {
			subscribe_id,
			error_code,
			reason,
			retry_alias,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		u64::from(self.error_code).encode(w, version);
		self.reason.encode(w, version);
		self.retry_alias.unwrap_or(0).encode(w, version);
	}
}

impl fmt::Display for SubscribeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "subscribe error {:?}: {}", self.error_code, self.reason)
	}
}

impl std::error::Error for SubscribeError {}

/// Sent by the subscriber to end a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsubscribe {
	pub subscribe_id: SubscribeId,
}

impl Message for Unsubscribe {
	const ID: u64 = FrameType::Unsubscribe as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		Ok(Self { subscribe_id })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
	}
}

/// Why a subscription finished.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, PartialEq, Eq)]
#[repr(u64)]
pub enum SubscribeDoneCode {
	Unsubscribed = 0x0,
	InternalError = 0x1,
	Unauthorized = 0x2,
	TrackEnded = 0x3,
	SubscriptionEnded = 0x4,
	GoingAway = 0x5,
	Expired = 0x6,
	#[num_enum(catch_all)]
	Unknown(u64),
}

/// Sent by the publisher when a subscription has delivered everything it will.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeDone {
	pub subscribe_id: SubscribeId,
	pub status_code: SubscribeDoneCode,
	pub reason: String,

	/// The final location, when content was delivered.
	pub last: Option<AbsoluteLocation>,
}

impl Message for SubscribeDone {
	const ID: u64 = FrameType::SubscribeDone as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(r, version)?;
		let status_code = SubscribeDoneCode::from(u64::decode(r, version)?);
		let reason = String::decode(r, version)?;

		let last = match bool::decode(r, version)? {
			true => Some(AbsoluteLocation::decode(r, version)?),
			false => None,
		};

		Ok(Self {
			subscribe_id,
			status_code,
			reason,
			last,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.subscribe_id.encode(w, version);
		u64::from(self.status_code).encode(w, version);
		self.reason.encode(w, version);
		match &self.last {
			Some(last) => {
				true.encode(w, version);
				last.encode(w, version);
			}
			None => false.encode(w, version),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::{ParamKey, VERSION_CURRENT};

	fn encode_message<M: Message>(msg: &M) -> Vec<u8> {
		let mut buf = Vec::new();
		msg.encode_msg(&mut buf, VERSION_CURRENT);
		buf
	}

	fn decode_message<M: Message>(bytes: &[u8]) -> Result<M, DecodeError> {
		let mut buf = bytes;
		let msg = M::decode_msg(&mut buf, VERSION_CURRENT)?;
		assert!(buf.is_empty(), "trailing bytes after decode");
		Ok(msg)
	}

	fn round_trip<M: Message + PartialEq + Clone>(msg: &M) -> M {
		let decoded = decode_message(&encode_message(msg)).unwrap();
		assert_eq!(*msg, decoded);
		decoded
	}

	#[test]
	fn test_subscribe_round_trip() {
		let mut params = Parameters::default();
		params.set(ParamKey::Authorization, "token");

		let msg = Subscribe {
			subscribe_id: 1,
			track_alias: 2,
			track: FullTrackName::new("conference", "video"),
			priority: 128,
			group_order: GroupOrder::NewestFirst,
			filter: Filter::AbsoluteRange {
				start: AbsoluteLocation::new(10, 0),
				end: AbsoluteLocation::new(20, 0),
			},
			params,
		};

		round_trip(&msg);
	}

	#[test]
	fn test_subscribe_latest_group() {
		let msg = Subscribe::new(FullTrackName::new("ns", "track"));
		round_trip(&msg);
	}

	#[test]
	fn test_subscribe_rejects_invalid_filter() {
		#[rustfmt::skip]
		let invalid = vec![
			0x01, // subscribe_id
			0x02, // track_alias
			0x02, 0x6e, 0x73, // "ns"
			0x01, 0x74, // "t"
			0x80, // priority
			0x01, // group_order
			0x05, // INVALID filter type
			0x00, // num_params
		];

		let err = decode_message::<Subscribe>(&invalid).unwrap_err();
		assert!(matches!(err, DecodeError::InvalidValue));
	}

	#[test]
	fn test_subscribe_rejects_invalid_group_order() {
		#[rustfmt::skip]
		let invalid = vec![
			0x01, // subscribe_id
			0x02, // track_alias
			0x02, 0x6e, 0x73, // "ns"
			0x01, 0x74, // "t"
			0x80, // priority
			0x03, // INVALID group_order
			0x01, // filter type
			0x00, // num_params
		];

		let err = decode_message::<Subscribe>(&invalid).unwrap_err();
		assert!(matches!(err, DecodeError::InvalidMessage));
	}

	#[test]
	fn test_subscribe_ok_wire_format() {
		let msg = SubscribeOk {
			subscribe_id: 7,
			expires: Duration::from_millis(250),
			group_order: GroupOrder::OldestFirst,
			latest: Some(AbsoluteLocation::new(42, 3)),
			params: Default::default(),
		};

		let wire = encode_message(&msg);
		assert_eq!(wire, vec![0x07, 0x40, 0xfa, 0x01, 0x01, 0x2a, 0x03, 0x00]);

		let decoded: SubscribeOk = decode_message(&wire).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn test_subscribe_ok_no_content() {
		let msg = SubscribeOk {
			subscribe_id: 7,
			expires: Duration::ZERO,
			group_order: GroupOrder::NewestFirst,
			latest: None,
			params: Default::default(),
		};

		round_trip(&msg);
	}

	#[test]
	fn test_subscribe_ok_rejects_default_group_order() {
		#[rustfmt::skip]
		let invalid = vec![
			0x07, // subscribe_id
			0x00, // expires
			0x00, // INVALID group_order: Default
			0x00, // content_exists
			0x00, // num_params
		];

		let err = decode_message::<SubscribeOk>(&invalid).unwrap_err();
		assert!(matches!(err, DecodeError::InvalidMessage));
	}

	#[test]
	fn test_subscribe_ok_never_over_reads() {
		let msg = SubscribeOk {
			subscribe_id: 7,
			expires: Duration::from_millis(250),
			group_order: GroupOrder::OldestFirst,
			latest: Some(AbsoluteLocation::new(42, 3)),
			params: Default::default(),
		};
		let wire = encode_message(&msg);

		// Every proper prefix must underflow rather than yield partial state.
		for len in 0..wire.len() {
			let mut partial = &wire[..len];
			let err = SubscribeOk::decode_msg(&mut partial, VERSION_CURRENT).unwrap_err();
			assert!(matches!(err, DecodeError::Short), "prefix of {} bytes", len);
		}
	}

	#[test]
	fn test_subscribe_error_retry_alias() {
		let msg = SubscribeError {
			subscribe_id: 4,
			error_code: SubscribeErrorCode::RetryTrackAlias,
			reason: "alias".to_string(),
			retry_alias: Some(12),
		};

		let decoded = round_trip(&msg);
		assert_eq!(decoded.retry_alias, Some(12));
	}

	#[test]
	fn test_subscribe_error_alias_always_encoded() {
		let msg = SubscribeError {
			subscribe_id: 4,
			error_code: SubscribeErrorCode::Unauthorized,
			reason: String::new(),
			retry_alias: None,
		};

		// subscribe_id, code, empty reason, trailing zero alias
		assert_eq!(encode_message(&msg), vec![0x04, 0x04, 0x00, 0x00]);

		let decoded: SubscribeError = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded.retry_alias, None);
	}

	#[test]
	fn test_unknown_error_code_tolerated() {
		let mut wire = vec![0x04];
		wire.push(0x21); // unregistered error code
		wire.extend([0x00, 0x00]);

		let decoded: SubscribeError = decode_message(&wire).unwrap();
		assert_eq!(decoded.error_code, SubscribeErrorCode::Unknown(0x21));
	}

	#[test]
	fn test_unsubscribe_round_trip() {
		round_trip(&Unsubscribe { subscribe_id: 999 });
	}

	#[test]
	fn test_subscribe_update_round_trip() {
		let msg = SubscribeUpdate {
			subscribe_id: 3,
			start: AbsoluteLocation::new(1, 2),
			end: AbsoluteLocation::new(3, 4),
			priority: 7,
			params: Default::default(),
		};

		round_trip(&msg);
	}

	#[test]
	fn test_subscribe_done_round_trip() {
		let msg = SubscribeDone {
			subscribe_id: 8,
			status_code: SubscribeDoneCode::TrackEnded,
			reason: "done".to_string(),
			last: Some(AbsoluteLocation::new(100, 5)),
		};

		round_trip(&msg);

		let msg = SubscribeDone {
			last: None,
			..msg
		};
		round_trip(&msg);
	}
}
