use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode, Version, Versions};
use crate::message::{FrameType, Message};

pub const VERSION_DRAFT_01: Version = Version(0xff000001);
pub const VERSION_DRAFT_02: Version = Version(0xff000002);
pub const VERSION_DRAFT_03: Version = Version(0xff000003);
pub const VERSION_DRAFT_04: Version = Version(0xff000004);
pub const VERSION_DRAFT_05: Version = Version(0xff000005);
pub const VERSION_DRAFT_06: Version = Version(0xff000006);

/// The draft this implementation targets.
pub const VERSION_CURRENT: Version = VERSION_DRAFT_06;

const SETUP_PARAM_ROLE: u64 = 0x0;
const SETUP_PARAM_PATH: u64 = 0x1;

/// The endpoint's declared role for this session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Role {
	Publisher = 0x1,
	Subscriber = 0x2,
	PubAndSub = 0x3,
}

impl Role {
	pub fn is_publisher(self) -> bool {
		matches!(self, Self::Publisher | Self::PubAndSub)
	}

	pub fn is_subscriber(self) -> bool {
		matches!(self, Self::Subscriber | Self::PubAndSub)
	}
}

/// A setup parameter.
///
/// The role key carries a varint payload; every other key carries
/// length-prefixed bytes. Unknown keys are kept, not rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetupParameter {
	Role(Role),
	Path(String),
	Unknown { key: u64, value: Vec<u8> },
}

impl Decode for SetupParameter {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let key = u64::decode(r, version)?;

		match key {
			SETUP_PARAM_ROLE => {
				// The varint payload carries its own length prefix.
				let _len = u64::decode(r, version)?;
				let value = u64::decode(r, version)?;
				let role = u8::try_from(value)
					.ok()
					.and_then(|v| Role::try_from(v).ok())
					.ok_or(DecodeError::InvalidValue)?;
				Ok(Self::Role(role))
			}
			SETUP_PARAM_PATH => Ok(Self::Path(String::decode(r, version)?)),
			key => Ok(Self::Unknown {
				key,
				value: Vec::<u8>::decode(r, version)?,
			}),
		}
	}
}

impl Encode for SetupParameter {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		match self {
			Self::Role(role) => {
				SETUP_PARAM_ROLE.encode(w, version);
				// Roles always fit in a single-byte varint.
				1u64.encode(w, version);
				(u8::from(*role) as u64).encode(w, version);
			}
			Self::Path(path) => {
				SETUP_PARAM_PATH.encode(w, version);
				path.encode(w, version);
			}
			Self::Unknown { key, value } => {
				key.encode(w, version);
				value.encode(w, version);
			}
		}
	}
}

fn decode_params<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Vec<SetupParameter>, DecodeError> {
	let count = u64::decode(r, version)?;
	if count > 64 {
		return Err(DecodeError::TooMany);
	}

	let mut params = Vec::with_capacity(count as usize);
	for _ in 0..count {
		params.push(SetupParameter::decode(r, version)?);
	}
	Ok(params)
}

fn encode_params<W: bytes::BufMut>(params: &[SetupParameter], w: &mut W, version: Version) {
	params.len().encode(w, version);
	for param in params {
		param.encode(w, version);
	}
}

fn find_role(params: &[SetupParameter]) -> Option<Role> {
	params.iter().find_map(|p| match p {
		SetupParameter::Role(role) => Some(*role),
		_ => None,
	})
}

/// Sent by the client to begin the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSetup {
	pub versions: Versions,
	pub params: Vec<SetupParameter>,
}

impl ClientSetup {
	pub fn role(&self) -> Option<Role> {
		find_role(&self.params)
	}
}

impl Message for ClientSetup {
	const ID: u64 = FrameType::ClientSetup as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let versions = Versions::decode(r, version)?;
		let params = decode_params(r, version)?;

		Ok(Self { versions, params })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.versions.encode(w, version);
		encode_params(&self.params, w, version);
	}
}

/// Sent by the server in response, selecting a version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSetup {
	pub version: Version,
	pub params: Vec<SetupParameter>,
}

impl ServerSetup {
	pub fn role(&self) -> Option<Role> {
		find_role(&self.params)
	}
}

impl Message for ServerSetup {
	const ID: u64 = FrameType::ServerSetup as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let selected = Version::decode(r, version)?;
		let params = decode_params(r, version)?;

		Ok(Self {
			version: selected,
			params,
		})
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.version.encode(w, version);
		encode_params(&self.params, w, version);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip<M: Message + PartialEq + Clone>(msg: &M) -> M {
		let mut buf = Vec::new();
		msg.encode_msg(&mut buf, VERSION_CURRENT);
		let decoded = M::decode_msg(&mut &buf[..], VERSION_CURRENT).unwrap();
		assert_eq!(*msg, decoded);
		decoded
	}

	#[test]
	fn test_client_setup_round_trip() {
		let msg = ClientSetup {
			versions: [VERSION_DRAFT_05, VERSION_DRAFT_06].into(),
			params: vec![
				SetupParameter::Role(Role::PubAndSub),
				SetupParameter::Path("/moq".to_string()),
			],
		};

		let decoded = round_trip(&msg);
		assert_eq!(decoded.role(), Some(Role::PubAndSub));
	}

	#[test]
	fn test_server_setup_round_trip() {
		let msg = ServerSetup {
			version: VERSION_DRAFT_06,
			params: vec![SetupParameter::Role(Role::Publisher)],
		};

		let decoded = round_trip(&msg);
		assert_eq!(decoded.role(), Some(Role::Publisher));
	}

	#[test]
	fn test_unknown_setup_param_kept() {
		let msg = ClientSetup {
			versions: [VERSION_DRAFT_06].into(),
			params: vec![SetupParameter::Unknown {
				key: 0x7777,
				value: vec![1, 2, 3],
			}],
		};

		round_trip(&msg);
	}

	#[test]
	fn test_role_wire_format() {
		let mut buf = Vec::new();
		SetupParameter::Role(Role::Subscriber).encode(&mut buf, VERSION_CURRENT);

		// key=0, length=1, value=2
		assert_eq!(buf, vec![0x00, 0x01, 0x02]);
	}

	#[test]
	fn test_invalid_role_rejected() {
		let mut buf: &[u8] = &[0x00, 0x01, 0x04];
		let err = SetupParameter::decode(&mut buf, VERSION_CURRENT).unwrap_err();
		assert!(matches!(err, DecodeError::InvalidValue));
	}
}
