use crate::coding::{Decode, DecodeError, Encode, Version};
use crate::message::{FrameType, Message};

/// Sent to begin graceful migration to a new session.
///
/// The receiver stops issuing new requests and lets existing subscriptions
/// run to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Goaway {
	pub new_session_uri: String,
}

impl Message for Goaway {
	const ID: u64 = FrameType::Goaway as u64;

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let new_session_uri = String::decode(r, version)?;
		Ok(Self { new_session_uri })
	}

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.new_session_uri.encode(w, version);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::VERSION_CURRENT;

	#[test]
	fn test_goaway_round_trip() {
		let msg = Goaway {
			new_session_uri: "https://relay2.example.com/moq".to_string(),
		};

		let mut buf = Vec::new();
		msg.encode_msg(&mut buf, VERSION_CURRENT);
		let decoded = Goaway::decode_msg(&mut &buf[..], VERSION_CURRENT).unwrap();
		assert_eq!(msg, decoded);
	}
}
