use num_enum::{FromPrimitive, IntoPrimitive};

use crate::coding::{Decode, DecodeError, Encode, Version};

const MAX_PARAMS: u64 = 64;

/// Keys for parameters attached to subscribe/announce requests.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ParamKey {
	Authorization = 2,
	#[num_enum(catch_all)]
	Unknown(u64),
}

/// A single key/value parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
	pub key: ParamKey,
	pub value: String,
}

/// An ordered list of parameters.
///
/// Unknown keys are kept as-is; order is preserved on re-encode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters(Vec<Parameter>);

impl Parameters {
	pub fn get(&self, key: ParamKey) -> Option<&str> {
		self.0.iter().find(|p| p.key == key).map(|p| p.value.as_str())
	}

	pub fn set(&mut self, key: ParamKey, value: impl Into<String>) {
		self.0.push(Parameter {
			key,
			value: value.into(),
		});
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl Decode for Parameters {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let count = u64::decode(r, version)?;

		if count > MAX_PARAMS {
			return Err(DecodeError::TooMany);
		}

		let mut params = Vec::with_capacity(count as usize);
		for _ in 0..count {
			let key = ParamKey::from(u64::decode(r, version)?);
			let value = String::decode(r, version)?;
			params.push(Parameter { key, value });
		}

		Ok(Self(params))
	}
}

impl Encode for Parameters {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.0.len().encode(w, version);

		for param in &self.0 {
			u64::from(param.key).encode(w, version);
			param.value.encode(w, version);
		}
	}
}
