use crate::coding::{Decode, DecodeError, Encode, Version};

/// An unsigned integer that fits in a QUIC variable-length encoding.
///
/// The encoding is defined in RFC 9000 section 16: the top two bits of the
/// first byte select a 1, 2, 4, or 8 byte form, leaving 62 usable bits.
/// Encoding always emits the shortest form; decoding accepts any form.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
	pub const ZERO: Self = Self(0);

	/// The largest representable value, 2^62 - 1.
	pub const MAX: Self = Self((1 << 62) - 1);

	pub const fn from_u32(v: u32) -> Self {
		Self(v as u64)
	}

	/// Convert a u64, returning [None] if it does not fit in 62 bits.
	pub const fn from_u64(v: u64) -> Option<Self> {
		if v <= Self::MAX.0 {
			Some(Self(v))
		} else {
			None
		}
	}

	pub const fn into_inner(self) -> u64 {
		self.0
	}
}

impl std::fmt::Debug for VarInt {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		// Only 62 bits survive decoding, so this can't overflow.
		Ok(Self(u64::decode(r, version)?))
	}
}

impl Encode for VarInt {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.0.encode(w, version)
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R, _: Version) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Short);
		}

		let first = r.get_u8();
		let len = 1usize << (first >> 6);
		let mut value = (first & 0x3f) as u64;

		if r.remaining() < len - 1 {
			return Err(DecodeError::Short);
		}

		for _ in 1..len {
			value = (value << 8) | r.get_u8() as u64;
		}

		Ok(value)
	}
}

impl Encode for u64 {
	/// Encode in the shortest form that fits.
	///
	/// Panics on values that need more than 62 bits; construct a [VarInt]
	/// first when the value comes from outside the protocol.
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: Version) {
		let v = *self;
		if v < (1 << 6) {
			w.put_u8(v as u8);
		} else if v < (1 << 14) {
			w.put_u16(v as u16 | 0x4000);
		} else if v < (1 << 30) {
			w.put_u32(v as u32 | 0x8000_0000);
		} else if v <= VarInt::MAX.into_inner() {
			w.put_u64(v | 0xc000_0000_0000_0000);
		} else {
			panic!("varint overflow: {}", v);
		}
	}
}

impl Decode for usize {
	fn decode<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		u64::decode(r, version)?
			.try_into()
			.map_err(|_| DecodeError::BoundsExceeded)
	}
}

impl Encode for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		(*self as u64).encode(w, version)
	}
}
