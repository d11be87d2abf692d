use bytes::{Bytes, BytesMut};

use crate::coding::Version;

/// Write the value to the buffer using the given version.
pub trait Encode {
	/// Encode the value to the given writer.
	///
	/// This will panic if the [bytes::BufMut] does not have enough capacity.
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version);

	/// Encode the value into a [Bytes] buffer.
	///
	/// NOTE: This will allocate.
	fn encode_bytes(&self, version: Version) -> Bytes {
		let mut buf = BytesMut::new();
		self.encode(&mut buf, version);
		buf.freeze()
	}
}

impl Encode for bool {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: Version) {
		w.put_u8(*self as u8);
	}
}

impl Encode for u8 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: Version) {
		w.put_u8(*self);
	}
}

impl Encode for String {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.as_str().encode(w, version)
	}
}

impl Encode for &str {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.len().encode(w, version);
		w.put(self.as_bytes());
	}
}

impl Encode for Vec<u8> {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.len().encode(w, version);
		w.put_slice(self);
	}
}

impl Encode for bytes::Bytes {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: Version) {
		self.len().encode(w, version);
		w.put_slice(self);
	}
}
