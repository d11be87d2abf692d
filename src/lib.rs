//! # moq-transport: Media over QUIC Transport
//!
//! An endpoint implementation of the MoQ transport protocol: a pub/sub overlay
//! carried over WebTransport/QUIC. Publishers announce named tracks,
//! subscribers request ranges of groups/objects within those tracks, and the
//! session multiplexes object data across unidirectional streams and
//! datagrams with per-object priority and ordering metadata.
//!
//! ## API
//!
//! Everything hangs off a [Session], created with [Session::connect] (client)
//! or [Session::accept] (server) on top of any [transport::Session]
//! implementation. Both perform the setup negotiation and return the session
//! handle plus a [ControlMessages] queue of peer-originated control events.
//!
//! To consume media:
//! - [Session::subscribe] to request a track, resolving to a [TrackConsumer].
//! - [TrackConsumer::next_object] to receive each [ObjectConsumer].
//! - [ObjectConsumer::read_chunk] (or [ObjectConsumer::payload]) to read the
//!   object payload until the end marker.
//!
//! To publish media:
//! - Answer a peer `SUBSCRIBE` (surfaced on [ControlMessages]) with
//!   [Session::subscribe_ok] or [Session::subscribe_error].
//! - [Session::publish] each object; the session shares one unidirectional
//!   stream per track/group/object according to the forwarding preference.
//! - [Session::subscribe_done] when the track ends.
//!
//! The wire codec lives in [message] (one struct per control message) and
//! [coding] (varints, incremental stream decoding). [DeJitter] restores
//! monotonic sequence order for items arriving out of order.

mod dejitter;
mod error;
mod model;
mod session;

pub mod coding;
pub mod message;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use dejitter::*;
pub use error::*;
pub use model::*;
pub use session::*;
