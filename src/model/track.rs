use tokio::sync::mpsc;

use crate::message::{AbsoluteLocation, FullTrackName, GroupOrder, SubscribeId, TrackAlias};
use crate::model::ObjectConsumer;

/// The subscriber's handle for an accepted subscription.
///
/// Objects arrive in wire order per data stream; there is no cross-stream
/// ordering beyond the publisher's send-order hint.
#[derive(Debug)]
pub struct TrackConsumer {
	pub track: FullTrackName,
	pub subscribe_id: SubscribeId,
	pub track_alias: TrackAlias,

	group_order: GroupOrder,
	latest: Option<AbsoluteLocation>,

	rx: mpsc::UnboundedReceiver<ObjectConsumer>,
}

impl TrackConsumer {
	pub(crate) fn new(
		track: FullTrackName,
		subscribe_id: SubscribeId,
		track_alias: TrackAlias,
		group_order: GroupOrder,
		latest: Option<AbsoluteLocation>,
		rx: mpsc::UnboundedReceiver<ObjectConsumer>,
	) -> Self {
		Self {
			track,
			subscribe_id,
			track_alias,
			group_order,
			latest,
			rx,
		}
	}

	/// Receive the next object, or [None] once the subscription is done.
	pub async fn next_object(&mut self) -> Option<ObjectConsumer> {
		self.rx.recv().await
	}

	/// The delivery order granted by the publisher.
	pub fn group_order(&self) -> GroupOrder {
		self.group_order
	}

	/// The latest location known at subscribe time, if the track had content.
	pub fn latest(&self) -> Option<AbsoluteLocation> {
		self.latest
	}
}

/// The session's write half of a subscription.
///
/// Cloned per data stream; the consumer sees the end once every clone is gone.
#[derive(Clone)]
pub(crate) struct TrackProducer {
	tx: mpsc::UnboundedSender<ObjectConsumer>,
}

impl TrackProducer {
	pub fn deliver(&self, object: ObjectConsumer) {
		// The consumer may already be gone; objects are simply dropped then.
		let _ = self.tx.send(object);
	}
}

/// Create the producer half plus the receiver later handed to [TrackConsumer].
pub(crate) fn produce_track() -> (TrackProducer, mpsc::UnboundedReceiver<ObjectConsumer>) {
	let (tx, rx) = mpsc::unbounded_channel();
	(TrackProducer { tx }, rx)
}
