use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::Error;
use crate::registration::PressureReading;

/// The sending end of a pressure feed, to be moved to the thread that reads
/// the pressure sensor.
///
/// Pushing never blocks and never allocates. Readings are picked up by the
/// session the next time it processes a chunk, records a reading or polls
/// the feed.
pub struct PressureFeed {
    producer: Producer<PressureReading>,
}

impl PressureFeed {
    /// Queues a reading. Returns [`Error::FeedFull`] if the queue has no
    /// free slots, in which case the reading is dropped.
    pub fn push(&mut self, value_cm_h2o: f32, timestamp_secs: f64) -> Result<(), Error> {
        self.producer
            .push(PressureReading {
                timestamp_secs,
                value_cm_h2o,
            })
            .map_err(|_| Error::FeedFull { timestamp_secs })
    }

    /// The number of readings that can be pushed before the feed is full.
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    /// Returns true if the receiving session has been dropped or has
    /// replaced this feed with a new one.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Creates a feed holding at most `capacity` pending readings.
pub(crate) fn pressure_feed(capacity: usize) -> (PressureFeed, Consumer<PressureReading>) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (PressureFeed { producer }, consumer)
}
