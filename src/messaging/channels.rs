// Lock-free event channel between the engine and its observers

use crate::messaging::event::SequencerEvent;
use ringbuf::{HeapRb, traits::Split};

pub type EventProducer = ringbuf::HeapProd<SequencerEvent>;
pub type EventConsumer = ringbuf::HeapCons<SequencerEvent>;

pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<SequencerEvent>::new(capacity.max(1));
    rb.split()
}

/// Drain every queued event
pub fn drain_events(consumer: &mut EventConsumer) -> Vec<SequencerEvent> {
    use ringbuf::traits::Consumer;
    consumer.pop_iter().collect()
}
