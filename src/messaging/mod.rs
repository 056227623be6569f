// Messaging - Typed events from the engine to renderers

pub mod channels;
pub mod event;
pub mod notification;

pub use channels::{EventConsumer, EventProducer, create_event_channel};
pub use event::SequencerEvent;
pub use notification::{Notification, NotificationCategory, NotificationLevel};
