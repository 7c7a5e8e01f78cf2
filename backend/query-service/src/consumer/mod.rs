mod event_consumer;

pub use event_consumer::{EventRouter, TopicHandler};
