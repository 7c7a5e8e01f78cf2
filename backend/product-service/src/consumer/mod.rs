mod order_consumer;

pub use order_consumer::OrderCreatedHandler;
