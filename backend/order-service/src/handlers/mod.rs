mod orders;

pub use orders::{
    cancel_order, create_order, get_order, health, list_orders, pay_order, CancelOrderRequest,
    CreateOrderItem, CreateOrderRequest, OrderResponse,
};
