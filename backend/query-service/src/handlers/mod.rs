mod queries;

pub use queries::{
    get_order, get_product, get_user, health, list_orders, list_products, list_users,
};
