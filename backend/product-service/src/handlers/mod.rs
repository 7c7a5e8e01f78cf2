mod products;

pub use products::{create_product, get_product, health, list_products, update_product};
