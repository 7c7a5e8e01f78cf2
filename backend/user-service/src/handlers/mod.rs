mod users;

pub use users::{create_user, get_user, health, list_users, update_user};
