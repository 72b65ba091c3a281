pub mod audit_logs;
pub mod foods;
pub mod order_items;
pub mod orders;
pub mod settings;
pub mod users;
