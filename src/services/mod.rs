pub mod admin_service;
pub mod assignment;
pub mod cart;
pub mod order_service;
pub mod pricing;
pub mod workflow;
