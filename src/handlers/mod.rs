//! Connection and admin request handlers

pub mod admin;
pub mod connection;

pub use admin::admin_routes;
pub use connection::handle_connection;
