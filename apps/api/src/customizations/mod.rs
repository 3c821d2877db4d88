pub mod handlers;
pub mod models;
pub mod overlay;
pub mod store;
