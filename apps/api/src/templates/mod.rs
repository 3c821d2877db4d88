pub mod design;
pub mod handlers;
pub mod models;
pub mod resolver;
pub mod store;
pub mod validation;
