pub mod analytics;
pub mod handlers;
pub mod models;
pub mod recorder;
