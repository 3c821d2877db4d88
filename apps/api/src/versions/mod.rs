pub mod diff;
pub mod handlers;
pub mod ledger;
pub mod models;
