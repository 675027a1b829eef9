mod store_service;
mod subscriptions;
mod ws_handler;

pub use store_service::*;
pub use ws_handler::*;
