// Quote Service

pub mod handlers;
pub mod models;
pub mod service;

pub use models::{Quote, QuoteRequest};
pub use service::QuoteService;
