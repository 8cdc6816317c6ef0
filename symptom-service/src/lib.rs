pub mod backend;
pub mod models;
pub mod service;

pub use service::create_app;
