pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod routes;
pub mod store;
pub mod utils;

// Re-export commonly used items for tests
pub use app::create_app;
