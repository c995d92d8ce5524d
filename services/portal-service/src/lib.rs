pub mod access_handlers;
pub mod app;
pub mod caller;
pub mod config;
pub mod metrics;
pub mod routes;
pub mod session_handlers;

pub use app::{build_router, AppState};
