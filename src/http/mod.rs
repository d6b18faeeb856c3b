//! HTTP surface: health, tournaments and the WebSocket entry point

pub mod routes;

pub use routes::build_router;
