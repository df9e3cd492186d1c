//! HTTP surface: health, match control and the WebSocket route

pub mod routes;

pub use routes::build_router;
