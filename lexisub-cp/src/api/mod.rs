//! HTTP API handlers for lexisub-cp

pub mod chunks;
pub mod health;

pub use chunks::chunk_routes;
pub use health::health_routes;
