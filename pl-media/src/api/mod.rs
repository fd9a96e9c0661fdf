//! HTTP API handlers for pl-media

pub mod buildinfo;
pub mod health;
pub mod media;
pub mod sse;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sse::event_stream;
