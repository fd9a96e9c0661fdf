//! HTTP API handlers for pl-partners

pub mod auth;
pub mod buildinfo;
pub mod delete;
pub mod form;
pub mod health;
pub mod partners;
pub mod sse;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sse::event_stream;
