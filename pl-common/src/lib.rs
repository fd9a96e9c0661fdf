//! # Partner List Common Library
//!
//! Shared code for the partner list services including:
//! - Partner data model and row normalization
//! - Collaborator contracts (identity, object store, row store) and their
//!   hosted and local implementations
//! - Event types, notices and the EventBus
//! - Configuration loading
//! - SSE and multipart upload helpers

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod multipart;
pub mod partner;
pub mod sse;

pub use error::{Error, Result};
pub use events::{EventBus, Notice, NoticeVariant, PlEvent};
pub use partner::{ImageRef, PartnerRecord};
