//! Request handlers.
//!
//! Each submodule provides the async handler functions for one route group.
//! Handlers delegate to `chartcast_core` / `chartcast_pipeline` and map
//! errors via [`AppError`](crate::error::AppError).

pub mod animations;
pub mod data;
pub mod downloads;
pub mod recordings;
