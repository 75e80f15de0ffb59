//! Domain types and pure logic for chartcast.
//!
//! Nothing in this crate talks HTTP or owns long-lived tasks; the pipeline
//! and API crates build on these types.

pub mod capture_script;
pub mod dataset;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod job;
pub mod naming;
pub mod types;
