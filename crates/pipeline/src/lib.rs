//! Animation pipeline for chartcast.
//!
//! Frame sources feed the [`sequencer`], which hands captured frames to the
//! [`encoder`]. The [`registry`] tracks every job and the [`runner`] ties the
//! stages together on a background task.

pub mod browser;
pub mod encoder;
pub mod recorder;
pub mod registry;
pub mod runner;
pub mod sequencer;
pub mod source;
pub mod uploaded;
pub mod webdriver;
