//! Data models for the application
//!
//! Media handed to the analysis service and the verdicts it produces.

mod analysis;
mod media;

pub use analysis::*;
pub use media::*;
