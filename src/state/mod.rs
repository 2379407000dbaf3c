//! State module for session control and pacing
//!
//! # Components
//!
//! - `Controller`: run/pause/stop status of a crawl session, admitting one operation at a time
//! - `DelayRegulator`: observed page-load statistics and the pauses derived from them

mod control_state;
mod load_timing;

// Re-export main types
pub use control_state::{ControlState, Controller, RunGuard, StoppedCallback};
pub use load_timing::{DelayRegulator, DelayStatistics};
