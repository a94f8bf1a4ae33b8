//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `WindowState`: where a single time window is in its fetch lifecycle

mod window_state;

pub use window_state::WindowState;
