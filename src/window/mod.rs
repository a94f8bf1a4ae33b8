//! Time windows and saturation detection
//!
//! A [`TimeWindow`] is a half-open `[from, to)` range of publication times. The
//! scheduler bisects windows the API reports as saturated; the
//! [`SaturationDetector`] makes that call from page-0 metadata.

mod saturation;
mod time_window;

pub use saturation::SaturationDetector;
pub use time_window::TimeWindow;
