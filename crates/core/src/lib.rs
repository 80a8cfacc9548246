#![forbid(unsafe_code)]

pub mod model;
pub mod scoring;
pub mod time;
pub mod timer;
pub mod tracker;

pub use time::{Clock, MonotonicClock};
