//! Bounded Ring Buffer
//!
//! Provides a fixed-capacity history for per-frame signal samples
//! (eye-opening ratio and friends). Oldest samples are evicted first.

mod buffer;

pub use buffer::{RingBuffer, DEFAULT_CAPACITY};
