//! Provided observer implementations.

mod alert;
mod log;

pub use alert::AlertObserver;
pub use log::LogObserver;
