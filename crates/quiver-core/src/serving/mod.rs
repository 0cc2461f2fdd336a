//! Ad serving: candidate selection, rotation and the orchestrating engine.

pub mod engine;
pub mod notifications;
pub mod round_robin;

pub use engine::AdsEngine;
pub use notifications::NotificationQueue;
