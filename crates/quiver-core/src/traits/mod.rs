//! Core traits for host integration.

mod client;

pub use client::*;
